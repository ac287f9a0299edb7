//! Request body for creating a remote order.

use super::money::{Money, format_two_decimals};
use super::order::{Address, OrderLine};
use super::remote::{LineType, OrderMetadata};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub street_and_number: String,
    pub postal_code: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub country: String,
}

impl PayloadAddress {
    pub fn from_address(address: &Address, email: &str) -> Self {
        Self {
            organization_name: address.company.clone().filter(|c| !c.is_empty()),
            title: address.prefix.clone().filter(|p| !p.is_empty()),
            given_name: address.firstname.clone(),
            family_name: address.lastname.clone(),
            email: email.to_string(),
            street_and_number: address.street.join(" ").trim_end().to_string(),
            postal_code: address.postcode.clone(),
            city: address.city.clone(),
            region: address.region.clone().filter(|r| !r.is_empty()),
            country: address.country_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadLine {
    #[serde(rename = "type")]
    pub line_type: LineType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_amount: Money,
    pub vat_rate: String,
    pub vat_amount: Money,
}

impl From<&OrderLine> for PayloadLine {
    fn from(line: &OrderLine) -> Self {
        Self {
            line_type: line.line_type,
            sku: line.sku.clone(),
            name: line.name.clone(),
            quantity: line.qty_ordered,
            unit_price: line.unit_price.clone(),
            total_amount: line.total_amount.clone(),
            vat_rate: format_two_decimals(line.vat_rate),
            vat_amount: line.vat_amount.clone(),
        }
    }
}

/// Either one method or the list the customer may choose from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MethodSelection {
    Single(String),
    Limited(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl PaymentOptions {
    pub fn is_empty(&self) -> bool {
        self.issuer.is_none() && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub amount: Money,
    pub order_number: String,
    pub billing_address: PayloadAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<PayloadAddress>,
    pub lines: Vec<PayloadLine>,
    pub redirect_url: String,
    pub webhook_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub method: MethodSelection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentOptions>,
    pub metadata: OrderMetadata,
}
