use crate::error::ReconcileError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};

/// Rounding tolerance used when comparing amounts in minor units.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// ISO 4217 currency code, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, ReconcileError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(ReconcileError::Validation(format!(
                "Invalid currency code: {code}"
            )))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monetary amount in a given currency.
///
/// Serializes the way the Orders API expects it: `{"value": "10.00", "currency": "EUR"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    #[serde(serialize_with = "serialize_two_decimals")]
    pub value: Decimal,
    pub currency: Currency,
}

fn serialize_two_decimals<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_two_decimals(*value))
}

pub(crate) fn format_two_decimals(value: Decimal) -> String {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

impl Money {
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    /// True when both amounts share a currency and differ by less than one cent.
    pub fn within_tolerance(&self, other: &Money) -> bool {
        self.same_currency(other) && (self.value - other.value).abs() < AMOUNT_TOLERANCE
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency, format_two_decimals(self.value))
    }
}

// Arithmetic only makes sense within one currency; callers check with `same_currency`.
impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        debug_assert!(self.same_currency(&rhs));
        Self::new(self.value + rhs.value, self.currency)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        debug_assert!(self.same_currency(&rhs));
        Self::new(self.value - rhs.value, self.currency)
    }
}
