//! Per-store payment settings.
//!
//! Settings are read from an optional JSON file and the default store's API key
//! can be overridden through the `ORDERS_API_KEY` environment variable.

use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const API_KEY_ENV: &str = "ORDERS_API_KEY";

/// Provider API key. The `Debug` output never shows the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Test keys are prefixed with `test_`, live keys with `live_`.
    pub fn is_test(&self) -> bool {
        self.0.starts_with("test_")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.is_test() { "test" } else { "live" };
        write!(f, "ApiKey({mode}, ***)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub api_key: Option<ApiKey>,
    /// Status used when the customer is sent to the hosted checkout.
    pub status_pending: String,
    /// Status applied to physical orders once the payment is registered.
    pub status_processing: Option<String>,
    /// Status for deferred methods after the confirmation email went out.
    pub status_pending_banktransfer: Option<String>,
    pub send_invoice_email: bool,
    pub banktransfer_due_days: u32,
    pub locale: Option<String>,
    pub return_url: String,
    pub webhook_url: String,
    /// Methods where the customer pays after checkout (e.g. bank transfer).
    pub deferred_methods: Vec<String>,
    /// Charge the base currency amount instead of the display currency amount.
    pub use_base_currency: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            status_pending: "pending_payment".to_string(),
            status_processing: Some("processing".to_string()),
            status_pending_banktransfer: None,
            send_invoice_email: true,
            banktransfer_due_days: 14,
            locale: None,
            return_url: "https://shop.example/payment/return".to_string(),
            webhook_url: "https://shop.example/payment/webhook".to_string(),
            deferred_methods: vec!["banktransfer".to_string()],
            use_base_currency: false,
        }
    }
}

impl StoreSettings {
    pub fn is_deferred_method(&self, method: &str) -> bool {
        self.deferred_methods.iter().any(|m| m == method)
    }

    pub fn require_api_key(&self) -> Result<&ApiKey> {
        self.api_key
            .as_ref()
            .ok_or_else(|| ReconcileError::Configuration("API key not found".to_string()))
    }
}

/// Settings for every store, with a fallback used by unlisted stores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default: StoreSettings,
    pub stores: HashMap<u32, StoreSettings>,
}

impl Settings {
    /// Loads settings from `path` (if any) and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Settings::default(),
        };

        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            settings.default.api_key = Some(ApiKey::new(key.trim()));
        }

        Ok(settings)
    }

    pub fn for_store(&self, store_id: u32) -> &StoreSettings {
        self.stores.get(&store_id).unwrap_or(&self.default)
    }
}
