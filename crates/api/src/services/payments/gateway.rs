//! HTTP client for the payment gateway.
//!
//! The gateway speaks form-encoded requests and JSON responses. Every request
//! carries the merchant `apiKey` and a signature `s`: the hex HMAC-SHA256,
//! keyed with the shared secret, over `key1value1key2value2...` for all other
//! parameters sorted by key.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

use andes_core::{Clp, PaymentStatus};

use crate::config::PaymentGatewayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Errors talking to the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Status code outside the documented range.
    #[error("unknown gateway status {0}")]
    UnknownStatus(i32),
}

/// Payment state as reported by `payment/getStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Pending,
    Paid,
    Rejected,
    Cancelled,
}

impl GatewayStatus {
    /// Map the gateway's numeric code (1 pending, 2 paid, 3 rejected, 4 cancelled).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UnknownStatus` for any other code.
    pub const fn from_code(code: i32) -> Result<Self, GatewayError> {
        match code {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Paid),
            3 => Ok(Self::Rejected),
            4 => Ok(Self::Cancelled),
            other => Err(GatewayError::UnknownStatus(other)),
        }
    }

    /// Transaction status to store, `None` while still pending.
    #[must_use]
    pub const fn payment_status(self) -> Option<PaymentStatus> {
        match self {
            Self::Pending => None,
            Self::Paid => Some(PaymentStatus::Paid),
            Self::Rejected => Some(PaymentStatus::Rejected),
            Self::Cancelled => Some(PaymentStatus::Cancelled),
        }
    }
}

/// Parameters for `payment/create`.
#[derive(Debug, Clone)]
pub struct CreatePayment<'a> {
    pub commerce_order: &'a str,
    pub subject: &'a str,
    pub amount: Clp,
    pub email: &'a str,
    pub url_confirmation: &'a str,
    pub url_return: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentResponse {
    url: String,
    token: String,
    #[serde(default)]
    flow_order: Option<i64>,
}

/// A registered payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPayment {
    pub token: String,
    pub gateway_order: Option<String>,
    /// Where to send the customer to pay.
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(default)]
    flow_order: Option<i64>,
    commerce_order: String,
    status: i32,
    #[serde(deserialize_with = "deserialize_amount")]
    amount: Clp,
    #[serde(default)]
    payer: Option<String>,
}

/// Outcome of `payment/getStatus`.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub commerce_order: String,
    pub gateway_order: Option<String>,
    pub status: GatewayStatus,
    pub status_code: i32,
    pub amount: Clp,
    pub payer_email: Option<String>,
    /// Untouched response body, kept on the transaction row.
    pub raw: serde_json::Value,
}

/// Payment gateway client. Cheap to clone.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayClientInner>,
}

struct GatewayClientInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    secret: SecretString,
}

impl GatewayClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            inner: Arc::new(GatewayClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                api_key: SecretString::from(config.api_key.expose_secret().to_owned()),
                secret: SecretString::from(config.secret.expose_secret().to_owned()),
            }),
        })
    }

    /// Register a payment and get the URL to send the customer to.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    #[instrument(skip(self, payment), fields(commerce_order = %payment.commerce_order))]
    pub async fn create_payment(
        &self,
        payment: &CreatePayment<'_>,
    ) -> Result<RegisteredPayment, GatewayError> {
        let params = self.signed(vec![
            ("commerceOrder", payment.commerce_order.to_string()),
            ("subject", payment.subject.to_string()),
            ("currency", "CLP".to_string()),
            ("amount", payment.amount.pesos().to_string()),
            ("email", payment.email.to_string()),
            ("urlConfirmation", payment.url_confirmation.to_string()),
            ("urlReturn", payment.url_return.to_string()),
        ]);

        let response = self
            .inner
            .client
            .post(format!("{}/payment/create", self.inner.base_url))
            .form(&params)
            .send()
            .await?;
        let body = read_json(response).await?;
        let created: CreatePaymentResponse =
            serde_json::from_value(body).map_err(|e| GatewayError::Parse(e.to_string()))?;

        debug!(token = %created.token, "Payment registered");
        Ok(RegisteredPayment {
            redirect_url: redirect_url(&created.url, &created.token),
            gateway_order: created.flow_order.map(|o| o.to_string()),
            token: created.token,
        })
    }

    /// Ask the gateway for the current state of a payment.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body cannot be read.
    #[instrument(skip(self, token))]
    pub async fn get_status(&self, token: &str) -> Result<GatewayPayment, GatewayError> {
        let params = self.signed(vec![("token", token.to_string())]);

        let response = self
            .inner
            .client
            .get(format!("{}/payment/getStatus", self.inner.base_url))
            .query(&params)
            .send()
            .await?;
        let raw = read_json(response).await?;
        let status: StatusResponse =
            serde_json::from_value(raw.clone()).map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(GatewayPayment {
            commerce_order: status.commerce_order,
            gateway_order: status.flow_order.map(|o| o.to_string()),
            status: GatewayStatus::from_code(status.status)?,
            status_code: status.status,
            amount: status.amount,
            payer_email: status.payer,
            raw,
        })
    }

    /// Add `apiKey` and the signature to `params`.
    fn signed(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("apiKey", self.inner.api_key.expose_secret().to_string()));
        let signature = sign(&params, self.inner.secret.expose_secret());
        params.push(("s", signature));
        params
    }
}

/// Hex HMAC-SHA256 over the sorted `key + value` concatenation. Any `s`
/// parameter is left out.
#[must_use]
pub fn sign(params: &[(&str, String)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(k, _)| *k != "s").collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let message: String = sorted
        .iter()
        .map(|(k, v)| format!("{k}{v}"))
        .collect();

    // HMAC accepts keys of any length.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn redirect_url(url: &str, token: &str) -> String {
    format!("{url}?token={token}")
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| GatewayError::Parse(e.to_string()))
}

/// Amounts come back as numbers, sometimes with a `.0`, or as strings.
#[allow(clippy::cast_possible_truncation)]
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Clp, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = serde_json::Value::deserialize(deserializer)?;
    let pesos = match &value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    pesos
        .map(Clp::new)
        .ok_or_else(|| D::Error::custom(format!("invalid amount: {value}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params() -> Vec<(&'static str, String)> {
        vec![
            ("token", "ABC123".to_string()),
            ("apiKey", "merchant-key".to_string()),
        ]
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        let s = sign(&params(), "shared-secret");
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_ignores_param_order() {
        let mut reversed = params();
        reversed.reverse();
        assert_eq!(sign(&params(), "k"), sign(&reversed, "k"));
    }

    #[test]
    fn test_signature_matches_manual_hmac() {
        let mut mac = HmacSha256::new_from_slice(b"k").unwrap();
        mac.update(b"apiKeymerchant-keytokenABC123");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(sign(&params(), "k"), expected);
    }

    #[test]
    fn test_signature_skips_existing_s() {
        let mut with_s = params();
        with_s.push(("s", "stale".to_string()));
        assert_eq!(sign(&with_s, "k"), sign(&params(), "k"));
    }

    #[test]
    fn test_signature_depends_on_secret_and_values() {
        assert_ne!(sign(&params(), "a"), sign(&params(), "b"));
        let mut changed = params();
        changed[0].1 = "ABC124".to_string();
        assert_ne!(sign(&params(), "a"), sign(&changed, "a"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayStatus::from_code(1).unwrap(), GatewayStatus::Pending);
        assert_eq!(GatewayStatus::from_code(2).unwrap(), GatewayStatus::Paid);
        assert_eq!(
            GatewayStatus::from_code(3).unwrap().payment_status(),
            Some(PaymentStatus::Rejected)
        );
        assert_eq!(
            GatewayStatus::from_code(4).unwrap().payment_status(),
            Some(PaymentStatus::Cancelled)
        );
        assert_eq!(GatewayStatus::Pending.payment_status(), None);
        assert!(matches!(
            GatewayStatus::from_code(7),
            Err(GatewayError::UnknownStatus(7))
        ));
    }

    #[test]
    fn test_redirect_url() {
        assert_eq!(
            redirect_url("https://pay.example.cl/app/web/pay.php", "tok"),
            "https://pay.example.cl/app/web/pay.php?token=tok"
        );
    }

    #[test]
    fn test_status_response_amounts() {
        let parsed: StatusResponse = serde_json::from_value(serde_json::json!({
            "flowOrder": 8765,
            "commerceOrder": "AM-20250101-000001",
            "status": 2,
            "amount": 20960.0,
            "payer": "ana@example.cl"
        }))
        .unwrap();
        assert_eq!(parsed.amount, Clp::new(20_960));
        assert_eq!(parsed.flow_order, Some(8765));

        let parsed: StatusResponse = serde_json::from_value(serde_json::json!({
            "commerceOrder": "AM-20250101-000001",
            "status": 1,
            "amount": "15000"
        }))
        .unwrap();
        assert_eq!(parsed.amount, Clp::new(15_000));
        assert!(parsed.payer.is_none());

        assert!(
            serde_json::from_value::<StatusResponse>(serde_json::json!({
                "commerceOrder": "x",
                "status": 2,
                "amount": 10.5
            }))
            .is_err()
        );
    }
}
