use crate::domain::ports::{PaymentGateway, PollStatus, StkPush, StkPushAck};
use crate::error::{HostelError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub const SANDBOX_URL: &str = "https://sandbox.safaricom.co.ke";

/// Daraja reports a checkout that is still awaiting the customer this way.
const STILL_PROCESSING: &str = "500.001.1001";
/// The gateway caps the account reference at 12 characters.
const ACCOUNT_REFERENCE_LIMIT: usize = 12;
const TRANSACTION_DESC_LIMIT: usize = 100;
/// Daraja timestamps are in East Africa Time.
const EAT_OFFSET_HOURS: i64 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn transport_failure(err: reqwest::Error) -> HostelError {
    HostelError::GatewayError(format!("could not reach M-Pesa: {err}"))
}

#[derive(Debug, Clone)]
pub struct MpesaCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub short_code: String,
    pub passkey: String,
    pub callback_url: String,
}

/// Client for the Safaricom Daraja STK push API.
pub struct MpesaClient {
    client: Client,
    base_url: String,
    credentials: MpesaCredentials,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: String,
    transaction_desc: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushResponse {
    #[serde(default)]
    response_code: String,
    #[serde(rename = "CheckoutRequestID", default)]
    checkout_request_id: String,
    #[serde(default)]
    response_description: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkQueryBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: &'a str,
}

#[derive(Deserialize)]
struct StkQueryResponse {
    #[serde(rename = "ResultCode")]
    result_code: Option<String>,
    #[serde(rename = "ResultDesc")]
    result_desc: Option<String>,
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "MpesaReceiptNumber")]
    receipt_number: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

impl StkQueryResponse {
    fn into_status(self) -> PollStatus {
        if self.error_code.as_deref() == Some(STILL_PROCESSING) {
            return PollStatus::in_progress();
        }
        match self.result_code.as_deref() {
            Some("0") => PollStatus {
                terminal: true,
                success: true,
                // The query API does not always echo the receipt; the merchant
                // request id is the gateway-issued confirmation in that case.
                receipt_code: self.receipt_number.or(self.merchant_request_id),
                description: self.result_desc,
            },
            Some(_) => PollStatus::declined(
                self.result_desc
                    .unwrap_or_else(|| "declined by M-Pesa".to_string()),
            ),
            None => PollStatus {
                description: self.error_message,
                ..PollStatus::in_progress()
            },
        }
    }
}

impl MpesaClient {
    pub fn new(base_url: &str, credentials: MpesaCredentials) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .get(format!("{}/oauth/v1/generate", self.base_url))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(
                &self.credentials.consumer_key,
                Some(&self.credentials.consumer_secret),
            )
            .send()
            .await
            .map_err(transport_failure)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HostelError::GatewayError(format!(
                "M-Pesa authentication failed ({status}): {body}"
            )));
        }
        let token: TokenResponse = response.json().await.map_err(transport_failure)?;
        // Refresh a minute early.
        let lifetime = token
            .expires_in
            .parse::<u64>()
            .unwrap_or(3599)
            .saturating_sub(60);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(token.access_token)
    }

    /// `base64(short_code + passkey + timestamp)` with its timestamp.
    fn password(&self) -> (String, String) {
        let timestamp = (Utc::now() + chrono::Duration::hours(EAT_OFFSET_HOURS))
            .format("%Y%m%d%H%M%S")
            .to_string();
        let password = STANDARD.encode(format!(
            "{}{}{}",
            self.credentials.short_code, self.credentials.passkey, timestamp
        ));
        (password, timestamp)
    }
}

#[async_trait]
impl PaymentGateway for MpesaClient {
    async fn initiate(&self, push: &StkPush) -> Result<StkPushAck> {
        let amount = push.amount.value();
        let amount = match amount.fract().is_zero() {
            true => amount.to_u64(),
            false => None,
        }
        .ok_or_else(|| {
            HostelError::ValidationError(format!(
                "M-Pesa only accepts whole shilling amounts, got {amount}"
            ))
        })?;

        let token = self.access_token().await?;
        let (password, timestamp) = self.password();
        let body = StkPushBody {
            business_short_code: &self.credentials.short_code,
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount,
            party_a: push.phone.as_str(),
            party_b: &self.credentials.short_code,
            phone_number: push.phone.as_str(),
            callback_url: &self.credentials.callback_url,
            account_reference: push
                .account_reference
                .chars()
                .take(ACCOUNT_REFERENCE_LIMIT)
                .collect(),
            transaction_desc: push.description.chars().take(TRANSACTION_DESC_LIMIT).collect(),
        };

        let response = self
            .client
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_failure)?;
        debug!(%status, body = %text, "STK push response");

        let parsed: StkPushResponse = serde_json::from_str(&text).map_err(|_| {
            HostelError::GatewayError(format!("unexpected STK push response ({status}): {text}"))
        })?;
        Ok(StkPushAck {
            response_code: parsed.response_code,
            checkout_request_id: parsed.checkout_request_id,
            response_description: parsed.response_description,
        })
    }

    async fn poll_status(&self, checkout_request_id: &str) -> Result<PollStatus> {
        let token = self.access_token().await?;
        let (password, timestamp) = self.password();
        let body = StkQueryBody {
            business_short_code: &self.credentials.short_code,
            password,
            timestamp,
            checkout_request_id,
        };

        let response = self
            .client
            .post(format!("{}/mpesa/stkpushquery/v1/query", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport_failure)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_failure)?;
        debug!(%status, body = %text, "STK query response");

        match serde_json::from_str::<StkQueryResponse>(&text) {
            Ok(parsed) => Ok(parsed.into_status()),
            Err(_) if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                Ok(PollStatus::in_progress())
            }
            Err(_) => Err(HostelError::GatewayError(format!(
                "unexpected STK query response ({status}): {text}"
            ))),
        }
    }
}
