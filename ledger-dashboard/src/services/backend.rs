//! Client for the business API that owns parties, ledgers and payments.
//!
//! The engine talks to the API only through [`LedgerBackend`] so the index,
//! aggregator and reconciliation flow can run against in-memory fakes.

use crate::config::BackendSettings;
use crate::models::{
    DateRange, Floor, Party, PartyId, PartyLedgerResponse, Payment, PaymentId, PaymentPage,
    PaymentReceipt,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use service_core::observability::TracedClientExt;
use service_core::retry::{RetryConfig, Retryable, retry_call};
use thiserror::Error;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned {status}: {message}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        message: String,
    },

    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} returned an invalid payload: {reason}")]
    InvalidPayload {
        operation: &'static str,
        reason: String,
    },
}

impl BackendError {
    /// Message fit for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Status { message, .. } if !message.is_empty() => message.clone(),
            BackendError::Status { status, .. } => format!("Server responded with {}", status),
            BackendError::Transport { .. } => "Could not reach the server".to_string(),
            BackendError::Decode { .. } => "Server sent an unexpected response".to_string(),
            BackendError::InvalidPayload { reason, .. } => reason.clone(),
        }
    }
}

impl Retryable for BackendError {
    fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            BackendError::Status { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            BackendError::Decode { .. } | BackendError::InvalidPayload { .. } => false,
        }
    }
}

/// Boundary contract with the ledger provider and payment registry.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    async fn get_all_parties(&self) -> Result<Vec<Party>, BackendError>;

    async fn get_party_ledger(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<PartyLedgerResponse, BackendError>;

    /// Raw PDF bytes, exactly as the server rendered them.
    async fn get_party_ledger_pdf(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<Vec<u8>, BackendError>;

    /// One page of a floor's payments. Never filtered by search text: the
    /// registry's search chokes on numeric terms, so callers filter locally.
    async fn get_payment_list(&self, floor: Floor, size: u32) -> Result<PaymentPage, BackendError>;

    async fn receive_payment(
        &self,
        payment_id: PaymentId,
        receipt: &PaymentReceipt,
    ) -> Result<Payment, BackendError>;
}

/// HTTP implementation of [`LedgerBackend`].
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    settings: BackendSettings,
    retry: RetryConfig,
}

impl BackendClient {
    pub fn new(settings: BackendSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        let retry = settings.retry_config();

        Ok(Self {
            client,
            settings,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    async fn read_json<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| BackendError::Transport { operation, source })?;

        if !status.is_success() {
            return Err(BackendError::Status {
                operation,
                status,
                message: extract_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| {
            tracing::error!(operation, error = %source, "Failed to decode upstream response");
            BackendError::Decode { operation, source }
        })
    }

    async fn fetch_parties(&self) -> Result<Vec<Party>, BackendError> {
        const OP: &str = "get_all_parties";
        let response = self
            .client
            .traced_get(&self.url("/api/parties"))
            .bearer_auth(self.settings.api_token.expose_secret())
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation: OP, source })?;

        Self::read_json(OP, response).await
    }

    async fn fetch_party_ledger(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<PartyLedgerResponse, BackendError> {
        const OP: &str = "get_party_ledger";
        let response = self
            .client
            .traced_get(&self.url(&format!("/api/ledger/party/{}", party_id)))
            .bearer_auth(self.settings.api_token.expose_secret())
            .query(&range.as_query())
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation: OP, source })?;

        Self::read_json(OP, response).await
    }

    async fn fetch_party_ledger_pdf(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<Vec<u8>, BackendError> {
        const OP: &str = "get_party_ledger_pdf";
        let response = self
            .client
            .traced_get(&self.url(&format!("/api/ledger/party/{}/pdf", party_id)))
            .bearer_auth(self.settings.api_token.expose_secret())
            .header("accept", "application/pdf")
            .query(&range.as_query())
            .timeout(self.settings.pdf_timeout())
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation: OP, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                operation: OP,
                status,
                message: extract_error_message(&body),
            });
        }

        // Read as bytes end to end; any text decoding here would corrupt the file.
        let bytes = response
            .bytes()
            .await
            .map_err(|source| BackendError::Transport { operation: OP, source })?;

        if !bytes.starts_with(PDF_MAGIC) {
            return Err(BackendError::InvalidPayload {
                operation: OP,
                reason: "Ledger PDF download was not a PDF document".to_string(),
            });
        }

        tracing::info!(party_id, size = bytes.len(), "Ledger PDF downloaded");
        Ok(bytes.to_vec())
    }

    async fn fetch_payment_list(&self, floor: Floor, size: u32) -> Result<PaymentPage, BackendError> {
        const OP: &str = "get_payment_list";
        let size = size.to_string();
        let response = self
            .client
            .traced_get(&self.url("/api/payments"))
            .bearer_auth(self.settings.api_token.expose_secret())
            .query(&[("floor", floor.as_str()), ("page", "0"), ("size", size.as_str())])
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation: OP, source })?;

        Self::read_json(OP, response).await
    }
}

#[async_trait]
impl LedgerBackend for BackendClient {
    async fn get_all_parties(&self) -> Result<Vec<Party>, BackendError> {
        retry_call(&self.retry, "get_all_parties", || self.fetch_parties()).await
    }

    async fn get_party_ledger(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<PartyLedgerResponse, BackendError> {
        retry_call(&self.retry, "get_party_ledger", || {
            self.fetch_party_ledger(party_id, range)
        })
        .await
    }

    async fn get_party_ledger_pdf(
        &self,
        party_id: PartyId,
        range: DateRange,
    ) -> Result<Vec<u8>, BackendError> {
        retry_call(&self.retry, "get_party_ledger_pdf", || {
            self.fetch_party_ledger_pdf(party_id, range)
        })
        .await
    }

    async fn get_payment_list(&self, floor: Floor, size: u32) -> Result<PaymentPage, BackendError> {
        retry_call(&self.retry, "get_payment_list", || {
            self.fetch_payment_list(floor, size)
        })
        .await
    }

    async fn receive_payment(
        &self,
        payment_id: PaymentId,
        receipt: &PaymentReceipt,
    ) -> Result<Payment, BackendError> {
        const OP: &str = "receive_payment";
        let response = self
            .client
            .traced_put(&self.url(&format!("/api/payments/{}/receive", payment_id)))
            .bearer_auth(self.settings.api_token.expose_secret())
            .json(receipt)
            .send()
            .await
            .map_err(|source| BackendError::Transport { operation: OP, source })?;

        let payment: Payment = Self::read_json(OP, response).await?;
        tracing::info!(
            payment_id,
            order_id = payment.order_id,
            mode = %payment.mode(),
            amount = %receipt.new_received_amount,
            "Payment receipt recorded upstream"
        );
        Ok(payment)
    }
}

/// Pull a human message out of an error body (`{"message": ...}` or
/// `{"error": ...}`), falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}
