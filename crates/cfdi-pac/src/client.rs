//! HTTP implementation of [`StampingAuthority`].
//!
//! One `reqwest::Client` with the bearer token and user agent installed as
//! default headers and the configured per-request timeout. Each operation
//! reads the full body before deciding success, so the raw text is
//! available for error classification and audit logging.

use std::time::Duration;

use cfdi_invoice::StampReceipt;
use serde::de::DeserializeOwned;

use crate::authority::StampingAuthority;
use crate::config::{ConfigError, PacConfig};
use crate::error::{AuthorityError, AuthorityErrorKind};
use crate::types::{
    CancelAcknowledgment, CancelData, CancelRequest, CreditBalance, ProviderResponse, StampBody,
    StampData, StampRequest, StatusQuery, StatusReport, PREVIOUSLY_CANCELLED, PREVIOUSLY_STAMPED,
};

const STAMP: &str = "POST /cfdi40/stamp";
const CANCEL: &str = "POST /cfdi40/cancel";
const STATUS: &str = "GET /cfdi40/status";
const CREDITS: &str = "GET /account/credits";

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

struct RawResponse {
    status: u16,
    body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn parse<T: DeserializeOwned>(&self) -> Option<ProviderResponse<T>> {
        serde_json::from_str(&self.body).ok()
    }

    fn into_error(self, endpoint: &str) -> AuthorityError {
        let err = AuthorityError::from_response(endpoint, self.status, &self.body);
        if err.kind == AuthorityErrorKind::Unknown {
            tracing::error!(
                endpoint,
                status = self.status,
                code = ?err.code,
                body = %self.body,
                "unclassified authority response"
            );
        }
        err
    }
}

#[derive(Debug, Clone)]
pub struct HttpStampingClient {
    http: reqwest::Client,
    config: PacConfig,
}

impl HttpStampingClient {
    pub fn new(config: PacConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                let mut auth =
                    reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_token.as_str()))
                        .map_err(|_| ConfigError::InvalidToken)?;
                auth.set_sensitive(true);
                headers.insert(reqwest::header::AUTHORIZATION, auth);
                headers
            })
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &PacConfig {
        &self.config
    }

    async fn execute(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<RawResponse, AuthorityError> {
        let resp = request.send().await.map_err(|e| {
            let err = AuthorityError::transport(endpoint, &e);
            tracing::warn!(endpoint, error_kind = %err.kind, "authority request failed: {e}");
            err
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthorityError::transport(endpoint, &e))?;
        tracing::debug!(endpoint, status, "authority responded");
        Ok(RawResponse { status, body })
    }

    fn malformed(endpoint: &str, raw: &RawResponse) -> AuthorityError {
        tracing::error!(endpoint, status = raw.status, body = %raw.body, "malformed authority response");
        AuthorityError {
            status: Some(raw.status),
            ..AuthorityError::new(AuthorityErrorKind::Unknown, endpoint, raw.body.clone())
        }
    }
}

impl StampingAuthority for HttpStampingClient {
    async fn stamp(&self, request: &StampRequest) -> Result<StampReceipt, AuthorityError> {
        let url = self.config.endpoint("cfdi40/stamp");
        let body = StampBody {
            envelope: request.envelope.as_str(),
            issuer: &request.issuer,
        };
        let raw = self
            .execute(
                STAMP,
                self.http
                    .post(&url)
                    .header(IDEMPOTENCY_KEY_HEADER, request.idempotency_key())
                    .json(&body),
            )
            .await?;

        match raw.parse::<StampData>() {
            Some(ProviderResponse {
                data: Some(data),
                code,
                ..
            }) if raw.is_success() || code.as_deref() == Some(PREVIOUSLY_STAMPED) => {
                if code.as_deref() == Some(PREVIOUSLY_STAMPED) {
                    tracing::info!(uuid = %data.uuid, "authority returned a previous stamp for this envelope");
                }
                data.into_receipt(STAMP)
            }
            _ if raw.is_success() => Err(Self::malformed(STAMP, &raw)),
            _ => Err(raw.into_error(STAMP)),
        }
    }

    async fn cancel(&self, request: &CancelRequest) -> Result<CancelAcknowledgment, AuthorityError> {
        let url = self.config.endpoint("cfdi40/cancel");
        let raw = self.execute(CANCEL, self.http.post(&url).json(request)).await?;

        let parsed = raw.parse::<CancelData>();
        let code = parsed.as_ref().and_then(|p| p.code.clone());
        let already_cancelled = code.as_deref() == Some(PREVIOUSLY_CANCELLED);
        if !raw.is_success() && !already_cancelled {
            return Err(raw.into_error(CANCEL));
        }

        let (data, message) = match parsed {
            Some(p) => (p.data.unwrap_or_default(), p.message),
            None => return Err(Self::malformed(CANCEL, &raw)),
        };
        if already_cancelled {
            tracing::info!(uuid = %request.uuid, "authority reports document already cancelled");
        }
        Ok(CancelAcknowledgment {
            status: data
                .status
                .unwrap_or_else(|| if already_cancelled { "cancelled" } else { "requested" }.to_string()),
            acknowledgment: data.acuse.or(message).unwrap_or_default(),
            already_cancelled,
        })
    }

    async fn query_status(&self, query: &StatusQuery) -> Result<StatusReport, AuthorityError> {
        let url = self.config.endpoint("cfdi40/status");
        let raw = self
            .execute(STATUS, self.http.get(&url).query(&query.query_pairs()))
            .await?;
        if !raw.is_success() {
            return Err(raw.into_error(STATUS));
        }
        match raw.parse::<StatusReport>() {
            Some(ProviderResponse { data: Some(report), .. }) => Ok(report),
            _ => Err(Self::malformed(STATUS, &raw)),
        }
    }

    async fn credit_balance(&self) -> Result<CreditBalance, AuthorityError> {
        let url = self.config.endpoint("account/credits");
        let raw = self.execute(CREDITS, self.http.get(&url)).await?;
        if !raw.is_success() {
            return Err(raw.into_error(CREDITS));
        }
        match raw.parse::<CreditBalance>() {
            Some(ProviderResponse { data: Some(balance), .. }) => Ok(balance),
            _ => Err(Self::malformed(CREDITS, &raw)),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
