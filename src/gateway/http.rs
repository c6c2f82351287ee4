use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::auth::Session;
use crate::limits::*;
use crate::model::*;
use crate::observability::GATEWAY_REQUESTS_TOTAL;

use super::wire::{self, OrderRequest};
use super::{BookingGateway, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSettings {
    /// Everything up to and including the `/opensc` prefix.
    pub base_url: String,
    pub api_version: String,
    /// Page the platform expects in `fullPath`; `?openid=<id>` gets appended.
    pub order_page_url: String,
    pub request_timeout: Duration,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "https://dns.jzyxt.ruizhiedu.com:9071/xinshan/opensc".into(),
            api_version: "1.4.121".into(),
            order_page_url: "http://kfxy.ruizhiedu.com/#/pages/space/orderBatch".into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP client for the booking platform.
///
/// Holds no session state: every authenticated call takes the token it should
/// send.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: Client,
    settings: PlatformSettings,
}

impl PlatformClient {
    pub fn new(settings: PlatformSettings) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(GatewayError::from_reqwest)?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &PlatformSettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    /// Send, require a 2xx status, parse the body as JSON.
    async fn exchange(&self, op: &'static str, request: RequestBuilder) -> Result<Value, GatewayError> {
        let result = Self::exchange_inner(request).await;
        let status = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        metrics::counter!(GATEWAY_REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
        if let Ok(payload) = &result {
            debug!("{op} response: {payload}");
        }
        result
    }

    async fn exchange_inner(request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = request.send().await.map_err(GatewayError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response.json::<Value>().await.map_err(GatewayError::from_reqwest)
    }

    // ── Session endpoints ────────────────────────────────────

    /// Ask the platform to text a login code to `phone`.
    pub async fn send_sms_code(&self, phone: &str) -> Result<Value, GatewayError> {
        let request = self.http.post(self.url("user/loginSms")).form(&[("phone", phone)]);
        self.exchange("send_sms_code", request).await
    }

    /// Exchange phone + SMS code for a session token.
    pub async fn login_with_sms(&self, phone: &str, sms_code: &str, open_id: &str) -> Result<Session, GatewayError> {
        let request = self
            .http
            .post(self.url("user/SOLoginPhone"))
            .form(&[("phone", phone), ("smsCode", sms_code), ("openId", open_id)]);
        let payload = self.exchange("login", request).await?;

        let state = wire::action_state(&payload);
        let data = payload.get("data");
        let token = data.and_then(|d| d.get("token")).and_then(wire::lenient_string);
        let user_id = data.and_then(|d| d.get("userId")).and_then(wire::lenient_string);
        match (state, token, user_id) {
            (Some(LOGIN_OK_STATE), Some(token), Some(user_id)) if !token.is_empty() => {
                Ok(Session { token, user_id })
            }
            (state, _, _) => Err(GatewayError::Refused {
                state,
                message: wire::message(&payload).unwrap_or_else(|| "login rejected".into()),
            }),
        }
    }

    /// The masked, verified phone string the platform wants on orders.
    pub async fn verified_phone(&self, token: &str) -> Result<String, GatewayError> {
        let request = self.http.post(self.url("user/verifiedInfo")).header("Token", token);
        let payload = self.exchange("verified_info", request).await?;

        let state = wire::action_state(&payload);
        let phone = payload
            .get("data")
            .and_then(|d| d.get("phonestr"))
            .and_then(wire::lenient_string)
            .filter(|p| !p.trim().is_empty());
        match (state, phone) {
            (Some(ACTION_OK_STATE), Some(phone)) => Ok(phone),
            (state, _) => Err(GatewayError::Refused {
                state,
                message: wire::message(&payload).unwrap_or_else(|| "no verified phone on account".into()),
            }),
        }
    }
}

#[async_trait]
impl BookingGateway for PlatformClient {
    async fn query_availability(&self, query: &AvailabilityQuery) -> Result<AvailabilitySnapshot, GatewayError> {
        let date = query.date.format("%Y-%m-%d").to_string();
        let request = self.http.post(self.url("open/getSpaceOrderDetailsNew")).query(&[
            ("spaceId", query.space_id.as_str()),
            ("sportType", query.sport_type.as_str()),
            ("time", date.as_str()),
        ]);
        let payload = self.exchange("query_availability", request).await?;
        Ok(wire::snapshot_from_payload(&payload))
    }

    async fn submit_claim(&self, candidate: &Candidate, identity: &Identity) -> Result<ClaimResponse, GatewayError> {
        let body = OrderRequest::new(
            &self.settings.api_version,
            &self.settings.order_page_url,
            candidate,
            identity,
        );
        let request = self
            .http
            .post(self.url("order/createOrderBatch"))
            .header("Token", identity.token())
            .json(&body);
        let payload = self.exchange("submit_claim", request).await?;
        Ok(wire::claim_response_from_payload(&payload))
    }
}
