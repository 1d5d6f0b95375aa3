use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use tally_types::api::{
    AwardPointRequest, AwardPointResponse, DisputeEntryRequest, DisputeEntryResponse,
    EditReasonRequest, ErrorBody, ImagesRequest, LoginRequest, LoginResponse, ResetRequest,
    ResolveDisputeRequest, ResolveDisputeResponse, SignUpRequest, SignUpResponse, Snapshot,
    StatsResponse,
};
use tally_types::{GameState, HistoryEntry, Person};

use crate::error::{ClientError, Result};
use crate::validation;

/// REST client for one signed-in session.
#[derive(Clone)]
pub struct TallyClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl TallyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// WebSocket endpoint matching the REST base URL.
    pub fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/gateway")
    }

    // -- Auth --

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        confirm_password: &str,
        profile: Option<Person>,
    ) -> Result<SignUpResponse> {
        let profile = validation::validate_sign_up(profile, password, confirm_password)
            .map_err(ClientError::Validation)?;

        let body = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            profile,
        };
        let resp: SignUpResponse = self.send(self.request(Method::POST, "/auth/signup").json(&body)).await?;
        self.token = Some(resp.token.clone());
        Ok(resp)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self.send(self.request(Method::POST, "/auth/login").json(&body)).await?;
        self.token = Some(resp.token.clone());
        Ok(resp)
    }

    // -- Ledger --

    pub async fn snapshot(&self, limit: u32) -> Result<Snapshot> {
        let req = self.authed(Method::GET, "/state")?.query(&[("limit", limit)]);
        self.send(req).await
    }

    pub async fn stats(&self, person: Person, limit: u32) -> Result<StatsResponse> {
        let req = self
            .authed(Method::GET, &format!("/stats/{person}"))?
            .query(&[("limit", limit)]);
        self.send(req).await
    }

    pub async fn award_point(&self, person: Person, amount: i64, reason: &str) -> Result<AwardPointResponse> {
        let body = AwardPointRequest {
            person,
            amount,
            reason: reason.to_string(),
        };
        self.send_json(Method::POST, "/history", &body).await
    }

    pub async fn edit_reason(&self, entry_id: i64, reason: &str) -> Result<HistoryEntry> {
        validation::validate_reason(reason).map_err(ClientError::Validation)?;
        let body = EditReasonRequest { reason: reason.to_string() };
        self.send_json(Method::PATCH, &format!("/history/{entry_id}"), &body).await
    }

    pub async fn dispute_entry(&self, entry_id: i64, reason: &str) -> Result<DisputeEntryResponse> {
        validation::validate_dispute_reason(reason).map_err(ClientError::Validation)?;
        let body = DisputeEntryRequest { reason: reason.to_string() };
        self.send_json(Method::POST, &format!("/history/{entry_id}/dispute"), &body).await
    }

    pub async fn resolve_dispute(&self, dispute_id: i64, approved: bool) -> Result<ResolveDisputeResponse> {
        let body = ResolveDisputeRequest { approved };
        self.send_json(Method::POST, &format!("/disputes/{dispute_id}/resolve"), &body).await
    }

    /// `confirmed` is the user's answer to the "are you sure" prompt.
    pub async fn reset_all(&self, confirmed: bool) -> Result<GameState> {
        let body = ResetRequest { confirm: confirmed };
        self.send_json(Method::POST, "/reset", &body).await
    }

    pub async fn setup(&self, my_image: Option<String>, their_image: Option<String>) -> Result<GameState> {
        let body = ImagesRequest { my_image, their_image };
        self.send_json(Method::POST, "/setup", &body).await
    }

    pub async fn update_images(&self, my_image: Option<String>, their_image: Option<String>) -> Result<GameState> {
        let body = ImagesRequest { my_image, their_image };
        self.send_json(Method::PUT, "/images", &body).await
    }

    // -- Plumbing --

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::NotSignedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(&self, method: Method, path: &str, body: &B) -> Result<T> {
        let req = self.authed(method, path)?.json(body);
        self.send(req).await
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            debug!("Request failed with {}: {}", status, message);
            return Err(ClientError::Api { status, message });
        }

        Ok(resp.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url() {
        assert_eq!(TallyClient::new("http://localhost:3000/").gateway_url(), "ws://localhost:3000/gateway");
        assert_eq!(TallyClient::new("https://tally.example.com").gateway_url(), "wss://tally.example.com/gateway");
    }

    #[tokio::test]
    async fn test_validation_runs_before_request() {
        // Nothing listens on this port; validation must fail first.
        let mut client = TallyClient::new("http://127.0.0.1:9").with_token("t");

        let err = client.dispute_entry(1, " ").await.unwrap_err();
        assert_eq!(err.user_message(), validation::DISPUTE_REASON_REQUIRED);

        let err = client.edit_reason(1, "").await.unwrap_err();
        assert_eq!(err.user_message(), validation::REASON_REQUIRED);

        let err = client.sign_up("a@b.pt", "abcdef", "abcdef", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(validation::PROFILE_REQUIRED)));
    }

    #[tokio::test]
    async fn test_requires_token() {
        let client = TallyClient::new("http://127.0.0.1:9");
        assert!(matches!(client.snapshot(20).await, Err(ClientError::NotSignedIn)));
    }
}
