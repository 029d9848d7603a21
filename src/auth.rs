use serde::Deserialize;
use thiserror::Error;

use crate::model::ClientInfo;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("identity request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity service answered HTTP {0}")]
    HttpStatus(u16),
    #[error("identity service refused the token: {0}")]
    Refused(String),
}

/// Response envelope of the identity service's `/user` endpoint.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    data: ApiData,
    #[serde(default)]
    error: ApiErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ApiData {
    #[serde(default)]
    user: ApiUser,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUser {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Verifies bearer tokens against the external identity service.
pub struct IdentityGate {
    base_url: String,
    http: reqwest::Client,
}

impl IdentityGate {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Resolves a token to the identity it belongs to. Any non-200 answer or
    /// an `ok: false` body counts as invalid credentials.
    pub async fn verify(&self, token: &str) -> Result<ClientInfo, AuthError> {
        let response = self
            .http
            .post(format!("{}/user", self.base_url))
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            log::error!("Identity service request yielded HTTP {status}");
            return Err(AuthError::HttpStatus(status.as_u16()));
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            log::warn!("Identity service refused token: {}", body.error.message);
            return Err(AuthError::Refused(body.error.message));
        }

        Ok(ClientInfo {
            user_id: body.data.user.id.to_string(),
            username: body.data.user.username,
        })
    }
}

/// Whether the request's declared origin is covered by the allow-list.
/// Matching is by substring, so an entry like `localhost` covers any port.
pub fn origin_allowed(allowed: &[String], origin: &str) -> bool {
    allowed.iter().any(|entry| origin.contains(entry.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn resolves_a_valid_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user"))
            .and(header("authorization", "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "data": { "user": { "id": 7, "username": "casey", "email": "c@example.com" } }
            })))
            .mount(&server)
            .await;

        let gate = IdentityGate::new(server.uri());
        let client = gate.verify("tok-1").await.unwrap();
        assert_eq!(client.user_id, "7");
        assert_eq!(client.username, "casey");
    }

    #[tokio::test]
    async fn not_ok_body_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "error": { "message": "token expired" }
            })))
            .mount(&server)
            .await;

        let gate = IdentityGate::new(server.uri());
        match gate.verify("stale").await {
            Err(AuthError::Refused(message)) => assert_eq!(message, "token expired"),
            other => panic!("expected Refused, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_200_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gate = IdentityGate::new(server.uri());
        match gate.verify("whatever").await {
            Err(AuthError::HttpStatus(code)) => assert_eq!(code, 503),
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[test]
    fn origin_matching_is_by_substring() {
        let allowed = vec!["127.0.0.1".to_string(), "localhost".to_string()];
        assert!(origin_allowed(&allowed, "http://localhost:3000"));
        assert!(origin_allowed(&allowed, "http://127.0.0.1"));
        assert!(!origin_allowed(&allowed, "https://evil.example.com"));
        assert!(!origin_allowed(&allowed, ""));
    }
}
