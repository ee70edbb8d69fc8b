use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{config::Config, AppError, AppResult, GetField};

use super::{AuthOutcome, AuthSession, GatewayUser, IdentityGateway};

const DIRECTORY_PAGE_SIZE: usize = 200;

/// How a 4xx answer from the provider should be reported.
#[derive(Clone, Copy)]
enum Rejection {
    /// The caller's credentials or token were not accepted.
    Credentials,
    /// The caller sent something the provider refused.
    Input,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// Talks to a Supabase (GoTrue) auth server over its REST API.
#[derive(Clone)]
pub struct GoTrueGateway {
    http_client: reqwest::Client,
    auth_url: String,
    anon_key: String,
    service_role_key: Option<String>,
    reset_redirect: String,
}

impl GoTrueGateway {
    pub fn from_config(config: &Config) -> AppResult<GoTrueGateway> {
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(GoTrueGateway {
            http_client,
            auth_url: format!("{}/auth/v1", config.supabase_url),
            anon_key: config.anon_key.clone(),
            service_role_key: config.service_role_key.clone(),
            reset_redirect: format!("{}/reset-password", config.frontend_url),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.auth_url))
            .header("apikey", &self.anon_key)
    }

    fn user_request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        self.request(method, path).bearer_auth(access_token)
    }

    fn admin_request(&self, method: Method, path: &str) -> AppResult<RequestBuilder> {
        let key = self.service_role_key.as_deref().ok_or_else(|| {
            AppError::Internal("directory calls need SUPABASE_SERVICE_ROLE_KEY".to_owned())
        })?;
        Ok(self
            .http_client
            .request(method, format!("{}{path}", self.auth_url))
            .header("apikey", key)
            .bearer_auth(key))
    }
}

/// Passes 2xx responses through and turns everything else into the error
/// the caller should see.
async fn accept(response: Response, rejection: Rejection) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = provider_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request refused").to_owned());

    tracing::debug!(%status, %message, "identity provider refused request");

    Err(match (status, rejection) {
        (s, _) if s == StatusCode::UNAUTHORIZED || s == StatusCode::FORBIDDEN => {
            AppError::AuthenticationFailed(message)
        }
        (s, Rejection::Credentials) if s.is_client_error() => AppError::AuthenticationFailed(message),
        (s, Rejection::Input) if s.is_client_error() => AppError::Validation(message),
        (s, _) => AppError::Gateway(format!("{s}: {message}")),
    })
}

fn provider_message(body: &Value) -> Option<String> {
    ["msg", "error_description", "message", "error"]
        .into_iter()
        .find_map(|field| body.get_str_field(field).ok())
}

fn parse_session(body: &Value) -> AppResult<AuthSession> {
    Ok(AuthSession {
        access_token: body.get_str_field("access_token")?,
        refresh_token: body.get_str_field("refresh_token")?,
        expires_in: body.get("expires_in").and_then(Value::as_u64),
    })
}

fn parse_user(body: Value) -> AppResult<GatewayUser> {
    serde_json::from_value(body).map_err(|e| AppError::Gateway(format!("unexpected user shape: {e}")))
}

/// Token responses carry the session and the user side by side.
fn parse_token_response(body: Value) -> AppResult<AuthOutcome> {
    let session = parse_session(&body)?;
    let user = parse_user(body.get_obj_field("user")?.clone())?;
    Ok(AuthOutcome { user, session: Some(session) })
}

/// Provider ids are UUIDs; anything else cannot name an account and must not
/// be spliced into a URL path.
fn is_plain_id(user_id: &str) -> bool {
    !user_id.is_empty() && user_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[async_trait]
impl IdentityGateway for GoTrueGateway {
    async fn sign_up(&self, email: &str, password: &str, metadata: Map<String, Value>) -> AppResult<AuthOutcome> {
        let response = self
            .request(Method::POST, "/signup")
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;
        let body: Value = accept(response, Rejection::Input).await?.json().await?;

        // Without auto-confirm the provider answers with the bare user.
        if body.get("access_token").is_some() {
            parse_token_response(body)
        } else {
            Ok(AuthOutcome { user: parse_user(body)?, session: None })
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<AuthOutcome> {
        let response = self
            .request(Method::POST, "/token?grant_type=password")
            .json(&PasswordGrant { email, password })
            .send()
            .await?;
        let body: Value = accept(response, Rejection::Credentials).await?.json().await?;
        parse_token_response(body)
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let response = self
            .user_request(Method::POST, "/logout", access_token)
            .send()
            .await?;
        accept(response, Rejection::Credentials).await?;
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> AppResult<GatewayUser> {
        let response = self
            .user_request(Method::GET, "/user", access_token)
            .send()
            .await?;
        parse_user(accept(response, Rejection::Credentials).await?.json().await?)
    }

    async fn update_metadata(&self, access_token: &str, partial: Map<String, Value>) -> AppResult<GatewayUser> {
        let response = self
            .user_request(Method::PUT, "/user", access_token)
            .json(&json!({ "data": partial }))
            .send()
            .await?;
        parse_user(accept(response, Rejection::Input).await?.json().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> AppResult<AuthSession> {
        let response = self
            .request(Method::POST, "/token?grant_type=refresh_token")
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let body: Value = accept(response, Rejection::Credentials).await?.json().await?;
        parse_session(&body)
    }

    async fn reset_password(&self, email: &str) -> AppResult<()> {
        let response = self
            .request(Method::POST, "/recover")
            .query(&[("redirect_to", self.reset_redirect.as_str())])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        accept(response, Rejection::Input).await?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<GatewayUser>> {
        if !is_plain_id(user_id) {
            return Ok(None);
        }

        let response = self
            .admin_request(Method::GET, &format!("/admin/users/{user_id}"))?
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_user(accept(response, Rejection::Input).await?.json().await?).map(Some)
    }

    async fn list_users(&self) -> AppResult<Vec<GatewayUser>> {
        let mut users = Vec::new();
        for page in 1.. {
            let response = self
                .admin_request(Method::GET, "/admin/users")?
                .query(&[("page", page.to_string()), ("per_page", DIRECTORY_PAGE_SIZE.to_string())])
                .send()
                .await?;
            let body: Value = accept(response, Rejection::Input).await?.json().await?;

            let batch = body
                .get("users")
                .and_then(Value::as_array)
                .ok_or_else(|| AppError::Gateway("user list without users".to_owned()))?;
            let fetched = batch.len();
            for user in batch {
                users.push(parse_user(user.clone())?);
            }

            if fetched < DIRECTORY_PAGE_SIZE {
                break;
            }
        }
        Ok(users)
    }

    async fn update_app_metadata(&self, user_id: &str, partial: Map<String, Value>) -> AppResult<GatewayUser> {
        if !is_plain_id(user_id) {
            return Err(AppError::NotFound("user"));
        }

        let response = self
            .admin_request(Method::PUT, &format!("/admin/users/{user_id}"))?
            .json(&json!({ "app_metadata": partial }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("user"));
        }
        parse_user(accept(response, Rejection::Input).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn token_response_yields_session_and_user() {
        let outcome = parse_token_response(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {
                "id": "0d7c6a2e-6f7e-4a53-9a51-2f0a6f1f5a11",
                "email": "sam@example.com",
                "user_metadata": { "name": "Sam" },
                "app_metadata": { "provider": "email" }
            }
        }))
        .unwrap();

        let session = outcome.session.unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.expires_in, Some(3600));
        assert_eq!(outcome.user.email, "sam@example.com");
        assert_eq!(outcome.user.created_at, None);
    }

    #[test]
    fn token_response_without_tokens_is_a_gateway_error() {
        let err = parse_token_response(json!({ "user": { "id": "x" } })).unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));
    }

    #[rstest]
    #[case(json!({ "msg": "User already registered" }), Some("User already registered"))]
    #[case(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" }), Some("Invalid login credentials"))]
    #[case(json!({ "code": 500 }), None)]
    fn provider_messages(#[case] body: Value, #[case] expected: Option<&str>) {
        assert_eq!(provider_message(&body).as_deref(), expected);
    }

    #[rstest]
    #[case("0d7c6a2e-6f7e-4a53-9a51-2f0a6f1f5a11", true)]
    #[case("../admin", false)]
    #[case("a b", false)]
    #[case("", false)]
    fn only_plain_ids_reach_the_url(#[case] id: &str, #[case] plain: bool) {
        assert_eq!(is_plain_id(id), plain);
    }
}
