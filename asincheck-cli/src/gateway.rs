//! Remote API gateway client
//!
//! [`Gateway`] is the seam between the workflow components and the backend;
//! [`HttpGateway`] is the reqwest implementation. Every authorized request
//! carries the session's bearer token. A 401 triggers one token refresh and
//! one retry; the session is signed out only when the backend rejects the
//! refresh token.

use std::sync::Arc;

use async_trait::async_trait;
use asincheck_common::api::{
    BillingInfo, BillingInfoResponse, CheckRequest, CheckResponse, LoginRequest, LoginResponse,
    RefreshRequest, RefreshResponse, SubscriptionData, SubscriptionDataResponse, UserProfile,
};
use asincheck_common::config::ClientConfig;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::SessionStore;

const USER_AGENT: &str = concat!("asincheck/", env!("CARGO_PKG_VERSION"));

/// Gateway client errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Session expired, please sign in again")]
    Unauthorized,

    #[error("Email verification pending for {0}")]
    VerificationPending(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Session store error: {0}")]
    Session(#[from] asincheck_common::Error),
}

/// Backend operations used by the batch processor and subscription state
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Cheap pre-batch check (credentials present)
    async fn ensure_ready(&self) -> Result<(), GatewayError>;

    /// `POST /asin/check`
    async fn check_asins(&self, asins: &[String]) -> Result<CheckResponse, GatewayError>;

    /// `GET /user/subscription-data`
    async fn subscription_data(&self) -> Result<SubscriptionData, GatewayError>;

    /// `GET /subscription/billing-info`
    async fn billing_info(&self) -> Result<BillingInfo, GatewayError>;
}

/// reqwest-backed gateway
pub struct HttpGateway {
    http_client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /auth/login`, storing the session on success
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, GatewayError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        debug!(email = %email, "Signing in");
        let response = self
            .http_client
            .post(self.url("/auth/login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        let status = response.status();
        // Login failures come back as 4xx with a JSON body; try to decode either way
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        let login: LoginResponse = match serde_json::from_str(&text) {
            Ok(login) => login,
            Err(_) if !status.is_success() => {
                return Err(GatewayError::ApiError(status.as_u16(), text));
            }
            Err(e) => return Err(GatewayError::ParseError(e.to_string())),
        };

        if login.requires_verification {
            self.session.mark_pending_verification(email).await?;
            return Err(GatewayError::VerificationPending(email.to_string()));
        }

        match (login.success, login.token, login.user) {
            (true, Some(token), Some(user)) => {
                self.session
                    .sign_in(token, login.refresh_token, user.clone())
                    .await?;
                Ok(user)
            }
            _ => Err(GatewayError::Rejected(
                login.message.unwrap_or_else(|| "Login failed".to_string()),
            )),
        }
    }

    /// `POST /auth/refresh`, replacing the stored tokens
    ///
    /// Only a rejected refresh token yields `Unauthorized`; transport failures
    /// and server errors come back as `NetworkError`/`ApiError`.
    pub async fn refresh_session(&self) -> Result<(), GatewayError> {
        let refresh_token = self
            .session
            .refresh_token()
            .await
            .ok_or(GatewayError::Unauthorized)?;

        let response = self
            .http_client
            .post(self.url("/auth/refresh"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::ApiError(status.as_u16(), error_text));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;

        match (refreshed.success, refreshed.token) {
            (true, Some(token)) => {
                self.session
                    .update_tokens(token, refreshed.refresh_token)
                    .await?;
                info!("Access token refreshed");
                Ok(())
            }
            _ => Err(GatewayError::Unauthorized),
        }
    }

    /// Authorized JSON request with one refresh-and-retry on 401
    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let mut refreshed = false;

        loop {
            let token = self
                .session
                .token()
                .await
                .ok_or(GatewayError::NotAuthenticated)?;

            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&token);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, url = %url, "Gateway request");

            let response = request
                .send()
                .await
                .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if refreshed {
                    return Err(GatewayError::Unauthorized);
                }
                debug!("Got 401 from {}, refreshing token", path);
                match self.refresh_session().await {
                    Ok(()) => {}
                    Err(GatewayError::Unauthorized) => {
                        warn!("Refresh token rejected, signing out");
                        self.session.sign_out().await?;
                        return Err(GatewayError::Unauthorized);
                    }
                    Err(e) => {
                        warn!("Token refresh failed, keeping session: {}", e);
                        return Err(e);
                    }
                }
                refreshed = true;
                continue;
            }

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError(status.as_u16(), error_text));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::ParseError(e.to_string()));
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn ensure_ready(&self) -> Result<(), GatewayError> {
        if self.session.is_authenticated().await {
            Ok(())
        } else {
            Err(GatewayError::NotAuthenticated)
        }
    }

    async fn check_asins(&self, asins: &[String]) -> Result<CheckResponse, GatewayError> {
        let body = CheckRequest {
            asins: asins.to_vec(),
        };
        let response: CheckResponse = self
            .request_json(Method::POST, "/asin/check", Some(&body))
            .await?;

        if !response.success {
            return Err(GatewayError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "ASIN check failed".to_string()),
            ));
        }
        Ok(response)
    }

    async fn subscription_data(&self) -> Result<SubscriptionData, GatewayError> {
        let response: SubscriptionDataResponse = self
            .request_json::<(), _>(Method::GET, "/user/subscription-data", None)
            .await?;

        match (response.success, response.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(GatewayError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "Subscription data unavailable".to_string()),
            )),
        }
    }

    async fn billing_info(&self) -> Result<BillingInfo, GatewayError> {
        let response: BillingInfoResponse = self
            .request_json::<(), _>(Method::GET, "/subscription/billing-info", None)
            .await?;

        if response.success {
            Ok(response.info)
        } else {
            Err(GatewayError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "Billing info unavailable".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asincheck_common::events::EventBus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_client_creation() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(
            SessionStore::load(dir.path().join("s.json"), EventBus::new(10))
                .await
                .unwrap(),
        );
        let config = ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let gateway = HttpGateway::new(&config, session).expect("client builds");
        assert_eq!(gateway.url("/asin/check"), "http://127.0.0.1:9/asin/check");
    }

    #[tokio::test]
    async fn test_not_ready_without_token() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(
            SessionStore::load(dir.path().join("s.json"), EventBus::new(10))
                .await
                .unwrap(),
        );
        let gateway = HttpGateway::new(&ClientConfig::default(), session).unwrap();

        assert!(matches!(
            gateway.ensure_ready().await,
            Err(GatewayError::NotAuthenticated)
        ));
        // No token: fails before any network I/O
        assert!(matches!(
            gateway.subscription_data().await,
            Err(GatewayError::NotAuthenticated)
        ));
    }
}
