//! Google Ads REST API クライアント

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::AdsConfig;
use crate::error::ReportError;
use crate::traits::{SearchClient, SearchRequest, SearchResponse};

/// 期限切れ直前のトークンは使わない
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// `{"error": {...}}` 形式のエラーレスポンス
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    #[serde(default)]
    pub error: ApiErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub errors: Vec<GoogleAdsError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleAdsError {
    #[serde(default)]
    pub error_code: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub message: String,
}

/// HTTPステータスとエラーボディを分類する
pub(crate) fn classify_api_error(status: StatusCode, body: &str) -> ReportError {
    let envelope: ApiErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let api = envelope.error;

    let ads_errors: Vec<&GoogleAdsError> =
        api.details.iter().flat_map(|d| d.errors.iter()).collect();
    let has_code = |kinds: &[&str]| {
        ads_errors
            .iter()
            .any(|e| e.error_code.keys().any(|k| kinds.contains(&k.as_str())))
    };

    let message = {
        let details: Vec<String> = ads_errors
            .iter()
            .map(|e| {
                let code = e
                    .error_code
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.as_str().unwrap_or_default()))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("[{}] {}", code, e.message)
            })
            .collect();
        match (api.message.is_empty(), details.is_empty()) {
            (true, true) => body.chars().take(500).collect(),
            (false, true) => api.message.clone(),
            (_, false) => details.join("; "),
        }
    };

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || api.status == "UNAUTHENTICATED"
        || api.status == "PERMISSION_DENIED"
        || has_code(&["authenticationError", "authorizationError"])
    {
        return ReportError::Authentication(message);
    }

    if status == StatusCode::TOO_MANY_REQUESTS
        || api.status == "RESOURCE_EXHAUSTED"
        || has_code(&["quotaError"])
    {
        return ReportError::QuotaExceeded(message);
    }

    if has_code(&["queryError", "fieldError", "requestError"])
        || (status == StatusCode::BAD_REQUEST && api.status == "INVALID_ARGUMENT")
    {
        return ReportError::InvalidQuery(message);
    }

    ReportError::Api {
        status: if api.code != 0 { api.code } else { status.as_u16() },
        message,
    }
}

/// OAuth2 リフレッシュトークンで認証する Google Ads クライアント
///
/// アクセストークンはインスタンスごとにキャッシュする。clone はキャッシュを共有する。
#[derive(Debug, Clone)]
pub struct GoogleAdsClient {
    config: AdsConfig,
    http: reqwest::Client,
    token: Arc<Mutex<Option<AccessToken>>>,
}

impl GoogleAdsClient {
    pub fn new(mut config: AdsConfig) -> Result<Self, ReportError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReportError::Configuration(format!("HTTPクライアント初期化エラー: {}", e)))?;

        Ok(Self {
            config,
            http,
            token: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &AdsConfig {
        &self.config
    }

    /// 認証情報が有効か確認する (トークンを取得してキャッシュ)
    pub async fn authenticate(&self) -> Result<(), ReportError> {
        self.access_token().await?;
        info!("Successful client authentication using Google Ads API");
        Ok(())
    }

    async fn access_token(&self) -> Result<String, ReportError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.token.clone());
        }

        debug!("Refreshing OAuth2 access token");
        let fresh = self.refresh_access_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn refresh_access_token(&self) -> Result<AccessToken, ReportError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.config.token_uri)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let oauth: OAuthErrorBody = serde_json::from_str(&body).unwrap_or_default();
            error!("Authentication failed: HTTP {} {}", status, oauth.error);
            let message = if oauth.error.is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("{}: {}", oauth.error, oauth.error_description)
            };
            return Err(if status.is_server_error() {
                ReportError::Api {
                    status: status.as_u16(),
                    message,
                }
            } else {
                ReportError::Authentication(message)
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }

    fn search_url(&self, customer_id: &str) -> String {
        format!(
            "{}/{}/customers/{}/googleAds:search",
            self.config.endpoint.trim_end_matches('/'),
            self.config.api_version,
            customer_id
        )
    }
}

#[async_trait]
impl SearchClient for GoogleAdsClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ReportError> {
        let token = self.access_token().await?;

        let mut builder = self
            .http
            .post(self.search_url(&request.customer_id))
            .bearer_auth(token)
            .header("developer-token", &self.config.developer_token)
            .json(request);
        if let Some(login_id) = &self.config.login_customer_id {
            builder = builder.header("login-customer-id", login_id);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = classify_api_error(status, &body);
            error!("Google Ads search failed: {}", err);
            return Err(err);
        }

        Ok(serde_json::from_str(&body)?)
    }
}
