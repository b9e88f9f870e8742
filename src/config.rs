use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::error::ReportError;
use crate::request::validate_customer_id;

pub const DEFAULT_API_VERSION: &str = "v20";
pub const DEFAULT_ENDPOINT: &str = "https://googleads.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// HTTP タイムアウト (3分)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 3);

const ENV_CONFIG_PATH: &str = "GOOGLE_ADS_CONFIGURATION_FILE_PATH";
const ENV_DEVELOPER_TOKEN: &str = "GOOGLE_ADS_DEVELOPER_TOKEN";
const ENV_CLIENT_ID: &str = "GOOGLE_ADS_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "GOOGLE_ADS_CLIENT_SECRET";
const ENV_REFRESH_TOKEN: &str = "GOOGLE_ADS_REFRESH_TOKEN";
const ENV_LOGIN_CUSTOMER_ID: &str = "GOOGLE_ADS_LOGIN_CUSTOMER_ID";

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Google Ads API 接続設定
#[derive(Clone)]
pub struct AdsConfig {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// MCC 経由でアクセスする場合の管理アカウントID
    pub login_customer_id: Option<String>,
    pub api_version: String,
    pub endpoint: String,
    pub token_uri: String,
    pub timeout: Duration,
}

// 秘密情報をログに出さない
impl std::fmt::Debug for AdsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsConfig")
            .field("client_id", &self.client_id)
            .field("login_customer_id", &self.login_customer_id)
            .field("api_version", &self.api_version)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for AdsConfig {
    fn default() -> Self {
        Self {
            developer_token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            login_customer_id: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// google-ads.yaml の中身
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    developer_token: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default, deserialize_with = "string_or_number")]
    login_customer_id: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Repr>::deserialize(deserializer)? {
        None => None,
        Some(Repr::Number(n)) => Some(n.to_string()),
        Some(Repr::Text(s)) if s.trim().is_empty() => None,
        Some(Repr::Text(s)) => Some(s),
    })
}

impl AdsConfig {
    pub fn new(
        developer_token: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            developer_token: developer_token.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            ..Default::default()
        }
    }

    pub fn with_login_customer_id(mut self, id: impl Into<String>) -> Self {
        self.login_customer_id = Some(id.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri = uri.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// YAML 文字列から読み込む (`${VAR}` は環境変数で置換)
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ReportError> {
        let substituted = substitute_env_vars(yaml)?;
        let file: CredentialsFile = serde_yaml::from_str(&substituted)?;

        let mut config = Self::new(
            file.developer_token,
            file.client_id,
            file.client_secret,
            file.refresh_token,
        );
        config.login_customer_id = file.login_customer_id;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Configuration(format!(
                "認証ファイルを読み込めません {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// 環境変数から読み込む (`.env` があれば先に読む)
    pub fn from_env() -> Result<Self, ReportError> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("Loaded .env from {}", path.display());
        }

        let mut missing = Vec::new();
        let mut required = |name: &str| match std::env::var(name) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let developer_token = required(ENV_DEVELOPER_TOKEN);
        let client_id = required(ENV_CLIENT_ID);
        let client_secret = required(ENV_CLIENT_SECRET);
        let refresh_token = required(ENV_REFRESH_TOKEN);

        if !missing.is_empty() {
            return Err(ReportError::Configuration(format!(
                "環境変数が設定されていません: {}",
                missing.join(", ")
            )));
        }

        let mut config = Self::new(developer_token, client_id, client_secret, refresh_token);
        config.login_customer_id = std::env::var(ENV_LOGIN_CUSTOMER_ID)
            .ok()
            .filter(|v| !v.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    /// 必須項目の確認と login_customer_id の正規化
    pub fn validate(&mut self) -> Result<(), ReportError> {
        let required = [
            ("developer_token", &self.developer_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ];
        let empty: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if !empty.is_empty() {
            return Err(ReportError::Configuration(format!(
                "必須項目が空です: {}",
                empty.join(", ")
            )));
        }

        if let Some(id) = &self.login_customer_id {
            self.login_customer_id = Some(validate_customer_id(id)?);
        }
        Ok(())
    }
}

/// `${VAR}` を環境変数の値で置換する。未設定の変数はまとめてエラーにする。
///
/// `#` で始まるコメント行はそのまま残す。
pub fn substitute_env_vars(input: &str) -> Result<String, ReportError> {
    let mut missing = Vec::new();
    let mut result = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            continue;
        }
        let replaced = ENV_VAR_RE.replace_all(line, |caps: &regex::Captures<'_>| {
            match std::env::var(&caps[1]) {
                Ok(val) => val,
                Err(_) => {
                    missing.push(caps[1].to_string());
                    String::new()
                }
            }
        });
        result.push_str(&replaced);
    }

    if !missing.is_empty() {
        return Err(ReportError::Configuration(format!(
            "環境変数が設定されていません: {}",
            missing.join(", ")
        )));
    }
    Ok(result)
}

fn default_credential_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("secrets").join("google-ads.yaml")];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".google-ads.yaml"));
    }
    paths.push(PathBuf::from("google-ads.yaml"));
    paths
}

/// 認証 YAML を探して読み込む
///
/// 探索順: 引数 → `GOOGLE_ADS_CONFIGURATION_FILE_PATH` → `secrets/google-ads.yaml`
/// → `~/.google-ads.yaml` → `google-ads.yaml`
pub fn load_credentials(path: Option<&Path>) -> Result<AdsConfig, ReportError> {
    let candidates = match path {
        Some(p) => vec![p.to_path_buf()],
        None => match std::env::var_os(ENV_CONFIG_PATH) {
            Some(p) => vec![PathBuf::from(p)],
            None => default_credential_paths(),
        },
    };

    for candidate in &candidates {
        if candidate.exists() {
            info!("Loading Google Ads credentials from {}", candidate.display());
            return AdsConfig::from_yaml_file(candidate);
        }
    }

    Err(ReportError::Configuration(format!(
        "認証ファイルが見つかりません: {:?}",
        candidates
    )))
}
