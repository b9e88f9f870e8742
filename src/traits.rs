use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ReportError;

/// googleAds:search の1リクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(skip)]
    pub customer_id: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    pub search_settings: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    pub return_total_results_count: bool,
}

impl SearchRequest {
    pub fn new(customer_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            query: query.into(),
            page_token: None,
            search_settings: SearchSettings {
                return_total_results_count: true,
            },
        }
    }

    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

/// googleAds:search の1ページ分のレスポンス
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default, deserialize_with = "int64_from_json")]
    pub total_results_count: Option<i64>,
    #[serde(default)]
    pub field_mask: Option<String>,
}

impl SearchResponse {
    /// 次ページのトークン (空文字は最終ページ扱い)
    pub fn next_token(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// int64 は JSON 上で文字列になる
fn int64_from_json<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64Repr {
        Number(i64),
        Text(String),
    }

    match Option::<Int64Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Int64Repr::Number(n)) => Ok(Some(n)),
        Some(Int64Repr::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// レポート検索APIの呼び出し口
///
/// 本番は `GoogleAdsClient`、テストはモックを注入する。
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// 1ページ取得
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ReportError>;
}

#[async_trait]
impl<C> SearchClient for Arc<C>
where
    C: SearchClient + ?Sized,
{
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ReportError> {
        (**self).search(request).await
    }
}

#[async_trait]
impl<C> SearchClient for &C
where
    C: SearchClient + ?Sized,
{
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ReportError> {
        (**self).search(request).await
    }
}
