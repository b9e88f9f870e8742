use thiserror::Error;

use crate::schema::Dtype;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("認証エラー: {0}")]
    Authentication(String),

    #[error("クォータ超過: {0}")]
    QuotaExceeded(String),

    #[error("不正なクエリ: {0}")]
    InvalidQuery(String),

    #[error("スキーマ不一致: 行{row}にスキーマ外のフィールド '{field}' があります")]
    SchemaMismatch { field: String, row: usize },

    #[error("型変換エラー: 行{row}のフィールド '{field}' の値 {value} を {dtype} に変換できません")]
    Coercion {
        field: String,
        row: usize,
        value: String,
        dtype: Dtype,
    },

    #[error("入力検証エラー: {0}")]
    Validation(String),

    #[error("設定エラー: {0}")]
    Configuration(String),

    #[error("データ処理エラー: {0}")]
    DataProcessing(String),

    #[error("APIエラー (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAMLエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("Arrow変換エラー: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl ReportError {
    /// 呼び出し側で再試行する価値があるか
    ///
    /// ライブラリ内部では再試行しない。判定のみ提供する。
    pub fn is_retryable(&self) -> bool {
        match self {
            ReportError::QuotaExceeded(_) => true,
            ReportError::Api { status, .. } => *status >= 500,
            ReportError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
