//! Google Ads レポート抽出ライブラリ
//!
//! - GAQL でレポートを要求し、ページングを隠した行ストリームとして取得
//! - 行を型付きの表 (`ReportTable`) に整形し、Arrow の RecordBatch に変換
//!
//! # 使用例
//!
//! ```rust,ignore
//! use chrono::Local;
//! use gads_reports::{
//!     load_credentials, DateRange, GoogleAdsClient, ReportJob, ReportModel, ReportService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gads_reports::ReportError> {
//!     gads_reports::logging::init("info");
//!
//!     let config = load_credentials(None)?;
//!     let client = GoogleAdsClient::new(config)?;
//!     client.authenticate().await?;
//!
//!     let range = DateRange::last_n_days(7, Local::now().date_naive())?;
//!     let request = ReportModel::keyword_report().request(range);
//!
//!     let service = ReportService::new(client);
//!     let table = service.extract(ReportJob::new("123-456-7890", request)).await?;
//!     println!("rows: {}", table.len());
//!
//!     let batch = table.to_record_batch()?;
//!     println!("arrow columns: {}", batch.num_columns());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod request;
pub mod requester;
pub mod row;
pub mod schema;
pub mod service;
pub mod shaper;
pub mod table;
pub mod traits;
pub mod value;

// 主要な型をリエクスポート
pub use client::GoogleAdsClient;
pub use config::{load_credentials, AdsConfig};
pub use error::ReportError;
pub use models::ReportModel;
pub use request::{validate_customer_id, DateRange, ReportRequest};
pub use requester::ReportRequester;
pub use row::ReportRow;
pub use schema::{ColumnSpec, Dtype, Schema};
pub use service::{ReportJob, ReportService};
pub use shaper::{ColumnNaming, ShapeOptions, Shaper, TextCleaning};
pub use table::{Column, ReportTable};
pub use traits::{SearchClient, SearchRequest, SearchResponse};
pub use value::{Micros, Value};
