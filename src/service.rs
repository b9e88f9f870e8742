use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::error::ReportError;
use crate::request::ReportRequest;
use crate::requester::ReportRequester;
use crate::schema::Schema;
use crate::shaper::{ShapeOptions, Shaper};
use crate::table::ReportTable;
use crate::traits::SearchClient;

/// レポート抽出リクエスト
#[derive(Debug, Clone)]
pub struct ReportJob {
    pub customer_id: String,
    pub request: ReportRequest,
    /// 未指定なら要求フィールドから推定
    pub schema: Option<Schema>,
    pub options: ShapeOptions,
}

impl ReportJob {
    pub fn new(customer_id: impl Into<String>, request: ReportRequest) -> Self {
        Self {
            customer_id: customer_id.into(),
            request,
            schema: None,
            options: ShapeOptions::default(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_options(mut self, options: ShapeOptions) -> Self {
        self.options = options;
        self
    }

    fn shaper(&self) -> Shaper {
        let schema = self
            .schema
            .clone()
            .unwrap_or_else(|| Schema::infer(&self.request));
        Shaper::new(schema).with_options(self.options.clone())
    }
}

/// tower::Serviceを実装したレポートサービス
///
/// 取得 → 整形 を1呼び出しで行う。
pub struct ReportService<C> {
    requester: Arc<ReportRequester<C>>,
}

impl<C> Clone for ReportService<C> {
    fn clone(&self) -> Self {
        Self {
            requester: Arc::clone(&self.requester),
        }
    }
}

impl<C: SearchClient + 'static> ReportService<C> {
    pub fn new(client: C) -> Self {
        Self {
            requester: Arc::new(ReportRequester::new(client)),
        }
    }

    pub fn requester(&self) -> &ReportRequester<C> {
        &self.requester
    }

    /// 1レポートを取得して表にする
    pub async fn extract(&self, job: ReportJob) -> Result<ReportTable, ReportError> {
        extract_with(&self.requester, job).await
    }
}

async fn extract_with<C: SearchClient>(
    requester: &ReportRequester<C>,
    job: ReportJob,
) -> Result<ReportTable, ReportError> {
    let shaper = job.shaper();
    let rows = requester.fetch(&job.customer_id, &job.request).await?;
    let fetched = rows.len();

    let table = shaper.shape(rows)?;

    info!(
        "Report '{}' shaped: fetched={}, rows={}, columns={}",
        job.request.name,
        fetched,
        table.len(),
        table.columns().len()
    );
    Ok(table)
}

impl<C: SearchClient + 'static> Service<ReportJob> for ReportService<C> {
    type Response = ReportTable;
    type Error = ReportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, job: ReportJob) -> Self::Future {
        info!(
            "レポート抽出リクエスト受信: report={}, customer_id={}",
            job.request.name, job.customer_id
        );

        let requester = Arc::clone(&self.requester);
        Box::pin(async move { extract_with(&requester, job).await })
    }
}
