//! レポート要求をページングしながら行ストリームに変換する

use std::collections::HashSet;

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::error::ReportError;
use crate::request::{validate_customer_id, ReportRequest};
use crate::row::ReportRow;
use crate::traits::{SearchClient, SearchRequest};

/// ページ取得の進行状態
enum PageState {
    Start,
    Next {
        search: SearchRequest,
        fetched: usize,
        /// これまでに受け取ったページトークン
        seen: HashSet<String>,
    },
    Done,
}

/// レポート取得
///
/// クライアントは外から注入する。再試行はしない。
pub struct ReportRequester<C> {
    client: C,
}

impl<C: SearchClient> ReportRequester<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// 行を遅延取得するストリーム
    ///
    /// ページ境界は呼び出し側から見えない。最初のエラーで終了する。
    pub fn rows<'a>(
        &'a self,
        customer_id: &'a str,
        request: &'a ReportRequest,
    ) -> impl Stream<Item = Result<ReportRow, ReportError>> + Send + 'a {
        stream::try_unfold(PageState::Start, move |state| async move {
            let (search, fetched, mut seen) = match state {
                PageState::Done => return Ok(None),
                PageState::Start => {
                    let customer_id = validate_customer_id(customer_id)?;
                    request.validate()?;

                    info!(
                        "Requesting report '{}' for customer {} from {} to {}",
                        request.name, customer_id, request.date_range.start, request.date_range.end
                    );
                    let query = request.to_query();
                    debug!("GAQL: {}", query);
                    (SearchRequest::new(customer_id, query), 0, HashSet::new())
                }
                PageState::Next {
                    search,
                    fetched,
                    seen,
                } => (search, fetched, seen),
            };

            let response = self.client.search(&search).await?;

            let requested = request.fields();
            let page: Vec<ReportRow> = response
                .results
                .iter()
                .map(|result| ReportRow::from_result(result, &requested))
                .collect();
            let fetched = fetched + page.len();

            match response.total_results_count {
                Some(total) => info!("Request returned {}/{} rows", fetched, total),
                None => info!("Request returned {} rows", fetched),
            }

            let next = match response.next_token() {
                None => {
                    info!("Finished fetching report with {} rows", fetched);
                    PageState::Done
                }
                Some(token) if !seen.insert(token.to_string()) => {
                    return Err(ReportError::DataProcessing(format!(
                        "同じページトークンが繰り返されました: {}",
                        token
                    )));
                }
                Some(token) => {
                    debug!("Executing search request with next_page_token: {}", token);
                    PageState::Next {
                        search: search.with_page_token(token),
                        fetched,
                        seen,
                    }
                }
            };

            Ok::<_, ReportError>(Some((page, next)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<ReportRow, ReportError>)))
        .try_flatten()
    }

    /// 全行を取得する
    pub async fn fetch(
        &self,
        customer_id: &str,
        request: &ReportRequest,
    ) -> Result<Vec<ReportRow>, ReportError> {
        self.rows(customer_id, request).try_collect().await
    }

    /// 1行ずつ処理する (全件をメモリに載せない)
    pub async fn for_each_row<F>(
        &self,
        customer_id: &str,
        request: &ReportRequest,
        mut f: F,
    ) -> Result<usize, ReportError>
    where
        F: FnMut(ReportRow) -> Result<(), ReportError>,
    {
        let rows = self.rows(customer_id, request);
        futures::pin_mut!(rows);

        let mut count = 0;
        while let Some(row) = rows.next().await {
            f(row?)?;
            count += 1;
        }
        Ok(count)
    }
}
