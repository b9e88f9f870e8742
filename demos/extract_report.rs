use chrono::Local;
use gads_reports::{
    AdsConfig, ColumnNaming, DateRange, GoogleAdsClient, ReportError, ReportJob, ReportModel,
    ReportService, ShapeOptions,
};

#[tokio::main]
async fn main() {
    // ログ設定
    gads_reports::logging::init("info,gads_reports=debug");

    // 環境変数 (.env) から認証情報を取得。なければ google-ads.yaml を探す
    let config = match AdsConfig::from_env() {
        Ok(config) => config,
        Err(_) => match gads_reports::load_credentials(None) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("認証情報の読み込みに失敗: {}", e);
                return;
            }
        },
    };

    let customer_id =
        std::env::var("GADS_CUSTOMER_ID").expect("GADS_CUSTOMER_ID environment variable not set");
    let report_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "keyword_report".to_string());

    let Some(model) = ReportModel::by_name(&report_name) else {
        eprintln!("不明なレポート: {}", report_name);
        return;
    };

    println!("=== Google Ads Report: {} ===", model.report_name);

    let client = match GoogleAdsClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("クライアント初期化エラー: {}", e);
            return;
        }
    };

    let range = DateRange::last_n_days(3, Local::now().date_naive())
        .expect("valid date range");
    let job = ReportJob::new(customer_id, model.request(range))
        .with_options(ShapeOptions::default().with_naming(ColumnNaming::Friendly));

    let service = ReportService::new(client);
    match service.extract(job).await {
        Ok(table) => {
            println!("成功! {} rows -> {}", table.len(), model.table_name);
            println!("columns: {:?}", table.column_names());
            for row in table.rows().iter().take(5) {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("  {}", cells.join(" | "));
            }
        }
        Err(ReportError::Authentication(msg)) => eprintln!("認証エラー: {}", msg),
        Err(ReportError::QuotaExceeded(msg)) => eprintln!("クォータ超過 (時間をおいて再実行): {}", msg),
        Err(ReportError::InvalidQuery(msg)) => eprintln!("クエリエラー: {}", msg),
        Err(e) => eprintln!("エラー: {}", e),
    }
}
