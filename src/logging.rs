use tracing_subscriber::EnvFilter;

/// tracing-subscriber でログ出力を初期化する
///
/// `RUST_LOG` があればそれを優先し、なければ `log_level` を使う。
/// 既に初期化済みの場合は何もしない。
pub fn init(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
