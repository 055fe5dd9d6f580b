use tracing_subscriber::EnvFilter;

/// 初始化日志输出
///
/// 优先使用 `RUST_LOG`，否则为 `info`（`verbose` 时为 `debug`）。
/// 重复调用不会报错。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
