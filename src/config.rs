use crate::error::{AppResult, ConfigError};
use crate::models::OutputFormat;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时打开的标签页数量上限
    pub max_concurrency: usize,
    /// 单个标签页的超时时间（从拿到标签页开始计时）
    pub tab_timeout: Duration,
    /// 页面加载完成后、请求提取前的等待时间
    pub settle_delay: Duration,
    /// 关闭标签页的最长等待时间
    pub cancel_timeout: Duration,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 是否自行启动无头浏览器（否则连接已运行的浏览器）
    pub headless: bool,
    /// 无头模式下的浏览器可执行文件
    pub chrome_executable: Option<PathBuf>,
    /// 提取格式
    pub output_format: OutputFormat,
    /// 任务清单文件（TOML 或 JSON）
    pub items_file: PathBuf,
    /// 归档输出目录
    pub output_dir: PathBuf,
    /// 归档文件名前缀
    pub export_prefix: String,
    /// 自定义提取脚本
    pub extractor_script: Option<PathBuf>,
    /// 是否按提交顺序排列归档条目（默认按完成顺序）
    pub stable_entry_order: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            tab_timeout: Duration::from_millis(120_000),
            settle_delay: Duration::from_millis(3_000),
            cancel_timeout: Duration::from_millis(5_000),
            browser_debug_port: 9222,
            headless: false,
            chrome_executable: None,
            output_format: OutputFormat::Markdown,
            items_file: PathBuf::from("items.toml"),
            output_dir: PathBuf::from("exports"),
            export_prefix: "Tab_Export".to_string(),
            extractor_script: None,
            stable_entry_order: false,
            verbose_logging: false,
            output_log_file: "export_log.txt".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源读取配置（便于测试）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let default = Self::default();
        let millis = |name: &str, fallback: Duration| -> AppResult<Duration> {
            Ok(parse_var::<u64>(&lookup, name, "毫秒数")?
                .map(Duration::from_millis)
                .unwrap_or(fallback))
        };

        Ok(Self {
            max_concurrency: parse_var(&lookup, "MAX_CONCURRENCY", "整数")?
                .unwrap_or(default.max_concurrency),
            tab_timeout: millis("TAB_TIMEOUT_MS", default.tab_timeout)?,
            settle_delay: millis("SETTLE_DELAY_MS", default.settle_delay)?,
            cancel_timeout: millis("CANCEL_TIMEOUT_MS", default.cancel_timeout)?,
            browser_debug_port: parse_var(&lookup, "BROWSER_DEBUG_PORT", "端口号")?
                .unwrap_or(default.browser_debug_port),
            headless: parse_var(&lookup, "HEADLESS", "布尔值")?.unwrap_or(default.headless),
            chrome_executable: lookup("CHROME_EXECUTABLE").map(PathBuf::from),
            output_format: parse_var(&lookup, "OUTPUT_FORMAT", "markdown/html")?
                .unwrap_or(default.output_format),
            items_file: lookup("ITEMS_FILE")
                .map(PathBuf::from)
                .unwrap_or(default.items_file),
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.output_dir),
            export_prefix: lookup("EXPORT_PREFIX").unwrap_or(default.export_prefix),
            extractor_script: lookup("EXTRACTOR_SCRIPT").map(PathBuf::from),
            stable_entry_order: parse_var(&lookup, "STABLE_ENTRY_ORDER", "布尔值")?
                .unwrap_or(default.stable_entry_order),
            verbose_logging: parse_var(&lookup, "VERBOSE_LOGGING", "布尔值")?
                .unwrap_or(default.verbose_logging),
            output_log_file: lookup("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    expected_type: &str,
) -> AppResult<Option<T>> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
    }
}
