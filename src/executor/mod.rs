//! 执行器层（WorkUnit 抽象）
//!
//! 一个执行单元 = 一次"打开页面 → 等待加载完成 → 调用提取能力"的外部任务。
//! 调度器只通过 [`TaskExecutor`] 与它交互，不关心背后是浏览器标签页还是别的东西。
//!
//! 执行单元自身不做任何重试。

pub mod browser_tab;
#[cfg(test)]
pub mod fake;

pub use browser_tab::{BrowserTabExecutor, TabHandle};

use crate::models::{OutputFormat, ScrapeResult};
use async_trait::async_trait;
use thiserror::Error;

/// 执行单元操作失败
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// 创建执行单元失败（没拿到句柄）
    #[error("创建标签页失败 ({url}): {message}")]
    LaunchFailed { url: String, message: String },
    /// 请求无法送达或没有应答
    #[error("通信失败: {0}")]
    Transport(String),
    /// 提取能力应答了，但标记了内容级错误
    #[error("提取失败: {0}")]
    Extraction(String),
}

/// 执行单元能力
///
/// - `create`：异步创建单元，句柄可能延迟到达，也可能失败
/// - `wait_loaded`：等待页面报告加载完成
/// - `extract`：按格式标志调用提取能力，返回 `{title, content, error?}`
/// - `cancel`：尽力终止；幂等，已不存在的句柄不报错
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    /// 不透明句柄
    type Handle: Clone + Send + Sync + 'static;

    async fn create(&self, url: &str) -> Result<Self::Handle, ExecutorError>;

    async fn wait_loaded(&self, handle: &Self::Handle) -> Result<(), ExecutorError>;

    async fn extract(
        &self,
        handle: &Self::Handle,
        format: OutputFormat,
    ) -> Result<ScrapeResult, ExecutorError>;

    async fn cancel(&self, handle: &Self::Handle);
}

/// 提取脚本应答了，但标记了 `error`：转成 [`ExecutorError::Extraction`]
pub fn reject_flagged(result: ScrapeResult) -> Result<ScrapeResult, ExecutorError> {
    if result.is_error() {
        Err(ExecutorError::Extraction(result.error.unwrap_or_default()))
    } else {
        Ok(result)
    }
}
