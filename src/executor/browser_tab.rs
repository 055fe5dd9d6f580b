//! 浏览器标签页执行器
//!
//! 每个执行单元对应一个后台标签页：先打开空白页拿到句柄，再导航到目标地址等待加载，
//! 最后在页面内执行提取脚本。

use super::{reject_flagged, ExecutorError, TaskExecutor};
use crate::infrastructure::{ExtractionScript, JsExecutor};
use crate::models::{OutputFormat, ScrapeResult};
use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use tracing::debug;

/// 标签页句柄
#[derive(Clone)]
pub struct TabHandle {
    page: Page,
    url: String,
}

impl TabHandle {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for TabHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabHandle")
            .field("target", self.page.target_id())
            .field("url", &self.url)
            .finish()
    }
}

/// 以浏览器标签页作为执行单元
pub struct BrowserTabExecutor {
    browser: Browser,
    script: ExtractionScript,
}

impl BrowserTabExecutor {
    pub fn new(browser: Browser, script: ExtractionScript) -> Self {
        Self { browser, script }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }
}

#[async_trait]
impl TaskExecutor for BrowserTabExecutor {
    type Handle = TabHandle;

    async fn create(&self, url: &str) -> Result<TabHandle, ExecutorError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ExecutorError::LaunchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        debug!("已创建标签页 {:?}，目标: {}", page.target_id(), url);

        Ok(TabHandle {
            page,
            url: url.to_string(),
        })
    }

    async fn wait_loaded(&self, handle: &TabHandle) -> Result<(), ExecutorError> {
        // goto 在页面 load 事件之后才返回
        handle
            .page
            .goto(handle.url.as_str())
            .await
            .map_err(|e| ExecutorError::Transport(format!("导航到 {} 失败: {}", handle.url, e)))?;
        Ok(())
    }

    async fn extract(
        &self,
        handle: &TabHandle,
        format: OutputFormat,
    ) -> Result<ScrapeResult, ExecutorError> {
        let executor = JsExecutor::new(handle.page.clone());
        executor
            .eval_as::<ScrapeResult>(self.script.invocation(format))
            .await
            .and_then(reject_flagged)
    }

    async fn cancel(&self, handle: &TabHandle) {
        if let Err(e) = handle.page.clone().close().await {
            // 标签页可能已被用户或浏览器关闭
            debug!("关闭标签页 {} 时出错（已忽略）: {}", handle.url, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::launch_headless_browser;

    /// 需要本机安装 Chrome/Chromium：
    /// ```bash
    /// cargo test test_extract_from_data_url -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_extract_from_data_url() {
        let _ = tracing_subscriber::fmt::try_init();

        let browser = launch_headless_browser(None).await.expect("启动浏览器失败");
        let executor = BrowserTabExecutor::new(browser, ExtractionScript::builtin());

        let url = "data:text/html,<title>Hello</title><body>world</body>";
        let handle = executor.create(url).await.expect("创建标签页失败");
        executor.wait_loaded(&handle).await.expect("加载失败");

        let result = executor
            .extract(&handle, OutputFormat::Markdown)
            .await
            .expect("提取失败");
        assert_eq!(result.title, "Hello");
        assert_eq!(result.content.trim(), "world");
        assert!(!result.is_error());

        executor.cancel(&handle).await;
        // 重复关闭不应报错
        executor.cancel(&handle).await;
    }
}
