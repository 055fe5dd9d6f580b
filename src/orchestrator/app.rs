//! 应用入口 - 编排层
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、浏览器（连接或无头启动）、提取脚本
//! 2. **任务加载**：读取任务清单（TOML / JSON），按 URL 去重
//! 3. **批次运行**：通过 `BatchController` 发起一个批次，Ctrl-C 转为停止命令
//! 4. **全局统计**：输出并记录批次结果

use crate::browser;
use crate::config::Config;
use crate::controller::{
    Ack, ArchiveOptions, BatchCommand, BatchController, BatchOutcome, BatchRequest, FileSink,
};
use crate::executor::BrowserTabExecutor;
use crate::infrastructure::ExtractionScript;
use crate::models::{self, WorkItem};
use crate::scheduler::PoolSettings;
use crate::utils::logging::{
    append_summary, init_log_file, log_items_loaded, log_startup, print_final_stats,
};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    executor: Arc<BrowserTabExecutor>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        let browser = if config.headless {
            browser::launch_headless_browser(config.chrome_executable.as_deref()).await?
        } else {
            browser::connect_to_browser(config.browser_debug_port).await?
        };

        let script = match &config.extractor_script {
            Some(path) => {
                info!("📜 使用自定义提取脚本: {}", path.display());
                ExtractionScript::from_file(path).await?
            }
            None => ExtractionScript::builtin(),
        };

        Ok(Self {
            config,
            executor: Arc::new(BrowserTabExecutor::new(browser, script)),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<BatchOutcome> {
        let items = self.load_items().await?;

        if items.is_empty() {
            warn!("⚠️ 任务清单为空，程序结束");
        } else {
            log_items_loaded(items.len(), self.config.max_concurrency);
        }

        let outcome = self.run_batch(items).await?;

        print_final_stats(&outcome, &self.config.output_log_file);
        if let Err(e) = append_summary(&self.config.output_log_file, &outcome) {
            warn!("写入日志文件失败: {:#}", e);
        }

        Ok(outcome)
    }

    /// 加载任务清单
    async fn load_items(&self) -> Result<Vec<WorkItem>> {
        info!("\n📁 正在读取任务清单: {}", self.config.items_file.display());
        models::load_items(&self.config.items_file).await
    }

    /// 运行一个批次，直到结束或收到 Ctrl-C
    async fn run_batch(&self, items: Vec<WorkItem>) -> Result<BatchOutcome> {
        let sink = Arc::new(FileSink::new(&self.config.output_dir));
        let mut controller = BatchController::new(
            self.executor.clone(),
            sink,
            PoolSettings::from_config(&self.config),
            ArchiveOptions::from_config(&self.config),
        );

        let request = BatchRequest::new(
            items,
            self.config.output_format,
            self.config.max_concurrency,
        );
        if controller.handle(BatchCommand::StartBatch(request)) != Ack::Started {
            return Err(anyhow!("批次未能启动"));
        }

        let stop = controller.stop_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⏹️ 收到 Ctrl-C，正在停止批次...");
                if let Some(stop) = stop {
                    stop.stop();
                }
            }
        });

        let outcome = controller.wait().await;
        interrupt.abort();

        let outcome = outcome.ok_or_else(|| anyhow!("没有正在运行的批次"))?;
        outcome.context("批次失败")
    }
}
