//! 批次控制器
//!
//! 接收开始/停止命令并立即应答；批次在后台任务中运行：
//! `Scheduler::run` 结束后由 [`finalize`] 打包结果并交给投递目标。

use super::naming::{archive_filename, EntryNamer};
use super::sink::DeliverySink;
use crate::archive::ArchiveWriter;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::executor::TaskExecutor;
use crate::models::{OutputFormat, WorkItem};
use crate::scheduler::{
    CollectedResult, ExitStatus, PoolSettings, PoolStats, Scheduler, SchedulerExit, StopHandle,
};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 开始批次的参数
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub items: Vec<WorkItem>,
    pub format: OutputFormat,
    pub concurrency_limit: usize,
}

impl BatchRequest {
    pub fn new(items: Vec<WorkItem>, format: OutputFormat, concurrency_limit: usize) -> Self {
        Self {
            items,
            format,
            concurrency_limit,
        }
    }
}

/// 控制命令
#[derive(Debug, Clone)]
pub enum BatchCommand {
    StartBatch(BatchRequest),
    StopBatch,
}

/// 命令应答（立即返回，不等待批次）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Started,
    Stopped,
    /// 已有批次在处理中
    Rejected,
}

/// 批次最终结果
#[derive(Debug)]
pub enum BatchOutcome {
    /// 归档已投递
    Archived {
        path: PathBuf,
        filename: String,
        entries: usize,
        bytes: usize,
        stats: PoolStats,
    },
    /// 没有任何成功结果，未生成归档
    NothingProduced { stats: PoolStats },
    /// 被停止，不生成归档
    Stopped { stats: PoolStats },
}

impl BatchOutcome {
    pub fn stats(&self) -> &PoolStats {
        match self {
            Self::Archived { stats, .. }
            | Self::NothingProduced { stats }
            | Self::Stopped { stats } => stats,
        }
    }
}

/// 归档相关选项
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub export_prefix: String,
    /// 按提交顺序而不是完成顺序排列条目
    pub stable_entry_order: bool,
}

impl ArchiveOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            export_prefix: config.export_prefix.clone(),
            stable_entry_order: config.stable_entry_order,
        }
    }
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct RunningBatch {
    stop: StopHandle,
    join: JoinHandle<AppResult<BatchOutcome>>,
}

/// 批次控制器，同一时刻最多运行一个批次
pub struct BatchController<E: TaskExecutor, S: DeliverySink> {
    executor: Arc<E>,
    sink: Arc<S>,
    /// 超时等参数的基准，并发数与格式由每次请求覆盖
    settings: PoolSettings,
    options: ArchiveOptions,
    running: Option<RunningBatch>,
}

impl<E: TaskExecutor, S: DeliverySink> BatchController<E, S> {
    pub fn new(
        executor: Arc<E>,
        sink: Arc<S>,
        settings: PoolSettings,
        options: ArchiveOptions,
    ) -> Self {
        Self {
            executor,
            sink,
            settings,
            options,
            running: None,
        }
    }

    pub fn handle(&mut self, command: BatchCommand) -> Ack {
        match command {
            BatchCommand::StartBatch(request) => self.start(request),
            BatchCommand::StopBatch => self.stop(),
        }
    }

    /// 当前是否有批次在处理中
    pub fn is_processing(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.join.is_finished())
    }

    pub fn start(&mut self, request: BatchRequest) -> Ack {
        if self.is_processing() {
            warn!("[批次] 已有批次在处理中，忽略新的开始请求");
            return Ack::Rejected;
        }
        if self.running.is_some() {
            warn!("[批次] 上一批次的结果未被读取，已丢弃");
        }

        let mut settings = self.settings.clone();
        settings.concurrency_limit = request.concurrency_limit;
        settings.format = request.format;

        let scheduler = Scheduler::new(self.executor.clone(), request.items, settings);
        let stop = scheduler.stop_handle();
        let sink = self.sink.clone();
        let options = self.options.clone();
        let format = request.format;

        let join = tokio::spawn(async move {
            let exit = scheduler.run().await;
            finalize(exit, format, &options, sink.as_ref()).await
        });

        self.running = Some(RunningBatch { stop, join });
        Ack::Started
    }

    /// 停止当前批次；没有批次时也应答 Stopped
    pub fn stop(&mut self) -> Ack {
        if let Some(running) = &self.running {
            running.stop.stop();
        }
        Ack::Stopped
    }

    /// 当前批次的停止句柄，可交给其他任务（如信号处理）
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.running.as_ref().map(|running| running.stop.clone())
    }

    /// 等待当前批次结束并取走结果；没有批次时返回 None
    pub async fn wait(&mut self) -> Option<AppResult<BatchOutcome>> {
        let running = self.running.take()?;
        Some(match running.join.await {
            Ok(outcome) => outcome,
            Err(e) => Err(AppError::Other(format!("批次任务异常退出: {}", e))),
        })
    }
}

/// 批次收尾：打包并投递
///
/// 被停止的批次和没有结果的批次都不会调用投递目标。
/// 投递失败是整批唯一的致命错误。
pub async fn finalize<S: DeliverySink + ?Sized>(
    exit: SchedulerExit,
    format: OutputFormat,
    options: &ArchiveOptions,
    sink: &S,
) -> AppResult<BatchOutcome> {
    let SchedulerExit {
        status,
        mut results,
        stats,
    } = exit;

    if status == ExitStatus::Stopped {
        info!("[批次] 已停止，不生成归档 (丢弃 {} 个已完成结果)", results.len());
        return Ok(BatchOutcome::Stopped { stats });
    }

    if results.is_empty() {
        warn!("[批次] ⚠️ 没有可打包的结果");
        return Ok(BatchOutcome::NothingProduced { stats });
    }

    if options.stable_entry_order {
        results.sort_by_key(|r| r.index);
    }

    let writer = build_archive(&results, format);
    let entries = writer.len();
    let bytes = writer.generate();
    let size = bytes.len();
    let filename = archive_filename(&options.export_prefix, Utc::now());
    info!("[批次] 📦 打包 {} 个文件 -> {}", entries, filename);

    match sink.deliver(bytes, &filename).await {
        Ok(path) => Ok(BatchOutcome::Archived {
            path,
            filename,
            entries,
            bytes: size,
            stats,
        }),
        Err(e) => {
            error!("[批次] ❌ 投递失败: {}", e);
            Err(e.into())
        }
    }
}

fn build_archive(results: &[CollectedResult], format: OutputFormat) -> ArchiveWriter {
    let mut namer = EntryNamer::new(format);
    let mut writer = ArchiveWriter::new();
    for collected in results {
        let name = namer.next_name(&collected.result.title);
        writer.add_entry(name, collected.result.content.as_bytes());
    }
    writer
}
