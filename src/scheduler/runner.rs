//! 调度循环
//!
//! 单一所有者：[`PoolState`] 只在 [`Scheduler::run`] 里被修改，外部信号
//! （句柄到达、加载完成、提取应答、超时）都以 [`PoolEvent`] 的形式经通道送达。

use super::event::PoolEvent;
use super::pool::{
    Admission, BatchPhase, CollectedResult, DropReason, FillStep, PoolState, PoolStats, UnitId,
    UnitOutcome,
};
use crate::config::Config;
use crate::executor::{reject_flagged, ExecutorError, TaskExecutor};
use crate::models::{OutputFormat, WorkItem};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// 调度参数（整个批次内固定）
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub concurrency_limit: usize,
    /// 从拿到句柄开始计时
    pub tab_timeout: Duration,
    pub settle_delay: Duration,
    pub cancel_timeout: Duration,
    pub format: OutputFormat,
}

impl PoolSettings {
    pub fn new(concurrency_limit: usize, format: OutputFormat) -> Self {
        let defaults = Config::default();
        Self {
            concurrency_limit: concurrency_limit.max(1),
            tab_timeout: defaults.tab_timeout,
            settle_delay: defaults.settle_delay,
            cancel_timeout: defaults.cancel_timeout,
            format,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency_limit: config.max_concurrency.max(1),
            tab_timeout: config.tab_timeout,
            settle_delay: config.settle_delay,
            cancel_timeout: config.cancel_timeout,
            format: config.output_format,
        }
    }
}

/// 批次结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Finished,
    Stopped,
}

/// 调度结束后的汇总
#[derive(Debug)]
pub struct SchedulerExit {
    pub status: ExitStatus,
    /// 按完成顺序排列
    pub results: Vec<CollectedResult>,
    pub stats: PoolStats,
}

/// 停止句柄，可跨任务克隆
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// 标签页池调度器
///
/// 生命周期：`new → run → drop`，一个实例只跑一个批次。
pub struct Scheduler<E: TaskExecutor> {
    executor: Arc<E>,
    settings: PoolSettings,
    pool: PoolState<E::Handle>,
    events_tx: mpsc::UnboundedSender<PoolEvent<E::Handle>>,
    events_rx: mpsc::UnboundedReceiver<PoolEvent<E::Handle>>,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl<E: TaskExecutor> Scheduler<E> {
    pub fn new(executor: Arc<E>, items: Vec<WorkItem>, settings: PoolSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            executor,
            pool: PoolState::new(items, settings.concurrency_limit),
            settings,
            events_tx,
            events_rx,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// 运行到批次结束或被停止
    ///
    /// 结束或停止后仍会等待创建中的单元拿到句柄，以便把它们关掉。
    pub async fn run(mut self) -> SchedulerExit {
        let total = self.pool.stats().total;
        info!(
            "[批次] 🚀 开始处理 {} 个任务 (并发: {}, 格式: {})",
            total,
            self.pool.limit(),
            self.settings.format
        );

        self.pool.start();
        let stop_requested = *self.stop_rx.borrow_and_update();
        if stop_requested {
            self.stop().await;
        } else {
            self.fill();
        }

        loop {
            let done = self.pool.is_finished() || self.pool.is_stopped();
            if done && self.pool.pending_launches() == 0 {
                break;
            }

            let stopped = self.pool.is_stopped();
            tokio::select! {
                biased;
                changed = self.stop_rx.changed(), if !stopped => {
                    let stop_requested = changed.is_ok() && *self.stop_rx.borrow_and_update();
                    if stop_requested {
                        self.stop().await;
                    }
                }
                Some(event) = self.events_rx.recv() => self.handle(event).await,
                else => break,
            }
        }

        let status = if self.pool.phase() == BatchPhase::Finished {
            ExitStatus::Finished
        } else {
            ExitStatus::Stopped
        };
        let stats = self.pool.stats().clone();
        match status {
            ExitStatus::Finished => info!(
                "[批次] ✅ 全部任务结束: 成功 {}/{}",
                stats.completed, stats.total
            ),
            ExitStatus::Stopped => info!(
                "[批次] ⏹️ 已停止: 成功 {}, 取消 {}, 未启动 {}",
                stats.completed, stats.cancelled, stats.abandoned
            ),
        }

        SchedulerExit {
            status,
            results: self.pool.take_results(),
            stats,
        }
    }

    async fn handle(&mut self, event: PoolEvent<E::Handle>) {
        match event {
            PoolEvent::Launched { unit, outcome } => self.on_launched(unit, outcome).await,
            PoolEvent::LaunchTimedOut { unit } => {
                if let Some(item) = self.pool.launch_timed_out(unit) {
                    warn!(
                        "[标签页 {}] ⏰ 创建超时 ({}), 跳过",
                        unit, item.url
                    );
                }
                self.fill();
            }
            PoolEvent::Loaded { unit, outcome } => self.on_loaded(unit, outcome).await,
            PoolEvent::Settled { unit } => self.on_settled(unit),
            PoolEvent::Extracted { unit, outcome } => {
                let outcome = match outcome.and_then(reject_flagged) {
                    Ok(result) => {
                        info!("[标签页 {}] ✓ 提取成功: {}", unit, result.title);
                        UnitOutcome::Completed(result)
                    }
                    Err(e) => {
                        error!("[标签页 {}] ❌ {}", unit, e);
                        UnitOutcome::Dropped(classify(&e))
                    }
                };
                self.retire(unit, outcome).await;
            }
            PoolEvent::TimedOut { unit } => {
                if let Some(active) = self.pool.active_unit(unit) {
                    warn!(
                        "[标签页 {}] ⏰ 超时 ({}), 跳过",
                        unit, active.item.url
                    );
                }
                self.retire(unit, UnitOutcome::Dropped(DropReason::TimedOut))
                    .await;
            }
        }
    }

    async fn on_launched(&mut self, unit: UnitId, outcome: Result<E::Handle, ExecutorError>) {
        let handle = match outcome {
            Ok(handle) => handle,
            Err(e) => {
                if let Some(item) = self.pool.launch_failed(unit) {
                    error!("[标签页 {}] ❌ 无法启动 {}: {}", unit, item.url, e);
                }
                self.fill();
                return;
            }
        };

        match self.pool.admit(unit, handle) {
            Admission::Rejected(handle) => {
                debug!("[标签页 {}] 任务已放弃，关闭刚创建的标签页", unit);
                self.cancel(&handle).await;
                self.fill();
            }
            Admission::Admitted => {
                if let Some(active) = self.pool.active_unit(unit) {
                    info!("[标签页 {}] 已启动: {}", unit, active.item.url);
                    let handle = active.handle.clone();
                    self.arm_timer(unit);
                    self.spawn_for(unit, {
                        let executor = self.executor.clone();
                        async move {
                            let outcome = executor.wait_loaded(&handle).await;
                            PoolEvent::Loaded { unit, outcome }
                        }
                    });
                }
            }
        }
    }

    async fn on_loaded(&mut self, unit: UnitId, outcome: Result<(), ExecutorError>) {
        if !self.pool.is_active(unit) {
            return;
        }
        match outcome {
            Ok(()) => {
                debug!(
                    "[标签页 {}] 页面加载完成，等待 {:?} 后提取",
                    unit, self.settings.settle_delay
                );
                let delay = self.settings.settle_delay;
                self.spawn_for(unit, async move {
                    sleep(delay).await;
                    PoolEvent::Settled { unit }
                });
            }
            Err(e) => {
                error!("[标签页 {}] ❌ {}", unit, e);
                self.retire(unit, UnitOutcome::Dropped(classify(&e))).await;
            }
        }
    }

    fn on_settled(&mut self, unit: UnitId) {
        let Some(active) = self.pool.active_unit(unit) else {
            return;
        };
        let handle = active.handle.clone();
        let executor = self.executor.clone();
        let format = self.settings.format;
        self.spawn_for(unit, async move {
            let outcome = executor.extract(&handle, format).await;
            PoolEvent::Extracted { unit, outcome }
        });
    }

    /// 退役并补位
    async fn retire(&mut self, unit: UnitId, outcome: UnitOutcome) {
        let Some(removed) = self.pool.retire(unit, outcome) else {
            return;
        };
        self.cancel(&removed.handle).await;

        let stats = self.pool.stats();
        debug!(
            "[标签页 {}] 已退役，耗时 {:?}",
            unit,
            removed.started_at.elapsed()
        );
        info!(
            "[进度] 已完成 {}/{} (成功 {}, 丢弃 {})",
            stats.completed + stats.dropped(),
            stats.total,
            stats.completed,
            stats.dropped()
        );
        self.fill();
    }

    fn fill(&mut self) {
        let FillStep::Launch(launches) = self.pool.fill() else {
            return;
        };
        for (unit, item) in launches {
            debug!("[标签页 {}] 请求创建: {}", unit, item.url);
            let executor = self.executor.clone();
            let tx = self.events_tx.clone();
            let deadline = self.settings.tab_timeout;
            tokio::spawn(async move {
                let create = executor.create(&item.url);
                tokio::pin!(create);
                let outcome = match tokio::time::timeout(deadline, &mut create).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        // 丢弃 create 不会撤销已发出的创建请求，继续等它返回句柄再关闭
                        let _ = tx.send(PoolEvent::LaunchTimedOut { unit });
                        match tokio::time::timeout(deadline, &mut create).await {
                            Ok(outcome) => outcome,
                            Err(_) => Err(ExecutorError::LaunchFailed {
                                url: item.url.clone(),
                                message: format!("创建超时 ({:?})", deadline * 2),
                            }),
                        }
                    }
                };
                let _ = tx.send(PoolEvent::Launched { unit, outcome });
            });
        }
    }

    fn arm_timer(&mut self, unit: UnitId) {
        let tx = self.events_tx.clone();
        let timeout = self.settings.tab_timeout;
        let timer = tokio::spawn(async move {
            sleep(timeout).await;
            let _ = tx.send(PoolEvent::TimedOut { unit });
        });
        self.pool.arm_timer(unit, timer.abort_handle());
    }

    /// 启动一个属于该单元的后台任务，完成后把事件送回循环
    fn spawn_for<F>(&mut self, unit: UnitId, task: F)
    where
        F: std::future::Future<Output = PoolEvent<E::Handle>> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        let join = tokio::spawn(async move {
            let _ = tx.send(task.await);
        });
        self.pool.track_task(unit, join.abort_handle());
    }

    /// 尽力关闭，最多等待 cancel_timeout
    async fn cancel(&self, handle: &E::Handle) {
        if tokio::time::timeout(self.settings.cancel_timeout, self.executor.cancel(handle))
            .await
            .is_err()
        {
            warn!("关闭标签页超时，已放弃等待");
        }
    }

    async fn stop(&mut self) {
        let handles = self.pool.stop();
        info!(
            "[批次] ⏹️ 收到停止请求，关闭 {} 个标签页",
            handles.len()
        );
        join_all(handles.iter().map(|handle| self.cancel(handle))).await;
    }
}

fn classify(error: &ExecutorError) -> DropReason {
    match error {
        ExecutorError::LaunchFailed { .. } => DropReason::LaunchFailed,
        ExecutorError::Transport(_) => DropReason::Transport,
        ExecutorError::Extraction(_) => DropReason::Extraction,
    }
}
