//! 标签页池状态
//!
//! 只做记账，不做任何 I/O：所有外部动作（创建、关闭标签页、定时器）都由
//! [`super::Scheduler`] 根据这里的返回值去执行。
//!
//! 不变量（处理中始终成立）：
//!
//! ```text
//! active.len() + launching.len() <= limit
//! backlog + launching + active + 终态计数 == total
//! ```

use crate::models::{ScrapeResult, WorkItem};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// 执行单元编号，按发起顺序递增
pub type UnitId = u64;

/// 批次阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    /// 积压队列仍有任务
    Processing,
    /// 积压队列已空，等待在途任务
    Draining,
    Finished,
    Stopped,
}

/// 任务被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 没拿到句柄
    LaunchFailed,
    /// 加载或提取请求未送达/无应答
    Transport,
    /// 提取脚本报告了内容级错误
    Extraction,
    TimedOut,
    /// 批次被停止
    Stopped,
}

/// 执行单元的结局
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Completed(ScrapeResult),
    Dropped(DropReason),
}

/// 已收集的结果，附带提交序号
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedResult {
    /// 在原始任务列表中的位置
    pub index: usize,
    pub item: WorkItem,
    pub result: ScrapeResult,
}

/// 批次统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub completed: usize,
    pub launch_failed: usize,
    pub transport_failed: usize,
    pub extraction_failed: usize,
    pub timed_out: usize,
    /// 停止时在途（创建中或已激活）的任务
    pub cancelled: usize,
    /// 停止时仍在积压队列、从未启动的任务
    pub abandoned: usize,
}

impl PoolStats {
    /// 已进入终态的任务数
    pub fn terminal(&self) -> usize {
        self.completed + self.dropped() + self.cancelled + self.abandoned
    }

    /// 因错误或超时被丢弃的任务数
    pub fn dropped(&self) -> usize {
        self.launch_failed + self.transport_failed + self.extraction_failed + self.timed_out
    }

    fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::LaunchFailed => self.launch_failed += 1,
            DropReason::Transport => self.transport_failed += 1,
            DropReason::Extraction => self.extraction_failed += 1,
            DropReason::TimedOut => self.timed_out += 1,
            DropReason::Stopped => self.cancelled += 1,
        }
    }
}

/// 已请求创建、尚未拿到句柄的单元
#[derive(Debug, Clone)]
struct LaunchingUnit {
    index: usize,
    item: WorkItem,
}

/// 在途单元
#[derive(Debug)]
pub struct ActiveUnit<H> {
    pub index: usize,
    pub item: WorkItem,
    pub handle: H,
    pub started_at: Instant,
    timer: Option<AbortHandle>,
    tasks: Vec<AbortHandle>,
}

impl<H> ActiveUnit<H> {
    /// 解除超时并中止所有附属任务
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// 一次补位的结果
#[derive(Debug, PartialEq, Eq)]
pub enum FillStep {
    /// 未在处理（已停止或已结束）
    Idle,
    /// 所有任务都已进入终态
    Finished,
    /// 需要发起创建的单元（可能为空：池已满或队列已空）
    Launch(Vec<(UnitId, WorkItem)>),
}

/// 句柄到达时的处理结论
#[derive(Debug)]
pub enum Admission<H> {
    Admitted,
    /// 批次已停止（或单元未知），调用方应立即关闭该句柄
    Rejected(H),
}

/// 标签页池状态
#[derive(Debug)]
pub struct PoolState<H> {
    backlog: VecDeque<(usize, WorkItem)>,
    launching: HashMap<UnitId, LaunchingUnit>,
    /// 创建超时、已计入终态，但句柄还没回来的单元；仍占用名额
    orphaned: HashSet<UnitId>,
    active: HashMap<UnitId, ActiveUnit<H>>,
    results: Vec<CollectedResult>,
    limit: usize,
    processing: bool,
    phase: BatchPhase,
    next_unit: UnitId,
    stats: PoolStats,
}

impl<H> PoolState<H> {
    /// 创建池状态；并发上限小于 1 时按 1 处理
    pub fn new(items: Vec<WorkItem>, limit: usize) -> Self {
        let stats = PoolStats {
            total: items.len(),
            ..Default::default()
        };
        Self {
            backlog: items.into_iter().enumerate().collect(),
            launching: HashMap::new(),
            orphaned: HashSet::new(),
            active: HashMap::new(),
            results: Vec::new(),
            limit: limit.max(1),
            processing: false,
            phase: BatchPhase::Idle,
            next_unit: 0,
            stats,
        }
    }

    pub fn start(&mut self) {
        if self.phase == BatchPhase::Idle {
            self.processing = true;
            self.phase = BatchPhase::Processing;
        }
    }

    /// 补位：批次结束判定 + 在容量允许时从队首取任务
    ///
    /// 取出的任务立即计入 launching，调用方随后再异步发起创建。
    pub fn fill(&mut self) -> FillStep {
        if !self.processing {
            return FillStep::Idle;
        }

        if self.backlog.is_empty() && self.active.is_empty() && self.launching.is_empty() {
            self.processing = false;
            self.phase = BatchPhase::Finished;
            return FillStep::Finished;
        }

        let mut launches = Vec::new();
        while self.in_flight() < self.limit {
            let Some((index, item)) = self.backlog.pop_front() else {
                break;
            };
            let unit = self.next_unit;
            self.next_unit += 1;
            self.launching.insert(
                unit,
                LaunchingUnit {
                    index,
                    item: item.clone(),
                },
            );
            launches.push((unit, item));
        }

        if self.backlog.is_empty() {
            self.phase = BatchPhase::Draining;
        }
        FillStep::Launch(launches)
    }

    /// 句柄到达
    pub fn admit(&mut self, unit: UnitId, handle: H) -> Admission<H> {
        let Some(launching) = self.launching.remove(&unit) else {
            self.orphaned.remove(&unit);
            return Admission::Rejected(handle);
        };

        if !self.processing {
            self.stats.record_drop(DropReason::Stopped);
            return Admission::Rejected(handle);
        }

        self.active.insert(
            unit,
            ActiveUnit {
                index: launching.index,
                item: launching.item,
                handle,
                started_at: Instant::now(),
                timer: None,
                tasks: Vec::new(),
            },
        );
        Admission::Admitted
    }

    /// 创建失败：任务直接丢弃
    pub fn launch_failed(&mut self, unit: UnitId) -> Option<WorkItem> {
        let Some(launching) = self.launching.remove(&unit) else {
            self.orphaned.remove(&unit);
            return None;
        };
        self.stats.record_drop(if self.processing {
            DropReason::LaunchFailed
        } else {
            DropReason::Stopped
        });
        Some(launching.item)
    }

    /// 创建超时：任务按创建失败丢弃
    ///
    /// 创建本身仍在进行，名额保留到句柄（或失败）到达为止，
    /// 届时由 [`Self::admit`] 拒绝，调用方关闭该句柄。
    pub fn launch_timed_out(&mut self, unit: UnitId) -> Option<WorkItem> {
        let item = self.launch_failed(unit)?;
        self.orphaned.insert(unit);
        Some(item)
    }

    /// 记录超时定时器；单元已不在途时立即中止
    pub fn arm_timer(&mut self, unit: UnitId, timer: AbortHandle) {
        match self.active.get_mut(&unit) {
            Some(active) => {
                if let Some(old) = active.timer.replace(timer) {
                    old.abort();
                }
            }
            None => timer.abort(),
        }
    }

    /// 记录单元的附属任务（加载监听、提取请求等），退役时一并中止
    pub fn track_task(&mut self, unit: UnitId, task: AbortHandle) {
        match self.active.get_mut(&unit) {
            Some(active) => {
                active.tasks.retain(|t| !t.is_finished());
                active.tasks.push(task);
            }
            None => task.abort(),
        }
    }

    pub fn active_unit(&self, unit: UnitId) -> Option<&ActiveUnit<H>> {
        self.active.get(&unit)
    }

    pub fn is_active(&self, unit: UnitId) -> bool {
        self.active.contains_key(&unit)
    }

    /// 退役（幂等）
    ///
    /// 单元仍在途时移除并返回它，调用方负责关闭句柄并再次补位；
    /// 已退役的单元返回 `None`，结果也不再记录。
    pub fn retire(&mut self, unit: UnitId, outcome: UnitOutcome) -> Option<ActiveUnit<H>> {
        let mut removed = self.active.remove(&unit)?;
        removed.disarm();

        match outcome {
            UnitOutcome::Completed(result) => {
                self.stats.completed += 1;
                self.results.push(CollectedResult {
                    index: removed.index,
                    item: removed.item.clone(),
                    result,
                });
            }
            UnitOutcome::Dropped(reason) => self.stats.record_drop(reason),
        }
        Some(removed)
    }

    /// 停止批次：清空积压队列、摘除全部在途单元并返回它们的句柄
    ///
    /// 仍在创建中的单元保留在 launching 中，句柄到达时由 [`Self::admit`] 拒绝。
    pub fn stop(&mut self) -> Vec<H> {
        if matches!(self.phase, BatchPhase::Finished | BatchPhase::Stopped) {
            return Vec::new();
        }
        self.processing = false;
        self.phase = BatchPhase::Stopped;

        self.stats.abandoned += self.backlog.len();
        self.backlog.clear();

        self.active
            .drain()
            .map(|(_, mut unit)| {
                unit.disarm();
                self.stats.cancelled += 1;
                unit.handle
            })
            .collect()
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_finished(&self) -> bool {
        self.phase == BatchPhase::Finished
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == BatchPhase::Stopped
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn launching_count(&self) -> usize {
        self.launching.len()
    }

    /// 仍在等待创建结果的单元（含已超时放弃的）
    pub fn pending_launches(&self) -> usize {
        self.launching.len() + self.orphaned.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// 占用的并发名额（在途 + 创建中，含已超时放弃的创建）
    pub fn in_flight(&self) -> usize {
        self.active.len() + self.pending_launches()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn results(&self) -> &[CollectedResult] {
        &self.results
    }

    pub fn take_results(&mut self) -> Vec<CollectedResult> {
        std::mem::take(&mut self.results)
    }

    /// 每个任务恰好处于一个位置
    pub fn is_accounted(&self) -> bool {
        self.backlog.len() + self.launching.len() + self.active.len() + self.stats.terminal()
            == self.stats.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("https://example.com/{i}"), format!("Item {i}"), i.to_string()))
            .collect()
    }

    fn launched(step: FillStep) -> Vec<UnitId> {
        match step {
            FillStep::Launch(list) => list.into_iter().map(|(unit, _)| unit).collect(),
            other => panic!("expected launches, got {other:?}"),
        }
    }

    fn assert_invariants<H>(pool: &PoolState<H>) {
        if pool.is_processing() {
            assert!(pool.in_flight() <= pool.limit());
        }
        assert!(pool.is_accounted());
    }

    #[test]
    fn test_limit_clamped_to_one() {
        let pool: PoolState<()> = PoolState::new(items(3), 0);
        assert_eq!(pool.limit(), 1);
    }

    #[test]
    fn test_not_started_is_noop() {
        let mut pool: PoolState<()> = PoolState::new(items(2), 2);
        assert_eq!(pool.fill(), FillStep::Idle);
        assert_eq!(pool.phase(), BatchPhase::Idle);
    }

    #[test]
    fn test_empty_batch_finishes_immediately() {
        let mut pool: PoolState<()> = PoolState::new(Vec::new(), 3);
        pool.start();
        assert_eq!(pool.fill(), FillStep::Finished);
        assert!(pool.is_finished());
        assert!(!pool.is_processing());
    }

    #[test]
    fn test_fill_reserves_synchronously() {
        let mut pool: PoolState<()> = PoolState::new(items(5), 2);
        pool.start();

        let first = launched(pool.fill());
        assert_eq!(first, vec![0, 1]);
        assert_eq!(pool.launching_count(), 2);

        // 句柄还没到，再次补位不得超额
        assert!(launched(pool.fill()).is_empty());
        assert_invariants(&pool);
    }

    #[test]
    fn test_fifo_dequeue_order() {
        let mut pool: PoolState<()> = PoolState::new(items(3), 3);
        pool.start();
        let FillStep::Launch(list) = pool.fill() else {
            panic!("expected launches");
        };
        let urls: Vec<_> = list.iter().map(|(_, item)| item.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/0",
                "https://example.com/1",
                "https://example.com/2"
            ]
        );
    }

    #[test]
    fn test_retire_is_idempotent() {
        let mut pool: PoolState<&str> = PoolState::new(items(3), 1);
        pool.start();
        let unit = launched(pool.fill())[0];
        assert!(matches!(pool.admit(unit, "tab-0"), Admission::Admitted));

        let first = pool.retire(unit, UnitOutcome::Dropped(DropReason::TimedOut));
        assert_eq!(first.map(|u| u.handle), Some("tab-0"));
        let stats_after_first = pool.stats().clone();

        // 超时之后迟到的完成信号
        let second = pool.retire(unit, UnitOutcome::Completed(ScrapeResult::new("late", "x")));
        assert!(second.is_none());
        assert_eq!(pool.stats(), &stats_after_first);
        assert!(pool.results().is_empty());
        assert_invariants(&pool);
    }

    #[test]
    fn test_full_lifecycle_completion_detection() {
        let mut pool: PoolState<UnitId> = PoolState::new(items(3), 2);
        pool.start();

        let mut pending: VecDeque<UnitId> = launched(pool.fill()).into();
        let mut rounds = 0;
        while let Some(unit) = pending.pop_front() {
            rounds += 1;
            assert!(!pool.is_finished());
            assert!(matches!(pool.admit(unit, unit), Admission::Admitted));
            assert_invariants(&pool);

            pool.retire(unit, UnitOutcome::Completed(ScrapeResult::new("t", "c")));
            assert_invariants(&pool);

            match pool.fill() {
                FillStep::Launch(list) => pending.extend(list.into_iter().map(|(u, _)| u)),
                FillStep::Finished => break,
                FillStep::Idle => panic!("pool went idle mid-batch"),
            }
        }

        assert_eq!(rounds, 3);
        assert_eq!(pool.fill(), FillStep::Idle);
        assert!(pool.is_finished());
        assert_eq!(pool.stats().completed, 3);
        assert_eq!(pool.results().len(), 3);
    }

    #[test]
    fn test_draining_phase_when_backlog_empty() {
        let mut pool: PoolState<()> = PoolState::new(items(2), 2);
        pool.start();
        assert_eq!(pool.phase(), BatchPhase::Processing);
        launched(pool.fill());
        assert_eq!(pool.phase(), BatchPhase::Draining);
    }

    #[test]
    fn test_stop_rejects_late_handles() {
        let mut pool: PoolState<&str> = PoolState::new(items(4), 2);
        pool.start();
        let units = launched(pool.fill());
        assert!(matches!(pool.admit(units[0], "tab-a"), Admission::Admitted));

        let handles = pool.stop();
        assert_eq!(handles, vec!["tab-a"]);
        assert_eq!(pool.backlog_len(), 0);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.launching_count(), 1);
        assert_eq!(pool.stats().abandoned, 2);

        // 停止后到达的句柄必须被拒绝
        match pool.admit(units[1], "tab-b") {
            Admission::Rejected(handle) => assert_eq!(handle, "tab-b"),
            Admission::Admitted => panic!("admitted after stop"),
        }
        assert_eq!(pool.launching_count(), 0);
        assert_eq!(pool.stats().cancelled, 2);
        assert_eq!(pool.fill(), FillStep::Idle);
        assert!(pool.is_stopped());
        assert!(pool.is_accounted());
    }

    #[test]
    fn test_launch_failure_drops_item() {
        let mut pool: PoolState<()> = PoolState::new(items(2), 1);
        pool.start();
        let unit = launched(pool.fill())[0];

        let dropped = pool.launch_failed(unit);
        assert_eq!(dropped.map(|i| i.id), Some("0".to_string()));
        assert_eq!(pool.stats().launch_failed, 1);
        assert_invariants(&pool);

        // 名额释放后补入下一个
        assert_eq!(launched(pool.fill()).len(), 1);
    }

    #[test]
    fn test_timed_out_item_produces_no_result() {
        // 并发 2，[A, B, C]，B 超时，A、C 成功
        let mut pool: PoolState<UnitId> = PoolState::new(items(3), 2);
        pool.start();
        let units = launched(pool.fill());
        for &unit in &units {
            assert!(matches!(pool.admit(unit, unit), Admission::Admitted));
        }

        pool.retire(units[1], UnitOutcome::Dropped(DropReason::TimedOut));
        let next = launched(pool.fill());
        assert!(matches!(pool.admit(next[0], next[0]), Admission::Admitted));

        pool.retire(next[0], UnitOutcome::Completed(ScrapeResult::new("C", "c")));
        pool.retire(units[0], UnitOutcome::Completed(ScrapeResult::new("A", "a")));
        assert_eq!(pool.fill(), FillStep::Finished);

        let titles: Vec<_> = pool.results().iter().map(|r| r.result.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A"]);
        assert_eq!(pool.stats().timed_out, 1);
    }

    #[test]
    fn test_launch_timeout_keeps_slot_until_handle_returns() {
        let mut pool: PoolState<UnitId> = PoolState::new(items(2), 1);
        pool.start();
        let unit = launched(pool.fill())[0];

        let dropped = pool.launch_timed_out(unit);
        assert_eq!(dropped.map(|i| i.id), Some("0".to_string()));
        assert_eq!(pool.stats().launch_failed, 1);
        assert_eq!(pool.pending_launches(), 1);
        assert_invariants(&pool);

        // 创建还在进行，名额不释放
        assert!(launched(pool.fill()).is_empty());

        // 迟到的句柄被拒绝，名额随之释放
        assert!(matches!(pool.admit(unit, unit), Admission::Rejected(_)));
        assert_eq!(pool.pending_launches(), 0);
        assert_eq!(launched(pool.fill()).len(), 1);
        assert_eq!(pool.stats().launch_failed, 1);
        assert_invariants(&pool);
    }

    #[test]
    fn test_batch_finishes_while_timed_out_launch_pending() {
        let mut pool: PoolState<UnitId> = PoolState::new(items(1), 1);
        pool.start();
        let unit = launched(pool.fill())[0];

        pool.launch_timed_out(unit);
        assert_eq!(pool.fill(), FillStep::Finished);
        assert_eq!(pool.pending_launches(), 1);

        // 之后到达的失败结果不再计数
        assert!(pool.launch_failed(unit).is_none());
        assert_eq!(pool.pending_launches(), 0);
        assert_eq!(pool.stats().terminal(), 1);
    }
}
