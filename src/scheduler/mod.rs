//! 调度层：有界并发的标签页池
//!
//! - `pool`：纯状态簿记（积压、创建中、在途、终态计数）
//! - `event`：送进调度循环的事件
//! - `runner`：驱动状态机的异步循环

pub mod event;
pub mod pool;
pub mod runner;

pub use event::PoolEvent;
pub use pool::{BatchPhase, CollectedResult, DropReason, PoolState, PoolStats, UnitId, UnitOutcome};
pub use runner::{ExitStatus, PoolSettings, Scheduler, SchedulerExit, StopHandle};
