//! 编排层（Orchestration Layer）
//!
//! 负责把配置、日志、浏览器、任务清单和批次控制器组装起来，跑完一个批次。
//! 只做组装和统计，不做调度决策。
//!
//! ```text
//! orchestrator::App
//!     ↓
//! controller::BatchController (开始 / 停止 / 打包 / 投递)
//!     ↓
//! scheduler::Scheduler (有界并发的标签页池)
//!     ↓
//! executor::BrowserTabExecutor → infrastructure::JsExecutor
//! ```

pub mod app;

pub use app::App;
