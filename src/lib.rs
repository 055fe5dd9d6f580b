//! # Tab Batch Export
//!
//! 用浏览器标签页批量抓取页面内容，并打包成一个 ZIP 归档
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 连接已运行的浏览器，或启动无头浏览器
//! - `infrastructure/` - `JsExecutor`（页面内求值）与 `ExtractionScript`（提取脚本）
//! - `archive/` - CRC-32 与 store 模式 ZIP 编码，不依赖压缩库
//!
//! ### ② 执行层（Executor）
//! - `executor/` - `TaskExecutor` 抽象：创建 → 等待加载 → 提取 → 关闭
//! - `BrowserTabExecutor` - 一个执行单元对应一个标签页
//!
//! ### ③ 调度层（Scheduler）
//! - `scheduler/` - 有界并发的标签页池，单一所有者的事件循环
//! - 超时从拿到标签页开始计时，出错的任务直接丢弃，不重试
//!
//! ### ④ 控制与编排层（Controller / Orchestration）
//! - `controller/` - 开始 / 停止命令，结束后打包并投递归档
//! - `orchestrator/` - 组装配置、日志、浏览器与任务清单，跑完一个批次
//!
//! ## 模块结构

pub mod archive;
pub mod browser;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod scheduler;
pub mod utils;

// 重新导出常用类型
pub use archive::ArchiveWriter;
pub use config::Config;
pub use controller::{Ack, BatchCommand, BatchController, BatchOutcome, BatchRequest, FileSink};
pub use error::{AppError, AppResult};
pub use executor::{BrowserTabExecutor, TaskExecutor};
pub use models::{OutputFormat, ScrapeResult, WorkItem};
pub use orchestrator::App;
pub use scheduler::{PoolSettings, Scheduler};
