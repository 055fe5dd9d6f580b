use super::pool::UnitId;
use crate::executor::ExecutorError;
use crate::models::ScrapeResult;

/// 调度循环接收的事件
///
/// 所有外部信号都转成事件送进同一个循环，池状态因此只有一个写入者。
#[derive(Debug)]
pub enum PoolEvent<H> {
    /// 句柄到达（或创建失败）
    Launched {
        unit: UnitId,
        outcome: Result<H, ExecutorError>,
    },
    /// 创建超过期限仍未返回；创建本身继续进行
    LaunchTimedOut { unit: UnitId },
    /// 页面报告加载完成（或导航失败）
    Loaded {
        unit: UnitId,
        outcome: Result<(), ExecutorError>,
    },
    /// 加载完成后的等待期已过
    Settled { unit: UnitId },
    /// 提取请求的应答
    Extracted {
        unit: UnitId,
        outcome: Result<ScrapeResult, ExecutorError>,
    },
    /// 超时定时器触发
    TimedOut { unit: UnitId },
}
