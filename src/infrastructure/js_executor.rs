//! JS 执行器 - 基础设施层
//!
//! 持有一个标签页（Page），只暴露"执行 JS"的能力

use crate::executor::ExecutorError;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源
/// - 暴露 eval() 能力
/// - 不认识 WorkItem / 批次
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// Promise 会被等待，结果按值返回。脚本本身无法送达或执行失败都算通信失败。
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, ExecutorError> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| ExecutorError::Transport(format!("无法读取脚本返回值: {}", e)))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, ExecutorError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value)
            .map_err(|e| ExecutorError::Transport(format!("返回结构不符合约定: {}", e)))
    }
}
