//! 页面提取脚本
//!
//! 提取逻辑本身属于外部协作方，这里只负责约定：
//! 脚本是一个（可异步的）函数表达式，接收格式标志，返回 `{ title, content, error }`。

use crate::models::OutputFormat;
use anyhow::{Context, Result};
use std::path::Path;

/// 内置的通用提取脚本：html 格式取整页 HTML，其余取正文文本
const BUILTIN_SCRIPT: &str = r#"async (format) => {
    try {
        const title = (document.title || '').trim();
        const content = format === 'html'
            ? document.documentElement.outerHTML
            : (document.body ? document.body.innerText : '');
        if (!content || !content.trim()) {
            return { title, content: '', error: 'page has no content' };
        }
        return { title, content, error: null };
    } catch (e) {
        return { title: '', content: '', error: String((e && e.message) || e) };
    }
}"#;

/// 提取脚本
#[derive(Debug, Clone)]
pub struct ExtractionScript {
    source: String,
}

impl ExtractionScript {
    pub fn builtin() -> Self {
        Self {
            source: BUILTIN_SCRIPT.to_string(),
        }
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// 从文件加载自定义脚本
    pub async fn from_file(path: &Path) -> Result<Self> {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取提取脚本: {}", path.display()))?;
        if source.trim().is_empty() {
            anyhow::bail!("提取脚本为空: {}", path.display());
        }
        Ok(Self::from_source(source.trim().to_string()))
    }

    /// 生成可直接 evaluate 的调用表达式
    pub fn invocation(&self, format: OutputFormat) -> String {
        // as_flag 只会产生 ASCII 字面量，序列化不会失败
        let flag = serde_json::Value::String(format.as_flag().to_string());
        format!("({})({})", self.source, flag)
    }
}

impl Default for ExtractionScript {
    fn default() -> Self {
        Self::builtin()
    }
}
