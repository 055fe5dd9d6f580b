use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 待抓取的单个页面
///
/// 入队后不可变，由调度器恰好消费一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub id: String,
}

impl WorkItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            id: id.into(),
        }
    }
}

/// 任务清单文件的顶层结构
///
/// ```toml
/// [[items]]
/// url = "https://example.com/a"
/// title = "A"
/// id = "a"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub items: Vec<WorkItem>,
}

impl ItemList {
    /// 按 URL 去重，保留首次出现的顺序
    pub fn dedup_by_url(self) -> Vec<WorkItem> {
        let mut seen = HashSet::new();
        self.items
            .into_iter()
            .filter(|item| seen.insert(item.url.clone()))
            .collect()
    }
}
