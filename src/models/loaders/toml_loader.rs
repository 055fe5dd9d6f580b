use crate::error::AppError;
use crate::models::work_item::{ItemList, WorkItem};
use anyhow::Result;
use std::path::Path;
use tokio::fs;

async fn read_list(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
}

/// 从 TOML 文件加载任务清单
pub async fn load_items_from_toml(path: &Path) -> Result<Vec<WorkItem>> {
    let content = read_list(path).await?;

    let list: ItemList = toml::from_str(&content)
        .map_err(|e| AppError::file_parse_failed(path.display().to_string(), e))?;

    Ok(finish(list, path))
}

/// 从 JSON 文件加载任务清单
///
/// 既接受 `{"items": [...]}`，也接受顶层数组 `[...]`。
pub async fn load_items_from_json(path: &Path) -> Result<Vec<WorkItem>> {
    let content = read_list(path).await?;

    let list = match serde_json::from_str::<ItemList>(&content) {
        Ok(list) => list,
        Err(_) => ItemList {
            items: serde_json::from_str(&content)
                .map_err(|e| AppError::file_parse_failed(path.display().to_string(), e))?,
        },
    };

    Ok(finish(list, path))
}

/// 按扩展名选择加载方式（`.json` 走 JSON，其余按 TOML 处理）
pub async fn load_items(path: &Path) -> Result<Vec<WorkItem>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => load_items_from_json(path).await,
        _ => load_items_from_toml(path).await,
    }
}

fn finish(list: ItemList, path: &Path) -> Vec<WorkItem> {
    let total = list.items.len();
    let items = list.dedup_by_url();
    if items.len() < total {
        tracing::warn!(
            "任务清单 {} 中有 {} 个重复 URL，已忽略",
            path.display(),
            total - items.len()
        );
    }
    tracing::info!("成功加载 {} 个任务", items.len());
    items
}
