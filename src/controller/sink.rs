//! 归档投递
//!
//! 投递只尝试一次，失败即为整批的最终错误。

use crate::error::DeliveryError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// 接收最终归档的目标
#[async_trait]
pub trait DeliverySink: Send + Sync + 'static {
    /// 保存归档，返回实际写入位置
    async fn deliver(&self, bytes: Vec<u8>, filename: &str) -> Result<PathBuf, DeliveryError>;
}

/// 写到本地目录
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DeliverySink for FileSink {
    async fn deliver(&self, bytes: Vec<u8>, filename: &str) -> Result<PathBuf, DeliveryError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| DeliveryError::CreateDirFailed {
                path: self.dir.display().to_string(),
                source,
            })?;

        let path = self.dir.join(filename);
        let len = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| DeliveryError::WriteFailed {
                path: path.display().to_string(),
                source,
            })?;

        info!("💾 归档已保存: {} ({} 字节)", path.display(), len);
        Ok(path)
    }
}
