//! 测试用投递目标：记录每次调用，可设置为失败

use super::sink::DeliverySink;
use crate::error::DeliveryError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct Delivery {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    fail_with: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, bytes: Vec<u8>, filename: &str) -> Result<PathBuf, DeliveryError> {
        self.deliveries.lock().unwrap().push(Delivery {
            filename: filename.to_string(),
            bytes,
        });
        match &self.fail_with {
            Some(message) => Err(DeliveryError::Rejected(message.clone())),
            None => Ok(PathBuf::from(filename)),
        }
    }
}
