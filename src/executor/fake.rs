//! 测试用执行器：按 URL 预设每个标签页的表现

use super::{ExecutorError, TaskExecutor};
use crate::models::{OutputFormat, ScrapeResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::sleep;

/// 单个 URL 的预设结局
#[derive(Debug, Clone)]
pub enum Script {
    Succeed { title: String, content: String },
    ExtractionError(String),
    TransportError,
    LaunchFail,
    NeverLoads,
}

#[derive(Debug, Clone)]
struct Behavior {
    load_delay: Duration,
    script: Script,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FakeHandle {
    pub id: u64,
    pub url: String,
}

#[derive(Debug, Default)]
struct FakeState {
    behaviors: HashMap<String, Behavior>,
    create_delays: HashMap<String, Duration>,
    next_id: u64,
    creating: usize,
    live: HashSet<u64>,
    peak: usize,
    created: Vec<String>,
    cancel_calls: usize,
    formats: Vec<OutputFormat>,
}

impl FakeState {
    fn occupied(&self) -> usize {
        self.creating + self.live.len()
    }

    /// 创建完成：打开标签页或按脚本失败
    fn open(&mut self, url: &str) -> Result<FakeHandle, ExecutorError> {
        self.creating -= 1;
        if let Some(Behavior {
            script: Script::LaunchFail,
            ..
        }) = self.behaviors.get(url)
        {
            return Err(ExecutorError::LaunchFailed {
                url: url.to_string(),
                message: "scripted".to_string(),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        self.created.push(url.to_string());
        self.peak = self.peak.max(self.occupied());
        Ok(FakeHandle {
            id,
            url: url.to_string(),
        })
    }
}

/// 按脚本运行的假执行器
#[derive(Clone)]
pub struct FakeExecutor {
    state: Arc<Mutex<FakeState>>,
    create_delay: Duration,
    default_load_delay: Duration,
    /// 创建在独立任务中完成，调用方放弃等待也照样打开标签页
    detached_create: bool,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState::default())),
            create_delay: Duration::from_millis(5),
            default_load_delay: Duration::from_millis(20),
            detached_create: false,
        }
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn with_detached_create(mut self) -> Self {
        self.detached_create = true;
        self
    }

    /// 单独设置某个 URL 的创建耗时
    pub fn with_create_delay_for(self, url: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .create_delays
            .insert(url.to_string(), delay);
        self
    }

    /// 预设某个 URL 的结局；未预设的 URL 默认成功，标题等于 URL
    pub fn script(self, url: &str, script: Script) -> Self {
        let load_delay = self.default_load_delay;
        self.script_with_delay(url, load_delay, script)
    }

    pub fn script_with_delay(self, url: &str, load_delay: Duration, script: Script) -> Self {
        self.state
            .lock()
            .unwrap()
            .behaviors
            .insert(url.to_string(), Behavior { load_delay, script });
        self
    }

    /// 同一时刻占用的最大名额（创建中 + 未关闭）
    pub fn peak(&self) -> usize {
        self.state.lock().unwrap().peak
    }

    /// 仍未关闭的标签页数
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// 成功创建过的 URL，按创建顺序
    pub fn created(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().unwrap().cancel_calls
    }

    pub fn formats(&self) -> Vec<OutputFormat> {
        self.state.lock().unwrap().formats.clone()
    }

    fn behavior(&self, url: &str) -> Behavior {
        self.state
            .lock()
            .unwrap()
            .behaviors
            .get(url)
            .cloned()
            .unwrap_or_else(|| Behavior {
                load_delay: self.default_load_delay,
                script: Script::Succeed {
                    title: url.to_string(),
                    content: format!("content of {url}"),
                },
            })
    }
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for FakeExecutor {
    type Handle = FakeHandle;

    async fn create(&self, url: &str) -> Result<FakeHandle, ExecutorError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.creating += 1;
            state.peak = state.peak.max(state.occupied());
            state
                .create_delays
                .get(url)
                .copied()
                .unwrap_or(self.create_delay)
        };

        if self.detached_create {
            let (tx, rx) = oneshot::channel();
            let state = self.state.clone();
            let url = url.to_string();
            tokio::spawn(async move {
                sleep(delay).await;
                let opened = state.lock().unwrap().open(&url);
                let _ = tx.send(opened);
            });
            return rx
                .await
                .unwrap_or_else(|_| Err(ExecutorError::Transport("creator gone".to_string())));
        }

        sleep(delay).await;
        self.state.lock().unwrap().open(url)
    }

    async fn wait_loaded(&self, handle: &FakeHandle) -> Result<(), ExecutorError> {
        let behavior = self.behavior(&handle.url);
        if let Script::NeverLoads = behavior.script {
            std::future::pending::<()>().await;
        }
        sleep(behavior.load_delay).await;
        match behavior.script {
            Script::TransportError => Err(ExecutorError::Transport("tab crashed".to_string())),
            _ => Ok(()),
        }
    }

    async fn extract(
        &self,
        handle: &FakeHandle,
        format: OutputFormat,
    ) -> Result<ScrapeResult, ExecutorError> {
        self.state.lock().unwrap().formats.push(format);
        match self.behavior(&handle.url).script {
            Script::Succeed { title, content } => Ok(ScrapeResult::new(title, content)),
            Script::ExtractionError(message) => Err(ExecutorError::Extraction(message)),
            _ => Err(ExecutorError::Transport("no receiver".to_string())),
        }
    }

    async fn cancel(&self, handle: &FakeHandle) {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        state.live.remove(&handle.id);
    }
}
