//! 归档条目与归档文件的命名

use crate::models::OutputFormat;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// 标题部分（不含扩展名）的最大字符数
pub const MAX_TITLE_CHARS: usize = 100;

const FORBIDDEN: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// 清理标题用作文件名
///
/// 非法字符替换为 `_`，去掉首尾空白，截断到 [`MAX_TITLE_CHARS`] 个字符。
/// 结果可能为空，由调用方决定占位名。
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { '_' } else { c })
        .collect();
    replaced.trim().chars().take(MAX_TITLE_CHARS).collect()
}

/// 单个条目的文件名：`<清理后的标题>.<md|html>`
///
/// 标题清理后为空时使用 `Untitled_<毫秒时间戳>`。
pub fn entry_name(title: &str, format: OutputFormat) -> String {
    format!("{}.{}", entry_stem(title), format.extension())
}

fn entry_stem(title: &str) -> String {
    let stem = sanitize_title(title);
    if stem.is_empty() {
        format!("Untitled_{}", Utc::now().timestamp_millis())
    } else {
        stem
    }
}

/// 归档文件名：`<prefix>_<YYYY-MM-DDTHH-MM-SS>.zip`（UTC）
pub fn archive_filename(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}.zip", prefix, now.format("%Y-%m-%dT%H-%M-%S"))
}

/// 为一个归档分配互不重复的条目名
///
/// 重名时在扩展名前追加 ` (2)`、` (3)` ……
#[derive(Debug)]
pub struct EntryNamer {
    format: OutputFormat,
    used: HashSet<String>,
}

impl EntryNamer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            used: HashSet::new(),
        }
    }

    pub fn next_name(&mut self, title: &str) -> String {
        let stem = entry_stem(title);
        let ext = self.format.extension();

        let mut name = format!("{}.{}", stem, ext);
        let mut n = 2;
        while self.used.contains(&name) {
            name = format!("{} ({}).{}", stem, n, ext);
            n += 1;
        }
        self.used.insert(name.clone());
        name
    }
}
