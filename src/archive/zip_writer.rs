//! ZIP 归档生成器（仅 store，不压缩）
//!
//! 输出与常见解压工具兼容：
//!
//! ```text
//! [本地文件头 30B + 文件名 + 数据] × N
//! [中央目录记录 46B + 文件名] × N
//! [目录结束记录 22B]
//! ```
//!
//! 所有整数字段均为小端序。不支持 ZIP64：超出字段宽度的长度、偏移和条目数
//! 会被截到字段上限并记录警告，超长文件名按上限截断，保证目录记录自洽。

use super::crc32::crc32;
use tracing::warn;

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// 版本号 1.0：store 条目所需的最低版本
const VERSION: u16 = 10;
const METHOD_STORE: u16 = 0;

pub const LOCAL_HEADER_LEN: usize = 30;
pub const CENTRAL_HEADER_LEN: usize = 46;
pub const END_RECORD_LEN: usize = 22;

/// 单个归档条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub payload: Vec<u8>,
}

/// ZIP 归档生成器
///
/// 先用 [`ArchiveWriter::add_entry`] 按顺序添加全部条目，再调用
/// [`ArchiveWriter::generate`] 一次性得到完整字节流。
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    entries: Vec<ArchiveEntry>,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个条目
    ///
    /// `payload` 可以是文本（按 UTF-8 编码）或原始字节。
    pub fn add_entry(&mut self, name: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.entries.push(ArchiveEntry {
            name: name.into(),
            payload: payload.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// 生成完整的归档字节流
    pub fn generate(&self) -> Vec<u8> {
        let body_len: usize = self
            .entries
            .iter()
            .map(|e| LOCAL_HEADER_LEN + CENTRAL_HEADER_LEN + 2 * e.name.len() + e.payload.len())
            .sum();
        let mut out = Vec::with_capacity(body_len + END_RECORD_LEN);
        let mut central = Vec::with_capacity(
            self.entries
                .iter()
                .map(|e| CENTRAL_HEADER_LEN + e.name.len())
                .sum(),
        );

        for entry in &self.entries {
            let name_len = field_u16(entry.name.len(), "文件名长度");
            let name = &entry.name.as_bytes()[..usize::from(name_len)];
            let crc = crc32(&entry.payload);
            let size = field_u32(entry.payload.len(), "条目大小");
            let offset = field_u32(out.len(), "条目偏移");

            // 本地文件头
            put_u32(&mut out, LOCAL_FILE_HEADER_SIGNATURE);
            put_u16(&mut out, VERSION); // 解压所需版本
            put_u16(&mut out, 0); // 标志位
            put_u16(&mut out, METHOD_STORE);
            put_u16(&mut out, 0); // 修改时间
            put_u16(&mut out, 0); // 修改日期
            put_u32(&mut out, crc);
            put_u32(&mut out, size); // 压缩后大小
            put_u32(&mut out, size); // 原始大小
            put_u16(&mut out, name_len);
            put_u16(&mut out, 0); // 扩展字段长度
            out.extend_from_slice(name);
            out.extend_from_slice(&entry.payload);

            // 中央目录记录
            put_u32(&mut central, CENTRAL_DIRECTORY_SIGNATURE);
            put_u16(&mut central, VERSION); // 创建版本
            put_u16(&mut central, VERSION); // 解压所需版本
            put_u16(&mut central, 0);
            put_u16(&mut central, METHOD_STORE);
            put_u16(&mut central, 0);
            put_u16(&mut central, 0);
            put_u32(&mut central, crc);
            put_u32(&mut central, size);
            put_u32(&mut central, size);
            put_u16(&mut central, name_len);
            put_u16(&mut central, 0); // 扩展字段长度
            put_u16(&mut central, 0); // 注释长度
            put_u16(&mut central, 0); // 起始磁盘号
            put_u16(&mut central, 0); // 内部属性
            put_u32(&mut central, 0); // 外部属性
            put_u32(&mut central, offset);
            central.extend_from_slice(name);
        }

        let central_offset = field_u32(out.len(), "中央目录偏移");
        let central_size = field_u32(central.len(), "中央目录大小");
        let count = field_u16(self.entries.len(), "条目数");
        out.extend_from_slice(&central);

        // 目录结束记录
        put_u32(&mut out, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(&mut out, 0); // 当前磁盘号
        put_u16(&mut out, 0); // 中央目录所在磁盘
        put_u16(&mut out, count); // 本磁盘条目数
        put_u16(&mut out, count); // 条目总数
        put_u32(&mut out, central_size);
        put_u32(&mut out, central_offset);
        put_u16(&mut out, 0); // 注释长度

        out
    }
}

/// 超出 u16 的值截到 `u16::MAX`
fn field_u16(value: usize, field: &str) -> u16 {
    u16::try_from(value).unwrap_or_else(|_| {
        warn!("[归档] ⚠️ {} {} 超出 ZIP 字段上限，截为 {}", field, value, u16::MAX);
        u16::MAX
    })
}

/// 超出 u32 的值截到 `u32::MAX`
fn field_u32(value: usize, field: &str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        warn!("[归档] ⚠️ {} {} 超出 ZIP 字段上限，截为 {}", field, value, u32::MAX);
        u32::MAX
    })
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}
