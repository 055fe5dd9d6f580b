//! 归档层
//!
//! 把收集到的结果打包成一个 ZIP 文件（store 模式，无压缩依赖）

pub mod crc32;
pub mod zip_writer;

pub use crc32::{crc32, Crc32};
pub use zip_writer::{ArchiveEntry, ArchiveWriter};
