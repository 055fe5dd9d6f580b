//! 控制层：批次命令、收尾打包与投递

pub mod batch;
#[cfg(test)]
pub mod fake_sink;
pub mod naming;
pub mod sink;

pub use batch::{finalize, Ack, ArchiveOptions, BatchCommand, BatchController, BatchOutcome, BatchRequest};
pub use naming::{archive_filename, entry_name, sanitize_title, EntryNamer};
pub use sink::{DeliverySink, FileSink};
