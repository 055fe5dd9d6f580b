pub mod loaders;
pub mod scrape;
pub mod work_item;

pub use loaders::{load_items, load_items_from_json, load_items_from_toml};
pub use scrape::{OutputFormat, ScrapeResult};
pub use work_item::{ItemList, WorkItem};
