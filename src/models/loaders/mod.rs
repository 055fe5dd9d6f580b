pub mod toml_loader;

pub use toml_loader::{load_items, load_items_from_json, load_items_from_toml};
