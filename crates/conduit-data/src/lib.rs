//! Loading routing configuration and network layouts from RON, TOML or
//! JSON data files.

pub mod layout;
pub mod loader;
pub mod schema;

pub use layout::{LoadedLayout, NameTable, load_config, load_layout, load_network};
pub use loader::DataLoadError;
