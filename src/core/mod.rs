pub mod class_order;
pub mod config;
pub mod dex_file;
pub mod error;
pub mod header;
pub mod integrity;
pub mod io;
pub mod item;
pub mod items;
pub mod kind;
pub mod map;
pub mod section;

pub use dex_file::{DexFile, LayoutState};
