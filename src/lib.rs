pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{LocalStorage, MemoryStore, RestStore};
pub use app::{HierarchyReportRun, ImportRun};
pub use config::ToolkitConfig;
pub use core::{
    hierarchy::GroupHierarchyReporter, import::GroupImportEngine, registry::FilterRegistry,
    tokens::TokenResolver,
};
pub use utils::error::{Result, ToolkitError};
