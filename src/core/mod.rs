pub mod hierarchy;
pub mod import;
pub mod registry;
pub mod tokens;

pub use crate::domain::model::{GroupRecord, HierarchyNode, ImportReport, TriggerEvent};
pub use crate::domain::ports::{CourseLookup, RecordStore, Storage, TokenLedger};
pub use crate::utils::error::Result;

pub use hierarchy::GroupHierarchyReporter;
pub use import::GroupImportEngine;
pub use registry::FilterRegistry;
pub use tokens::TokenResolver;
