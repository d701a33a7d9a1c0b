pub mod export;
pub mod import_run;
pub mod render;
pub mod report_run;

pub use export::{write_report, RenderedReport};
pub use import_run::{ImportOutcome, ImportRun};
pub use report_run::{HierarchyOutcome, HierarchyReportRun};
