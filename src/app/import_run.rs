use tracing::info;

use crate::app::export::{write_report, RenderedReport};
use crate::app::render;
use crate::config::ToolkitConfig;
use crate::core::import::GroupImportEngine;
use crate::domain::model::ImportReport;
use crate::domain::ports::{RecordStore, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation;

/// Everything one import produced: the row-level report, the rendered text
/// form, and the report files written to disk.
pub struct ImportOutcome {
    pub report: ImportReport,
    pub text: String,
    pub written_files: Vec<String>,
}

/// Runs a bulk group import end to end: read the CSV through the storage
/// backend, feed it to the engine, write the configured report files.
pub struct ImportRun<S, T> {
    engine: GroupImportEngine<S>,
    storage: T,
    config: ToolkitConfig,
    monitor: SystemMonitor,
}

impl<S: RecordStore, T: Storage> ImportRun<S, T> {
    pub fn new(store: S, storage: T, config: ToolkitConfig) -> Self {
        let monitor = SystemMonitor::new(config.system_stats_enabled());
        Self {
            engine: GroupImportEngine::new(store),
            storage,
            config,
            monitor,
        }
    }

    pub async fn execute(&self, input_file: &str) -> Result<ImportOutcome> {
        validation::validate_file_extensions(
            "import.file",
            &[input_file.to_string()],
            &["csv"],
        )?;

        info!("📁 Reading {}", input_file);
        let bytes = self.storage.read_file(input_file).await?;
        self.monitor.log_stats("after read");

        let report = self.engine.import(&bytes).await?;
        self.monitor.log_stats("after import");

        let rendered = RenderedReport {
            base_name: "import_report".to_string(),
            text: render::render_import_text(&report),
            csv: render::render_import_csv(&report)?,
            json: render::render_import_json(&report)?,
        };
        let written_files = write_report(&self.storage, &self.config, &rendered).await?;
        for path in &written_files {
            info!("📄 Wrote {}", path);
        }
        self.monitor.log_final_stats();

        Ok(ImportOutcome {
            report,
            text: rendered.text,
            written_files,
        })
    }
}
