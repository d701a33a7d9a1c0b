use tracing::info;

use crate::app::export::{write_report, RenderedReport};
use crate::app::render;
use crate::config::ToolkitConfig;
use crate::core::hierarchy::GroupHierarchyReporter;
use crate::domain::model::{HierarchyNode, RecordId};
use crate::domain::ports::{RecordStore, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct HierarchyOutcome {
    pub root: RecordId,
    pub nodes: Vec<HierarchyNode>,
    pub text: String,
    pub written_files: Vec<String>,
}

impl HierarchyOutcome {
    /// Descendants still waiting for an identifier.
    pub fn missing_count(&self) -> usize {
        self.nodes.iter().filter(|node| !node.has_identifier()).count()
    }
}

/// Walks a group subtree and writes the missing-identifier report in the
/// configured formats.
pub struct HierarchyReportRun<S, T> {
    reporter: GroupHierarchyReporter<S>,
    storage: T,
    config: ToolkitConfig,
    monitor: SystemMonitor,
}

impl<S: RecordStore, T: Storage> HierarchyReportRun<S, T> {
    pub fn new(store: S, storage: T, config: ToolkitConfig) -> Self {
        let monitor = SystemMonitor::new(config.system_stats_enabled());
        Self {
            reporter: GroupHierarchyReporter::new(store),
            storage,
            config,
            monitor,
        }
    }

    pub async fn execute(&self, root: RecordId) -> Result<HierarchyOutcome> {
        info!("🔍 Walking descendants of group {}", root);
        let nodes = self.reporter.descendants(root).await?;
        self.monitor.log_stats("after walk");

        let rendered = RenderedReport {
            base_name: "hierarchy_report".to_string(),
            text: render::render_hierarchy_text(&nodes),
            csv: render::render_hierarchy_csv(&nodes)?,
            json: render::render_hierarchy_json(root, &nodes)?,
        };
        let written_files = write_report(&self.storage, &self.config, &rendered).await?;
        for path in &written_files {
            info!("📄 Wrote {}", path);
        }
        self.monitor.log_final_stats();

        Ok(HierarchyOutcome {
            root,
            nodes,
            text: rendered.text,
            written_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::utils::error::ToolkitError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> crate::utils::error::Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                ToolkitError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> crate::utils::error::Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_execute_reports_descendants_and_writes_files() {
        let store = MemoryStore::new();
        let root = store.seed_group("Root", None, Some("root")).await;
        let a = store.seed_group("Branch", Some(root), None).await;
        store.seed_group("Leaf", Some(a), Some("leaf")).await;

        let mut config = ToolkitConfig::default();
        config.report.output_formats = vec!["text".to_string(), "csv".to_string()];

        let storage = MockStorage::new();
        let run = HierarchyReportRun::new(store, storage.clone(), config);
        let outcome = run.execute(root).await.unwrap();

        assert_eq!(outcome.root, root);
        assert_eq!(outcome.nodes.len(), 2);
        assert_eq!(outcome.missing_count(), 1);
        assert!(outcome.text.contains("Groups With Missing Identifiers"));
        assert_eq!(
            outcome.written_files,
            vec![
                "./reports/hierarchy_report.txt",
                "./reports/hierarchy_report.csv",
            ]
        );

        let csv = storage.get_file("./reports/hierarchy_report.csv").await.unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert!(csv.starts_with("group_name,group_id,group_parent,group_identifier\n"));
        assert!(csv.contains("Branch"));
    }

    #[tokio::test]
    async fn test_execute_fails_for_unknown_root() {
        let run = HierarchyReportRun::new(
            MemoryStore::new(),
            MockStorage::new(),
            ToolkitConfig::default(),
        );

        let result = run.execute(404).await;

        assert!(matches!(
            result,
            Err(ToolkitError::GroupNotFoundError { id: 404 })
        ));
    }
}
