use lms_toolkit::adapters::{LocalStorage, MemoryStore};
use lms_toolkit::app::ImportRun;
use lms_toolkit::config::{CompressionConfig, ToolkitConfig};
use lms_toolkit::domain::model::{GROUP_KIND, STATUS_PUBLISHED};
use lms_toolkit::domain::ports::RecordStore;
use lms_toolkit::ToolkitError;
use tempfile::TempDir;

const CSV_FIRST_RUN: &str = "group_name,group_identifier,group_parent\n\
Region North,region-north,\n\
Store 001,store-001,region-north\n\
Store 002,store-002,region-north\n";

fn config_for(formats: &[&str]) -> ToolkitConfig {
    let mut config = ToolkitConfig::default();
    config.report.output_path = "reports".to_string();
    config.report.output_formats = formats.iter().map(|f| f.to_string()).collect();
    config
}

fn write_input(temp_dir: &TempDir, name: &str, content: &str) {
    std::fs::write(temp_dir.path().join(name), content).unwrap();
}

#[tokio::test]
async fn test_end_to_end_import_creates_hierarchy() {
    let temp_dir = TempDir::new().unwrap();
    write_input(&temp_dir, "groups.csv", CSV_FIRST_RUN);

    let store = MemoryStore::new();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let run = ImportRun::new(store.clone(), storage, config_for(&["text", "csv", "json"]));

    let outcome = run.execute("groups.csv").await.unwrap();

    // All three rows are new groups, stores hang off the region
    assert_eq!(outcome.report.created.len(), 3);
    assert_eq!(outcome.report.updated.len(), 0);
    assert!(outcome.report.is_success());
    assert!(outcome.text.contains("Groups Added: 3"));

    let region = store
        .find_by_identifier("region-north", GROUP_KIND, STATUS_PUBLISHED)
        .await
        .unwrap()
        .unwrap();
    let store_001 = store
        .find_by_identifier("store-001", GROUP_KIND, STATUS_PUBLISHED)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(store_001.parent, Some(region.id));

    // Every configured format landed under the report path
    for file in ["import_report.txt", "import_report.csv", "import_report.json"] {
        let path = temp_dir.path().join("reports").join(file);
        assert!(path.exists(), "missing report file {}", file);
    }

    let text = std::fs::read_to_string(temp_dir.path().join("reports/import_report.txt")).unwrap();
    assert!(text.contains("New Groups"));
    assert!(text.contains("Region North"));
}

#[tokio::test]
async fn test_reimport_updates_without_duplicating() {
    let temp_dir = TempDir::new().unwrap();
    write_input(&temp_dir, "groups.csv", CSV_FIRST_RUN);

    let store = MemoryStore::new();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let run = ImportRun::new(store.clone(), storage, config_for(&["text"]));

    let first = run.execute("groups.csv").await.unwrap();
    assert_eq!(first.report.created.len(), 3);

    let second = run.execute("groups.csv").await.unwrap();

    assert_eq!(second.report.created.len(), 0);
    assert_eq!(second.report.updated.len(), 3);
    assert!(second.report.is_success());
    assert!(second.text.contains("Groups Added: 0"));

    // Still exactly one record per identifier
    let region = store
        .find_by_identifier("region-north", GROUP_KIND, STATUS_PUBLISHED)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(region.name, "Region North");
}

#[tokio::test]
async fn test_import_report_archive() {
    let temp_dir = TempDir::new().unwrap();
    write_input(&temp_dir, "groups.csv", CSV_FIRST_RUN);

    let mut config = config_for(&["text", "csv"]);
    config.report.compression = Some(CompressionConfig {
        enabled: true,
        filename: "import_report_{timestamp}.zip".to_string(),
    });

    let store = MemoryStore::new();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let run = ImportRun::new(store, storage, config);

    let outcome = run.execute("groups.csv").await.unwrap();

    assert_eq!(outcome.written_files.len(), 1);
    let archive_path = temp_dir.path().join(&outcome.written_files[0]);
    assert!(archive_path.exists());

    // Verify the archive bundles both formats
    let zip_data = std::fs::read(&archive_path).unwrap();
    let cursor = std::io::Cursor::new(zip_data);
    let mut archive = zip::ZipArchive::new(cursor).unwrap();
    assert_eq!(archive.len(), 2);

    let mut file_names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    file_names.sort();
    assert_eq!(file_names, vec!["import_report.csv", "import_report.txt"]);

    let mut text_file = archive.by_name("import_report.txt").unwrap();
    let mut text_content = String::new();
    std::io::Read::read_to_string(&mut text_file, &mut text_content).unwrap();
    assert!(text_content.contains("Groups Added: 3"));
}

#[tokio::test]
async fn test_malformed_row_aborts_the_run() {
    let temp_dir = TempDir::new().unwrap();
    write_input(
        &temp_dir,
        "groups.csv",
        "group_name,group_identifier,group_parent\nOnly Two,columns\n",
    );

    let store = MemoryStore::new();
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let run = ImportRun::new(store, storage, config_for(&["text"]));

    let result = run.execute("groups.csv").await;

    assert!(matches!(
        result,
        Err(ToolkitError::MalformedRowError { line: 2, columns: 2 })
    ));
    // The run died before any report could be written
    assert!(!temp_dir.path().join("reports").exists());
}
