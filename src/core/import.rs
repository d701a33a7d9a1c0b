use std::collections::HashMap;

use csv::ReaderBuilder;
use tracing::{debug, info};

use crate::domain::model::{
    CreatedGroup, FailedRow, GroupUpdate, ImportReport, ImportRow, NewGroup, RecordId,
    UpdatedGroup, COURSE_MANAGEMENT_KEY, GROUP_IDENTIFIER_KEY, GROUP_KIND, STATUS_PUBLISHED,
};
use crate::domain::ports::RecordStore;
use crate::utils::error::{Result, ToolkitError};
use crate::utils::validation::{clean_text_field, normalize_identifier, strip_bom};

pub const EXPECTED_HEADER: [&str; 3] = ["group_name", "group_identifier", "group_parent"];

pub const REASON_MISSING_NAME: &str = "Missing group name";
pub const REASON_MISSING_IDENTIFIER: &str = "Missing group identifier";
pub const REASON_PARENT_NOT_FOUND: &str = "Parent group not found";
pub const REASON_CREATE_FAILED: &str = "Failed to create group";

/// Parses CSV bytes into sanitized import rows.
///
/// Structural problems abort the parse: the header must read exactly
/// `group_name,group_identifier,group_parent` and every data row must have
/// three columns. Empty required fields are not structural; they are left in
/// the rows for the upsert pass to report per line. Field bytes are decoded
/// lossily, so odd encodings mangle text rather than fail the run.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<ImportRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = reader.byte_records();

    let header = match records.next() {
        Some(record) => record?,
        None => {
            return Err(ToolkitError::InvalidHeaderError {
                detail: "the file has no header row".to_string(),
            })
        }
    };
    let header_fields: Vec<String> = header
        .iter()
        .map(|field| strip_bom(&String::from_utf8_lossy(field)).trim().to_string())
        .collect();
    if header_fields != EXPECTED_HEADER {
        return Err(ToolkitError::InvalidHeaderError {
            detail: format!(
                "expected '{}', found '{}'",
                EXPECTED_HEADER.join(","),
                header_fields.join(",")
            ),
        });
    }

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record?;
        // Line 1 is the header, so the first data row is line 2.
        let line = index as u64 + 2;
        if record.len() != 3 {
            return Err(ToolkitError::MalformedRowError {
                line,
                columns: record.len(),
            });
        }
        let fields: Vec<String> = record
            .iter()
            .map(|field| strip_bom(&String::from_utf8_lossy(field)).to_string())
            .collect();
        rows.push(ImportRow {
            line,
            name: clean_text_field(&fields[0]),
            identifier: normalize_identifier(&fields[1]),
            parent_identifier: normalize_identifier(&fields[2]),
        });
    }
    Ok(rows)
}

enum ParentLookup {
    NotRequested,
    Found(RecordId),
    Missing,
}

/// Bulk creates and updates groups from a CSV document.
///
/// Rows are processed strictly in input order and each lands in exactly one
/// of the report lists. Groups touched earlier in the run are visible as
/// parents to later rows through an in-run identifier index, so a parent row
/// only has to appear above its children, not in a previous run.
pub struct GroupImportEngine<S> {
    store: S,
}

impl<S: RecordStore> GroupImportEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn import(&self, bytes: &[u8]) -> Result<ImportReport> {
        let rows = parse_rows(bytes)?;
        info!("Parsed {} data rows", rows.len());
        self.import_rows(rows).await
    }

    pub async fn import_rows(&self, rows: Vec<ImportRow>) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        let mut run_index: HashMap<String, RecordId> = HashMap::new();

        for row in rows {
            if row.name.is_empty() {
                report.failed.push(FailedRow {
                    line: row.line,
                    reason: REASON_MISSING_NAME.to_string(),
                });
                continue;
            }
            if row.identifier.is_empty() {
                report.failed.push(FailedRow {
                    line: row.line,
                    reason: REASON_MISSING_IDENTIFIER.to_string(),
                });
                continue;
            }

            let parent = match self
                .resolve_parent(&row.parent_identifier, &run_index)
                .await?
            {
                ParentLookup::NotRequested => None,
                ParentLookup::Found(id) => Some(id),
                ParentLookup::Missing => {
                    report.failed.push(FailedRow {
                        line: row.line,
                        reason: REASON_PARENT_NOT_FOUND.to_string(),
                    });
                    continue;
                }
            };

            let existing = self
                .store
                .find_by_identifier(&row.identifier, GROUP_KIND, STATUS_PUBLISHED)
                .await?;
            match existing {
                Some(group) => {
                    // The update rewrites the parent only, clearing it when
                    // the CSV field is empty. The stored name stays as-is
                    // even when the CSV disagrees.
                    self.store.update(group.id, GroupUpdate { parent }).await?;
                    self.store
                        .set_meta(group.id, COURSE_MANAGEMENT_KEY, "1")
                        .await?;
                    run_index.insert(row.identifier.clone(), group.id);
                    debug!("Updated group {} from line {}", group.id, row.line);
                    report.updated.push(UpdatedGroup {
                        line: row.line,
                        name: row.name,
                        parent_identifier: row.parent_identifier,
                    });
                }
                None => match self
                    .store
                    .create(NewGroup {
                        name: row.name.clone(),
                        parent,
                    })
                    .await
                {
                    Ok(id) => {
                        self.store
                            .set_meta(id, GROUP_IDENTIFIER_KEY, &row.identifier)
                            .await?;
                        self.store.set_meta(id, COURSE_MANAGEMENT_KEY, "1").await?;
                        run_index.insert(row.identifier.clone(), id);
                        debug!("Created group {} from line {}", id, row.line);
                        report.created.push(CreatedGroup {
                            line: row.line,
                            name: row.name,
                            id,
                            parent_identifier: row.parent_identifier,
                        });
                    }
                    Err(error) => {
                        // One rejected insert does not abort the run; the
                        // row is reported and the import moves on.
                        debug!("Create failed on line {}: {}", row.line, error);
                        report.failed.push(FailedRow {
                            line: row.line,
                            reason: REASON_CREATE_FAILED.to_string(),
                        });
                    }
                },
            }
        }

        info!(
            "Import finished: {} created, {} updated, {} failed",
            report.created.len(),
            report.updated.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn resolve_parent(
        &self,
        parent_identifier: &str,
        run_index: &HashMap<String, RecordId>,
    ) -> Result<ParentLookup> {
        if parent_identifier.is_empty() {
            return Ok(ParentLookup::NotRequested);
        }
        if let Some(id) = run_index.get(parent_identifier) {
            return Ok(ParentLookup::Found(*id));
        }
        let found = self
            .store
            .find_by_identifier(parent_identifier, GROUP_KIND, STATUS_PUBLISHED)
            .await?;
        Ok(match found {
            Some(group) => ParentLookup::Found(group.id),
            None => ParentLookup::Missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::model::GroupRecord;
    use async_trait::async_trait;

    const HEADER: &str = "group_name,group_identifier,group_parent\n";

    async fn run_import(store: &MemoryStore, csv: &str) -> ImportReport {
        GroupImportEngine::new(store.clone())
            .import(csv.as_bytes())
            .await
            .unwrap()
    }

    #[test]
    fn test_empty_file_is_a_header_error() {
        let result = parse_rows(b"");
        assert!(matches!(
            result,
            Err(ToolkitError::InvalidHeaderError { .. })
        ));
    }

    #[test]
    fn test_wrong_header_aborts_the_parse() {
        let result = parse_rows(b"name,identifier,parent\nAlpha,a,\n");
        assert!(matches!(
            result,
            Err(ToolkitError::InvalidHeaderError { .. })
        ));
    }

    #[test]
    fn test_header_tolerates_bom_and_padding() {
        let csv = "\u{feff}group_name, group_identifier ,group_parent\nAlpha,a,\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].identifier, "a");
    }

    #[test]
    fn test_malformed_row_aborts_the_parse() {
        let short = format!("{}Alpha,a,\nBeta,b\n", HEADER);
        match parse_rows(short.as_bytes()) {
            Err(ToolkitError::MalformedRowError { line, columns }) => {
                assert_eq!(line, 3);
                assert_eq!(columns, 2);
            }
            other => panic!("expected malformed row error, got {:?}", other.map(|_| ())),
        }

        let long = format!("{}Alpha,a,,extra\n", HEADER);
        assert!(matches!(
            parse_rows(long.as_bytes()),
            Err(ToolkitError::MalformedRowError {
                line: 2,
                columns: 4
            })
        ));
    }

    #[test]
    fn test_fields_are_sanitized_during_parse() {
        let csv = format!("{}<b>Group  A</b>,GA-1!,Parent Group\n", HEADER);
        let rows = parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].name, "Group A");
        assert_eq!(rows[0].identifier, "ga-1");
        assert_eq!(rows[0].parent_identifier, "parentgroup");
    }

    #[tokio::test]
    async fn test_created_group_carries_identifier_and_management_meta() {
        let store = MemoryStore::new();
        let csv = format!("{}Group A,ga-1,\n", HEADER);

        let report = run_import(&store, &csv).await;

        assert_eq!(report.created.len(), 1);
        assert!(report.is_success());
        let created = &report.created[0];
        assert_eq!(created.line, 2);
        assert_eq!(created.name, "Group A");
        assert_eq!(created.parent_identifier, "");
        assert_eq!(
            store
                .get_meta(created.id, GROUP_IDENTIFIER_KEY)
                .await
                .unwrap(),
            Some("ga-1".to_string())
        );
        assert_eq!(
            store
                .get_meta(created.id, COURSE_MANAGEMENT_KEY)
                .await
                .unwrap(),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_required_fields_fail_per_row_not_per_run() {
        let store = MemoryStore::new();
        // Name reduced to nothing by sanitization, identifier likewise, and
        // one healthy row that must still go through.
        let csv = format!("{}<i></i>,x1,\nGroup B,###,\nGroup C,gc,\n", HEADER);

        let report = run_import(&store, &csv).await;

        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].name, "Group C");
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].line, 2);
        assert_eq!(report.failed[0].reason, REASON_MISSING_NAME);
        assert_eq!(report.failed[1].line, 3);
        assert_eq!(report.failed[1].reason, REASON_MISSING_IDENTIFIER);
    }

    #[tokio::test]
    async fn test_parent_resolves_within_the_same_run() {
        let store = MemoryStore::new();
        let csv = format!("{}Head Office,hq,\nSales,sales,hq\n", HEADER);

        let report = run_import(&store, &csv).await;

        assert_eq!(report.created.len(), 2);
        let hq = report.created[0].id;
        let sales = store.get(report.created[1].id).await.unwrap().unwrap();
        assert_eq!(sales.parent, Some(hq));
    }

    #[tokio::test]
    async fn test_parent_row_must_come_first() {
        let store = MemoryStore::new();
        let csv = format!("{}Sales,sales,hq\nHead Office,hq,\n", HEADER);

        let report = run_import(&store, &csv).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].line, 2);
        assert_eq!(report.failed[0].reason, REASON_PARENT_NOT_FOUND);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].name, "Head Office");
    }

    #[tokio::test]
    async fn test_parent_from_a_previous_run_is_found_in_the_store() {
        let store = MemoryStore::new();
        let hq = store.seed_group("Head Office", None, Some("hq")).await;
        let csv = format!("{}Sales,sales,hq\n", HEADER);

        let report = run_import(&store, &csv).await;

        assert_eq!(report.created.len(), 1);
        let sales = store.get(report.created[0].id).await.unwrap().unwrap();
        assert_eq!(sales.parent, Some(hq));
    }

    #[tokio::test]
    async fn test_reimport_updates_without_renaming() {
        let store = MemoryStore::new();
        let first = format!("{}Head Office,hq,\nSales,sales,hq\n", HEADER);
        let report = run_import(&store, &first).await;
        let sales_id = report.created[1].id;

        let second = format!("{}Renamed Office,hq,\nRenamed Sales,sales,hq\n", HEADER);
        let rerun = run_import(&store, &second).await;

        assert!(rerun.created.is_empty());
        assert_eq!(rerun.updated.len(), 2);
        assert_eq!(rerun.updated[1].line, 3);
        // Report rows echo the CSV name, but the stored record keeps its own.
        assert_eq!(rerun.updated[1].name, "Renamed Sales");
        let sales = store.get(sales_id).await.unwrap().unwrap();
        assert_eq!(sales.name, "Sales");
    }

    #[tokio::test]
    async fn test_update_clears_parent_when_csv_field_is_empty() {
        let store = MemoryStore::new();
        let first = format!("{}Head Office,hq,\nSales,sales,hq\n", HEADER);
        run_import(&store, &first).await;

        let second = format!("{}Sales,sales,\n", HEADER);
        let rerun = run_import(&store, &second).await;

        assert_eq!(rerun.updated.len(), 1);
        let sales = store
            .find_by_identifier("sales", GROUP_KIND, STATUS_PUBLISHED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sales.parent, None);
    }

    #[tokio::test]
    async fn test_identifier_matching_is_case_insensitive() {
        let store = MemoryStore::new();
        let first = format!("{}Head Office,HQ,\n", HEADER);
        run_import(&store, &first).await;

        let second = format!("{}Head Office,hq,\nSales,sales,Hq\n", HEADER);
        let rerun = run_import(&store, &second).await;

        assert_eq!(rerun.updated.len(), 1);
        assert_eq!(rerun.created.len(), 1);
        assert!(rerun.is_success());
    }

    #[derive(Clone)]
    struct RejectingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl RecordStore for RejectingStore {
        async fn find_by_identifier(
            &self,
            identifier: &str,
            kind: &str,
            status: &str,
        ) -> Result<Option<GroupRecord>> {
            self.inner.find_by_identifier(identifier, kind, status).await
        }

        async fn get(&self, id: RecordId) -> Result<Option<GroupRecord>> {
            self.inner.get(id).await
        }

        async fn create(&self, _group: NewGroup) -> Result<RecordId> {
            Err(ToolkitError::StoreError {
                message: "insert rejected".to_string(),
            })
        }

        async fn update(&self, id: RecordId, update: GroupUpdate) -> Result<()> {
            self.inner.update(id, update).await
        }

        async fn children(
            &self,
            parent: RecordId,
            kind: &str,
            status: &str,
        ) -> Result<Vec<GroupRecord>> {
            self.inner.children(parent, kind, status).await
        }

        async fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
            self.inner.set_meta(id, key, value).await
        }

        async fn get_meta(&self, id: RecordId, key: &str) -> Result<Option<String>> {
            self.inner.get_meta(id, key).await
        }
    }

    #[tokio::test]
    async fn test_rejected_insert_is_a_row_failure_not_a_run_failure() {
        let store = RejectingStore {
            inner: MemoryStore::new(),
        };
        let csv = format!("{}Group A,ga,\nGroup B,gb,\n", HEADER);

        let report = GroupImportEngine::new(store)
            .import(csv.as_bytes())
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .all(|f| f.reason == REASON_CREATE_FAILED));
        assert_eq!(report.rows_processed(), 2);
    }

    #[tokio::test]
    async fn test_every_row_lands_in_exactly_one_list() {
        let store = MemoryStore::new();
        store.seed_group("Old", None, Some("old")).await;
        let csv = format!(
            "{}Fresh,fresh,\nOld,old,\n,broken,\nOrphan,orphan,ghost\n",
            HEADER
        );

        let report = run_import(&store, &csv).await;

        assert_eq!(report.rows_processed(), 4);
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.failed.len(), 2);
        let failed_lines: Vec<u64> = report.failed.iter().map(|f| f.line).collect();
        assert_eq!(failed_lines, vec![4, 5]);
    }
}
