use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::model::{
    GroupRecord, GroupUpdate, NewGroup, RecordId, COURSE_KIND, GROUP_IDENTIFIER_KEY, GROUP_KIND,
    STATUS_PUBLISHED,
};
use crate::domain::ports::{CourseLookup, RecordStore, TokenLedger};
use crate::utils::error::{Result, ToolkitError};

#[derive(Debug, Clone)]
struct StoredRecord {
    id: RecordId,
    name: String,
    parent: Option<RecordId>,
    kind: String,
    status: String,
}

impl StoredRecord {
    fn to_group(&self) -> GroupRecord {
        GroupRecord {
            id: self.id,
            name: self.name.clone(),
            parent: self.parent,
            kind: self.kind.clone(),
            status: self.status.clone(),
        }
    }
}

#[derive(Default)]
struct Tables {
    next_id: RecordId,
    records: BTreeMap<RecordId, StoredRecord>,
    meta: HashMap<RecordId, HashMap<String, String>>,
    quiz_courses: HashMap<RecordId, RecordId>,
    ledger: HashMap<(String, u64), String>,
}

impl Tables {
    fn insert_record(
        &mut self,
        name: &str,
        parent: Option<RecordId>,
        kind: &str,
        status: &str,
    ) -> RecordId {
        self.next_id += 1;
        let id = self.next_id;
        self.records.insert(
            id,
            StoredRecord {
                id,
                name: name.to_string(),
                parent,
                kind: kind.to_string(),
                status: status.to_string(),
            },
        );
        id
    }
}

/// In-memory record store backing tests and the seeded demo mode of the
/// CLI. Clones share the same tables; ids are handed out from 1 upward.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

/// Counts reported after loading a seed file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSummary {
    pub groups: usize,
    pub courses: usize,
    pub quiz_links: usize,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    groups: Vec<SeedGroup>,
    #[serde(default)]
    courses: Vec<SeedCourse>,
    #[serde(default)]
    quiz_courses: Vec<SeedQuizCourse>,
}

#[derive(Debug, Deserialize)]
struct SeedGroup {
    name: String,
    #[serde(default)]
    identifier: Option<String>,
    /// Identifier of a group listed earlier in the same file.
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeedCourse {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SeedQuizCourse {
    quiz: RecordId,
    course: RecordId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one published group, optionally tagged with an identifier.
    pub async fn seed_group(
        &self,
        name: &str,
        parent: Option<RecordId>,
        identifier: Option<&str>,
    ) -> RecordId {
        let mut tables = self.tables.lock().await;
        let id = tables.insert_record(name, parent, GROUP_KIND, STATUS_PUBLISHED);
        if let Some(identifier) = identifier {
            tables
                .meta
                .entry(id)
                .or_default()
                .insert(GROUP_IDENTIFIER_KEY.to_string(), identifier.to_string());
        }
        id
    }

    pub async fn seed_course(&self, title: &str) -> RecordId {
        let mut tables = self.tables.lock().await;
        tables.insert_record(title, None, COURSE_KIND, STATUS_PUBLISHED)
    }

    #[cfg(test)]
    pub async fn seed_group_with_status(
        &self,
        name: &str,
        parent: Option<RecordId>,
        status: &str,
    ) -> RecordId {
        let mut tables = self.tables.lock().await;
        tables.insert_record(name, parent, GROUP_KIND, status)
    }

    pub async fn link_quiz_to_course(&self, quiz_id: RecordId, course_id: RecordId) {
        let mut tables = self.tables.lock().await;
        tables.quiz_courses.insert(quiz_id, course_id);
    }

    pub async fn record_token(&self, key: &str, recipe_id: u64, value: &str) {
        let mut tables = self.tables.lock().await;
        tables
            .ledger
            .insert((key.to_string(), recipe_id), value.to_string());
    }

    /// Loads a JSON seed fixture with groups, courses and quiz-course links.
    /// Group parents are referenced by identifier and must appear earlier in
    /// the same file.
    pub async fn load_seed(&self, bytes: &[u8]) -> Result<SeedSummary> {
        let seed: SeedFile = serde_json::from_slice(bytes)?;
        let mut summary = SeedSummary::default();
        let mut by_identifier: HashMap<String, RecordId> = HashMap::new();

        for group in &seed.groups {
            let parent = match &group.parent {
                Some(identifier) => Some(*by_identifier.get(identifier).ok_or_else(|| {
                    ToolkitError::ConfigError {
                        message: format!(
                            "Seed group '{}' references unknown parent identifier '{}'",
                            group.name, identifier
                        ),
                    }
                })?),
                None => None,
            };
            let id = self
                .seed_group(&group.name, parent, group.identifier.as_deref())
                .await;
            if let Some(identifier) = &group.identifier {
                by_identifier.insert(identifier.clone(), id);
            }
            summary.groups += 1;
        }

        for course in &seed.courses {
            self.seed_course(&course.title).await;
            summary.courses += 1;
        }

        for link in &seed.quiz_courses {
            self.link_quiz_to_course(link.quiz, link.course).await;
            summary.quiz_links += 1;
        }

        debug!(
            "Seeded {} groups, {} courses, {} quiz links",
            summary.groups, summary.courses, summary.quiz_links
        );
        Ok(summary)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
        kind: &str,
        status: &str,
    ) -> Result<Option<GroupRecord>> {
        let tables = self.tables.lock().await;
        for record in tables.records.values() {
            if record.kind != kind || record.status != status {
                continue;
            }
            let tagged = tables
                .meta
                .get(&record.id)
                .and_then(|meta| meta.get(GROUP_IDENTIFIER_KEY));
            if tagged.map(String::as_str) == Some(identifier) {
                return Ok(Some(record.to_group()));
            }
        }
        Ok(None)
    }

    async fn get(&self, id: RecordId) -> Result<Option<GroupRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.records.get(&id).map(StoredRecord::to_group))
    }

    async fn create(&self, group: NewGroup) -> Result<RecordId> {
        let mut tables = self.tables.lock().await;
        let id = tables.insert_record(&group.name, group.parent, GROUP_KIND, STATUS_PUBLISHED);
        debug!("Created group {} ('{}')", id, group.name);
        Ok(id)
    }

    async fn update(&self, id: RecordId, update: GroupUpdate) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match tables.records.get_mut(&id) {
            Some(record) => {
                record.parent = update.parent;
                Ok(())
            }
            None => Err(ToolkitError::StoreError {
                message: format!("Record {} does not exist", id),
            }),
        }
    }

    async fn children(
        &self,
        parent: RecordId,
        kind: &str,
        status: &str,
    ) -> Result<Vec<GroupRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .records
            .values()
            .filter(|r| r.parent == Some(parent) && r.kind == kind && r.status == status)
            .map(StoredRecord::to_group)
            .collect())
    }

    async fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables
            .meta
            .entry(id)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_meta(&self, id: RecordId, key: &str) -> Result<Option<String>> {
        let tables = self.tables.lock().await;
        Ok(tables.meta.get(&id).and_then(|meta| meta.get(key)).cloned())
    }
}

#[async_trait]
impl CourseLookup for MemoryStore {
    async fn course_for_quiz(&self, quiz_id: RecordId) -> Result<Option<RecordId>> {
        let tables = self.tables.lock().await;
        Ok(tables.quiz_courses.get(&quiz_id).copied())
    }
}

#[async_trait]
impl TokenLedger for MemoryStore {
    async fn recorded_value(&self, key: &str, recipe_id: u64) -> Result<Option<String>> {
        let tables = self.tables.lock().await;
        Ok(tables.ledger.get(&(key.to_string(), recipe_id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_sequential_ids_from_one() {
        let store = MemoryStore::new();

        let first = store
            .create(NewGroup {
                name: "Sales".to_string(),
                parent: None,
            })
            .await
            .unwrap();
        let second = store
            .create(NewGroup {
                name: "Support".to_string(),
                parent: Some(first),
            })
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        let fetched = store.get(second).await.unwrap().unwrap();
        assert_eq!(fetched.parent, Some(first));
        assert_eq!(fetched.status, STATUS_PUBLISHED);
    }

    #[tokio::test]
    async fn test_find_by_identifier_filters_kind_and_status() {
        let store = MemoryStore::new();
        let group = store.seed_group("Sales", None, Some("sales")).await;
        store.seed_course("Sales Onboarding").await;
        {
            // A draft group with the same identifier must stay invisible.
            let mut tables = store.tables.lock().await;
            let draft = tables.insert_record("Old Sales", None, GROUP_KIND, "draft");
            tables
                .meta
                .entry(draft)
                .or_default()
                .insert(GROUP_IDENTIFIER_KEY.to_string(), "sales".to_string());
        }

        let found = store
            .find_by_identifier("sales", GROUP_KIND, STATUS_PUBLISHED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, group);

        let missing = store
            .find_by_identifier("support", GROUP_KIND, STATUS_PUBLISHED)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_children_come_back_in_id_order() {
        let store = MemoryStore::new();
        let root = store.seed_group("Root", None, Some("root")).await;
        let a = store.seed_group("A", Some(root), Some("a")).await;
        let b = store.seed_group("B", Some(root), Some("b")).await;
        store.seed_group("Elsewhere", None, None).await;

        let children = store
            .children(root, GROUP_KIND, STATUS_PUBLISHED)
            .await
            .unwrap();
        let ids: Vec<RecordId> = children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_an_error() {
        let store = MemoryStore::new();
        let result = store.update(42, GroupUpdate { parent: None }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_meta_round_trip() {
        let store = MemoryStore::new();
        let id = store.seed_group("Sales", None, None).await;

        store.set_meta(id, "flag", "yes").await.unwrap();
        assert_eq!(
            store.get_meta(id, "flag").await.unwrap(),
            Some("yes".to_string())
        );
        assert_eq!(store.get_meta(id, "other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_seed_file_resolves_parents_by_identifier() {
        let store = MemoryStore::new();
        let seed = r#"{
            "groups": [
                {"name": "Head Office", "identifier": "hq"},
                {"name": "Sales", "identifier": "sales", "parent": "hq"}
            ],
            "courses": [{"title": "Advanced Botany"}],
            "quiz_courses": [{"quiz": 55, "course": 3}]
        }"#;

        let summary = store.load_seed(seed.as_bytes()).await.unwrap();
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.courses, 1);
        assert_eq!(summary.quiz_links, 1);

        let sales = store
            .find_by_identifier("sales", GROUP_KIND, STATUS_PUBLISHED)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sales.parent, Some(1));
        assert_eq!(store.course_for_quiz(55).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_seed_file_with_unknown_parent_fails() {
        let store = MemoryStore::new();
        let seed = r#"{"groups": [{"name": "Sales", "identifier": "s", "parent": "ghost"}]}"#;
        assert!(store.load_seed(seed.as_bytes()).await.is_err());
    }
}
