use crate::domain::model::{GroupRecord, GroupUpdate, NewGroup, RecordId};
use crate::utils::error::Result;
use async_trait::async_trait;

/// External record store holding the group hierarchy. Absence is `Ok(None)`
/// or an empty list; `Err` is reserved for transport and storage failures.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_identifier(
        &self,
        identifier: &str,
        kind: &str,
        status: &str,
    ) -> Result<Option<GroupRecord>>;

    async fn get(&self, id: RecordId) -> Result<Option<GroupRecord>>;

    async fn create(&self, group: NewGroup) -> Result<RecordId>;

    async fn update(&self, id: RecordId, update: GroupUpdate) -> Result<()>;

    /// Direct children of `parent`, in store order.
    async fn children(&self, parent: RecordId, kind: &str, status: &str)
        -> Result<Vec<GroupRecord>>;

    async fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()>;

    async fn get_meta(&self, id: RecordId, key: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait CourseLookup: Send + Sync {
    /// Course a quiz belongs to, when the platform has one recorded.
    async fn course_for_quiz(&self, quiz_id: RecordId) -> Result<Option<RecordId>>;
}

#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Raw value the automation engine recorded under `key` for a recipe run.
    async fn recorded_value(&self, key: &str, recipe_id: u64) -> Result<Option<String>>;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
