use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::model::{
    GroupRecord, GroupUpdate, NewGroup, RecordId, GROUP_KIND, STATUS_PUBLISHED,
};
use crate::domain::ports::{CourseLookup, RecordStore, TokenLedger};
use crate::utils::error::{Result, ToolkitError};

/// Record store backed by a remote LMS management API.
///
/// The wire format follows the upstream convention of `parent: 0` meaning
/// "no parent"; the adapter translates that to `None` at the boundary in
/// both directions.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordPayload {
    id: RecordId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    parent: Option<RecordId>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    status: String,
}

impl RecordPayload {
    fn into_group(self) -> GroupRecord {
        GroupRecord {
            id: self.id,
            name: self.title,
            parent: self.parent.filter(|parent| *parent != 0),
            kind: self.kind,
            status: self.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedPayload {
    id: RecordId,
}

#[derive(Debug, Deserialize)]
struct ValuePayload {
    value: String,
}

#[derive(Debug, Deserialize)]
struct CoursePayload {
    #[serde(default)]
    course_id: RecordId,
}

impl RestStore {
    pub fn new(endpoint: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: endpoint.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn get_request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        request
    }

    fn post_request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.post(format!("{}{}", self.base, path));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn fetch_records(&self, query: &[(&str, String)]) -> Result<Vec<GroupRecord>> {
        let response = self.get_request("/records").query(query).send().await?;
        debug!("GET /records -> {}", response.status());
        let payloads: Vec<RecordPayload> = response.error_for_status()?.json().await?;
        Ok(payloads.into_iter().map(RecordPayload::into_group).collect())
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
        kind: &str,
        status: &str,
    ) -> Result<Option<GroupRecord>> {
        let records = self
            .fetch_records(&[
                ("identifier", identifier.to_string()),
                ("kind", kind.to_string()),
                ("status", status.to_string()),
            ])
            .await?;
        Ok(records.into_iter().next())
    }

    async fn get(&self, id: RecordId) -> Result<Option<GroupRecord>> {
        let response = self.get_request(&format!("/records/{}", id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: RecordPayload = response.error_for_status()?.json().await?;
        Ok(Some(payload.into_group()))
    }

    async fn create(&self, group: NewGroup) -> Result<RecordId> {
        let response = self
            .post_request("/records")
            .json(&json!({
                "title": group.name,
                "parent": group.parent.unwrap_or(0),
                "type": GROUP_KIND,
                "status": STATUS_PUBLISHED,
            }))
            .send()
            .await?;
        debug!("POST /records -> {}", response.status());
        let created: CreatedPayload = response.error_for_status()?.json().await?;
        if created.id == 0 {
            return Err(ToolkitError::StoreError {
                message: "store returned record id 0 for a create".to_string(),
            });
        }
        Ok(created.id)
    }

    async fn update(&self, id: RecordId, update: GroupUpdate) -> Result<()> {
        let response = self
            .post_request(&format!("/records/{}", id))
            .json(&json!({ "parent": update.parent.unwrap_or(0) }))
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn children(
        &self,
        parent: RecordId,
        kind: &str,
        status: &str,
    ) -> Result<Vec<GroupRecord>> {
        self.fetch_records(&[
            ("parent", parent.to_string()),
            ("kind", kind.to_string()),
            ("status", status.to_string()),
        ])
        .await
    }

    async fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        let response = self
            .post_request(&format!("/records/{}/meta", id))
            .json(&json!({ "key": key, "value": value }))
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }

    async fn get_meta(&self, id: RecordId, key: &str) -> Result<Option<String>> {
        let response = self
            .get_request(&format!("/records/{}/meta/{}", id, key))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: ValuePayload = response.error_for_status()?.json().await?;
        Ok(Some(payload.value))
    }
}

#[async_trait]
impl CourseLookup for RestStore {
    async fn course_for_quiz(&self, quiz_id: RecordId) -> Result<Option<RecordId>> {
        let response = self
            .get_request(&format!("/quizzes/{}/course", quiz_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: CoursePayload = response.error_for_status()?.json().await?;
        Ok(Some(payload.course_id).filter(|id| *id != 0))
    }
}

#[async_trait]
impl TokenLedger for RestStore {
    async fn recorded_value(&self, key: &str, recipe_id: u64) -> Result<Option<String>> {
        let response = self
            .get_request(&format!("/recipes/{}/tokens/{}", recipe_id, key))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload: ValuePayload = response.error_for_status()?.json().await?;
        Ok(Some(payload.value))
    }
}
