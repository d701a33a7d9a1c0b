use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type RecordId = u64;

/// Record kind used for every group query and insert.
pub const GROUP_KIND: &str = "groups";
/// Record kind of course records, fetched only for their titles.
pub const COURSE_KIND: &str = "sfwd-courses";
pub const STATUS_PUBLISHED: &str = "publish";

/// Meta key holding the user-supplied group identifier. This is the stored
/// data format of existing deployments, so it must not change.
pub const GROUP_IDENTIFIER_KEY: &str = "_uo_group_identifier";
/// Meta flag switched on for every imported or updated group.
pub const COURSE_MANAGEMENT_KEY: &str = "is_course_management_allowed";

/// Integration code of the quiz token set, also the ledger key under which
/// the automation engine records the raw quiz id.
pub const QUIZ_INTEGRATION: &str = "LDQUIZ";
pub const TRIGGER_PASS_QUIZ: &str = "LD_PASSQUIZ";
pub const TRIGGER_FAIL_QUIZ: &str = "LD_FAILQUIZ";

/// Trigger meta value meaning "no quiz associated", distinct from absent.
pub const NO_QUIZ_SENTINEL: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: RecordId,
    pub name: String,
    pub parent: Option<RecordId>,
    pub kind: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub parent: Option<RecordId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub parent: Option<RecordId>,
}

/// One parsed and sanitized CSV data row. `line` is 1-based counting the
/// header, so the first data row is line 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line: u64,
    pub name: String,
    pub identifier: String,
    pub parent_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedGroup {
    pub line: u64,
    pub name: String,
    pub id: RecordId,
    pub parent_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedGroup {
    pub line: u64,
    pub name: String,
    pub parent_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRow {
    pub line: u64,
    pub reason: String,
}

/// Outcome of one import run. Every data row lands in exactly one of the
/// three lists, in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: Vec<CreatedGroup>,
    pub updated: Vec<UpdatedGroup>,
    pub failed: Vec<FailedRow>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn rows_processed(&self) -> usize {
        self.created.len() + self.updated.len() + self.failed.len()
    }
}

/// One visited node of a hierarchy walk; `identifier` is empty when the
/// group has none assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: RecordId,
    pub name: String,
    pub parent: Option<RecordId>,
    pub identifier: String,
}

impl HierarchyNode {
    pub fn has_identifier(&self) -> bool {
        !self.identifier.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizToken {
    TestQuizId,
    CourseId,
    CourseTitle,
}

impl QuizToken {
    pub fn from_token_id(token_id: &str) -> Option<Self> {
        match token_id {
            "LDQUIZ_TEST_QUIZ_ID" => Some(Self::TestQuizId),
            "LDQUIZ_COURSE_ID" => Some(Self::CourseId),
            "LDQUIZ_COURSE_TITLE" => Some(Self::CourseTitle),
            _ => None,
        }
    }

    pub fn token_id(&self) -> &'static str {
        match self {
            Self::TestQuizId => "LDQUIZ_TEST_QUIZ_ID",
            Self::CourseId => "LDQUIZ_COURSE_ID",
            Self::CourseTitle => "LDQUIZ_COURSE_TITLE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TestQuizId => "Test quiz ID",
            Self::CourseId => "Associated course ID",
            Self::CourseTitle => "Associated course title",
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Self::CourseTitle => TokenKind::Text,
            _ => TokenKind::Int,
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::TestQuizId, Self::CourseId, Self::CourseTitle]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Int,
    Text,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Text => "text",
        }
    }
}

/// A token advertised to the automation engine for recipe editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDefinition {
    pub id: String,
    pub name: String,
    pub kind: TokenKind,
    pub integration: String,
}

impl TokenDefinition {
    pub fn for_quiz_token(token: QuizToken) -> Self {
        Self {
            id: token.token_id().to_string(),
            name: token.display_name().to_string(),
            kind: token.kind(),
            integration: QUIZ_INTEGRATION.to_string(),
        }
    }
}

/// Context bundle an automation run hands to token resolution. `trigger_meta`
/// is the fallback metadata mapping captured when the trigger fired.
#[derive(Debug, Clone, Default)]
pub struct TriggerEvent {
    pub trigger_code: String,
    pub recipe_id: u64,
    pub user_id: u64,
    pub trigger_meta: HashMap<String, String>,
}

impl TriggerEvent {
    pub fn new(trigger_code: &str, recipe_id: u64, user_id: u64) -> Self {
        Self {
            trigger_code: trigger_code.to_string(),
            recipe_id,
            user_id,
            trigger_meta: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: &str) -> Self {
        self.trigger_meta.insert(key.to_string(), value.to_string());
        self
    }
}
