use crate::core::registry::FilterRegistry;
use crate::domain::model::{
    QuizToken, TokenDefinition, TriggerEvent, NO_QUIZ_SENTINEL, QUIZ_INTEGRATION,
    TRIGGER_FAIL_QUIZ, TRIGGER_PASS_QUIZ,
};
use crate::domain::ports::{CourseLookup, RecordStore, TokenLedger};
use crate::utils::error::Result;

/// Hook priority the quiz token set registers under, kept stable so
/// embedders can order their own filters around it.
pub const TOKEN_REGISTRATION_PRIORITY: i64 = 9999;

/// Event name carrying the token catalog for one trigger code.
pub fn trigger_tokens_event(trigger_code: &str) -> String {
    format!("trigger_tokens.{}", trigger_code)
}

pub type TokenFilters = FilterRegistry<Vec<TokenDefinition>, TriggerEvent>;

/// Announces the three quiz-course tokens on the pass-quiz and fail-quiz
/// triggers. Other triggers see their catalog pass through untouched.
pub fn register_quiz_tokens(registry: &mut TokenFilters) {
    for trigger in [TRIGGER_PASS_QUIZ, TRIGGER_FAIL_QUIZ] {
        registry.add_filter(
            &trigger_tokens_event(trigger),
            TOKEN_REGISTRATION_PRIORITY,
            |mut tokens: Vec<TokenDefinition>, event: &TriggerEvent| {
                if event.trigger_code != TRIGGER_PASS_QUIZ
                    && event.trigger_code != TRIGGER_FAIL_QUIZ
                {
                    return tokens;
                }
                tokens.extend(
                    QuizToken::all()
                        .into_iter()
                        .map(TokenDefinition::for_quiz_token),
                );
                tokens
            },
        );
    }
}

pub fn tokens_for_trigger(registry: &TokenFilters, event: &TriggerEvent) -> Vec<TokenDefinition> {
    registry.apply(&trigger_tokens_event(&event.trigger_code), Vec::new(), event)
}

/// Resolves quiz-course token requests at recipe run time.
///
/// Every unresolved path hands the caller's default back unchanged; absence
/// of a quiz or course is a normal outcome, not an error. `Err` only
/// surfaces transport failures from the collaborators.
pub struct TokenResolver<L, C, S> {
    ledger: L,
    courses: C,
    store: S,
}

impl<L, C, S> TokenResolver<L, C, S>
where
    L: TokenLedger,
    C: CourseLookup,
    S: RecordStore,
{
    pub fn new(ledger: L, courses: C, store: S) -> Self {
        Self {
            ledger,
            courses,
            store,
        }
    }

    /// Token-substitution protocol entry point. `pieces` addresses a token
    /// as `[recipe_part, integration, token_id]`; anything that is not a
    /// recognized LDQUIZ token comes back as `default`, unchanged.
    pub async fn substitute(
        &self,
        pieces: &[&str],
        event: &TriggerEvent,
        default: &str,
    ) -> Result<String> {
        if pieces.len() < 3 || pieces[1] != QUIZ_INTEGRATION || pieces[2].is_empty() {
            return Ok(default.to_string());
        }
        self.resolve(pieces[2], event, default).await
    }

    pub async fn resolve(
        &self,
        token_id: &str,
        event: &TriggerEvent,
        default: &str,
    ) -> Result<String> {
        let token = match QuizToken::from_token_id(token_id) {
            Some(token) => token,
            None => return Ok(default.to_string()),
        };

        let quiz_id = match self.quiz_id(event).await? {
            Some(id) => id,
            None => {
                tracing::debug!("No quiz id recorded for recipe {}", event.recipe_id);
                return Ok(default.to_string());
            }
        };

        if token == QuizToken::TestQuizId {
            return Ok(quiz_id.to_string());
        }

        let course_id = match self.courses.course_for_quiz(quiz_id).await? {
            Some(id) if id != 0 => id,
            _ => {
                tracing::debug!("Quiz {} has no associated course", quiz_id);
                return Ok(default.to_string());
            }
        };

        if token == QuizToken::CourseId {
            return Ok(course_id.to_string());
        }

        // CourseTitle: a course record with an empty title renders as an
        // empty string rather than falling back to the default.
        match self.store.get(course_id).await? {
            Some(course) => Ok(course.name),
            None => Ok(default.to_string()),
        }
    }

    /// Quiz id for the run: the ledger value first, then the trigger meta
    /// fallback. The -1 sentinel and non-positive values count as absent.
    async fn quiz_id(&self, event: &TriggerEvent) -> Result<Option<u64>> {
        let recorded = self
            .ledger
            .recorded_value(QUIZ_INTEGRATION, event.recipe_id)
            .await?;
        if let Some(id) = recorded.as_deref().and_then(parse_positive_id) {
            return Ok(Some(id));
        }

        let fallback = event
            .trigger_meta
            .get(QUIZ_INTEGRATION)
            .and_then(|raw| match raw.trim().parse::<i64>() {
                Ok(NO_QUIZ_SENTINEL) => None,
                Ok(value) if value > 0 => Some(value as u64),
                _ => None,
            });
        Ok(fallback)
    }
}

fn parse_positive_id(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| *value > 0)
        .map(|value| value as u64)
}
