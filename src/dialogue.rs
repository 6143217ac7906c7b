//! # Conversation Collector
//!
//! Drives a per-user sequence of prompts declared as a [`Flow`], stores each
//! validated answer into the user's [`Session`] and hands back a
//! [`Record`] once the last step is passed.
//!
//! ## Features
//!
//! - `single` steps: one answer per prompt, optional validator
//! - `multi` steps: repeated answers until a terminator token, with a minimum count
//! - One live session per user; starting again replaces the previous one
//! - Idle sessions can be swept with [`ConversationCollector::expire_idle`]

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Terminator used by multi steps unless configured otherwise
pub const DEFAULT_TERMINATOR: &str = "/end";

/// Minimum number of items a multi step needs unless configured otherwise
pub const DEFAULT_MIN_COUNT: usize = 1;

/// Message used when a validator panics instead of answering, unless the flow sets its own
pub const GENERIC_VALIDATION_MESSAGE: &str = "Could not validate this answer, please try again.";

/// Predicate over the raw text of an answer. `Err` carries the message shown to the user.
pub type Validator = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Errors returned by the collector
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    /// No conversation is in progress for this user
    #[error("no active session")]
    NoActiveSession,
    /// The answer was rejected; the same prompt must be shown again
    #[error("{message}")]
    Validation { message: String, prompt: Prompt },
    /// Reserved for concurrent flows per user; `start` always replaces today
    #[error("conflicting session: {0}")]
    Conflict(String),
}

/// Errors raised while building a [`Flow`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("flow '{0}' has no steps")]
    Empty(String),
    #[error("field '{0}' is declared twice")]
    DuplicateField(String),
    #[error("multi step '{0}' has an empty terminator")]
    EmptyTerminator(String),
}

/// Text to show the user, plus the terminator to offer when a multi step is waiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub text: String,
    pub terminator: Option<String>,
}

/// A step collecting exactly one answer
#[derive(Clone)]
pub struct SingleStep {
    field: String,
    prompt: String,
    validator: Option<Validator>,
}

impl SingleStep {
    pub fn new(field: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            prompt: prompt.into(),
            validator: None,
        }
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }
}

/// A step collecting answers until the terminator token arrives
#[derive(Clone)]
pub struct MultiStep {
    field: String,
    prompt: String,
    terminator: String,
    item_validator: Option<Validator>,
    min_count: usize,
    ack: Option<String>,
    min_count_message: Option<String>,
}

impl MultiStep {
    pub fn new(field: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            prompt: prompt.into(),
            terminator: DEFAULT_TERMINATOR.to_string(),
            item_validator: None,
            min_count: DEFAULT_MIN_COUNT,
            ack: None,
            min_count_message: None,
        }
    }

    pub fn terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    pub fn item_validator(mut self, validator: Validator) -> Self {
        self.item_validator = Some(validator);
        self
    }

    pub fn min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    /// Text sent back after an item is accepted
    pub fn ack(mut self, ack: impl Into<String>) -> Self {
        self.ack = Some(ack.into());
        self
    }

    /// Text sent when the terminator arrives before `min_count` items
    pub fn min_count_message(mut self, message: impl Into<String>) -> Self {
        self.min_count_message = Some(message.into());
        self
    }

    fn is_terminator(&self, text: &str) -> bool {
        text.trim() == self.terminator
    }

    fn ack_prompt(&self) -> Prompt {
        let text = self.ack.clone().unwrap_or_else(|| {
            format!("Added. Send another one or {} to finish.", self.terminator)
        });
        Prompt {
            text,
            terminator: Some(self.terminator.clone()),
        }
    }

    fn too_few_message(&self) -> String {
        self.min_count_message
            .clone()
            .unwrap_or_else(|| format!("Need at least {} items.", self.min_count))
    }
}

/// One prompt/validation unit of a flow
#[derive(Clone)]
pub enum Step {
    Single(SingleStep),
    Multi(MultiStep),
}

impl Step {
    pub fn field(&self) -> &str {
        match self {
            Step::Single(step) => &step.field,
            Step::Multi(step) => &step.field,
        }
    }

    pub fn prompt(&self) -> Prompt {
        match self {
            Step::Single(step) => Prompt {
                text: step.prompt.clone(),
                terminator: None,
            },
            Step::Multi(step) => Prompt {
                text: step.prompt.clone(),
                terminator: Some(step.terminator.clone()),
            },
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Single(step) => f
                .debug_struct("Single")
                .field("field", &step.field)
                .field("validated", &step.validator.is_some())
                .finish(),
            Step::Multi(step) => f
                .debug_struct("Multi")
                .field("field", &step.field)
                .field("terminator", &step.terminator)
                .field("min_count", &step.min_count)
                .field("validated", &step.item_validator.is_some())
                .finish(),
        }
    }
}

impl From<SingleStep> for Step {
    fn from(step: SingleStep) -> Self {
        Step::Single(step)
    }
}

impl From<MultiStep> for Step {
    fn from(step: MultiStep) -> Self {
        Step::Multi(step)
    }
}

/// A named, ordered, non-empty list of steps
#[derive(Debug, Clone)]
pub struct Flow {
    name: String,
    steps: Vec<Step>,
    validator_failed_message: String,
}

impl Flow {
    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder {
            name: name.into(),
            steps: Vec::new(),
            validator_failed_message: GENERIC_VALIDATION_MESSAGE.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn validator_failed_message(&self) -> &str {
        &self.validator_failed_message
    }
}

pub struct FlowBuilder {
    name: String,
    steps: Vec<Step>,
    validator_failed_message: String,
}

impl FlowBuilder {
    pub fn step(mut self, step: impl Into<Step>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Shown when a validator of this flow panics
    pub fn validator_failed_message(mut self, message: impl Into<String>) -> Self {
        self.validator_failed_message = message.into();
        self
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        if self.steps.is_empty() {
            return Err(FlowError::Empty(self.name));
        }
        let mut seen = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if seen.contains(&step.field()) {
                return Err(FlowError::DuplicateField(step.field().to_string()));
            }
            if let Step::Multi(multi) = step {
                if multi.terminator.trim().is_empty() {
                    return Err(FlowError::EmptyTerminator(multi.field.clone()));
                }
            }
            seen.push(step.field());
        }
        Ok(Flow {
            name: self.name,
            steps: self.steps,
            validator_failed_message: self.validator_failed_message,
        })
    }
}

/// Collected answers. Entries keep prompt order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    pub flow: String,
    pub fields: Vec<(String, String)>,
    pub multi_value_fields: Vec<(String, Vec<String>)>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.multi_value_fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }
}

/// Result of a successful `submit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Moved to the next step
    Prompt(Prompt),
    /// An item was appended to the current multi step
    Acknowledged { prompt: Prompt, collected: usize },
    /// Last step passed; the session is gone and this is its record
    Complete(Record),
}

/// Read-only view of a live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub step_index: usize,
    pub record: Record,
}

/// Live per-user conversation state
#[derive(Debug)]
pub struct Session {
    flow: Arc<Flow>,
    step_index: usize,
    fields: Vec<(String, String)>,
    multi_value_fields: Vec<(String, Vec<String>)>,
    last_activity: DateTime<Utc>,
}

impl Session {
    fn new(flow: Arc<Flow>) -> Self {
        Self {
            flow,
            step_index: 0,
            fields: Vec::new(),
            multi_value_fields: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    fn collected(&self, field: &str) -> usize {
        self.multi_value_fields
            .iter()
            .find(|(key, _)| key == field)
            .map_or(0, |(_, items)| items.len())
    }

    fn list_mut(&mut self, field: &str) -> &mut Vec<String> {
        let position = match self.multi_value_fields.iter().position(|(key, _)| key == field) {
            Some(position) => position,
            None => {
                self.multi_value_fields.push((field.to_string(), Vec::new()));
                self.multi_value_fields.len() - 1
            }
        };
        &mut self.multi_value_fields[position].1
    }

    fn record(&self) -> Record {
        Record {
            flow: self.flow.name.clone(),
            fields: self.fields.clone(),
            multi_value_fields: self.multi_value_fields.clone(),
        }
    }

    fn into_record(self) -> Record {
        Record {
            flow: self.flow.name.clone(),
            fields: self.fields,
            multi_value_fields: self.multi_value_fields,
        }
    }
}

/// Owns the session table. Share it behind an `Arc`.
pub struct ConversationCollector<K> {
    sessions: Mutex<HashMap<K, Session>>,
}

impl<K> Default for ConversationCollector<K> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> ConversationCollector<K>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<K, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start `flow` for `user`, replacing any live session, and return the first prompt
    pub fn start(&self, user: K, flow: Arc<Flow>) -> Prompt {
        let prompt = flow.steps[0].prompt();
        let flow_name = flow.name.clone();
        let replaced = self.sessions().insert(user.clone(), Session::new(flow));
        if let Some(previous) = replaced {
            info!(user_id = %user, previous_flow = %previous.flow.name, flow = %flow_name, "Replaced live session");
        } else {
            info!(user_id = %user, flow = %flow_name, "Session started");
        }
        prompt
    }

    /// Feed one message into the user's session
    ///
    /// # Returns
    ///
    /// - `Prompt` when another step remains
    /// - `Acknowledged` when a multi step accepted an item
    /// - `Complete` with the finished record; the session is removed
    ///
    /// # Errors
    ///
    /// - `NoActiveSession` when the user has no conversation in progress
    /// - `Validation` when the answer is rejected; the session does not move
    pub fn submit(&self, user: &K, text: &str) -> Result<SubmitOutcome, CollectorError> {
        let mut sessions = self.sessions();

        {
            let session = sessions
                .get_mut(user)
                .ok_or(CollectorError::NoActiveSession)?;
            session.last_activity = Utc::now();
            let flow = Arc::clone(&session.flow);

            match &flow.steps[session.step_index] {
                Step::Single(step) => {
                    if let Err(message) =
                        run_validator(step.validator.as_ref(), text, &flow.validator_failed_message)
                    {
                        debug!(user_id = %user, field = %step.field, "Answer rejected");
                        return Err(CollectorError::Validation {
                            message,
                            prompt: flow.steps[session.step_index].prompt(),
                        });
                    }
                    session.fields.push((step.field.clone(), text.to_string()));
                }
                Step::Multi(step) if step.is_terminator(text) => {
                    let collected = session.collected(&step.field);
                    if collected < step.min_count {
                        debug!(user_id = %user, field = %step.field, collected, "Terminator before minimum count");
                        return Err(CollectorError::Validation {
                            message: step.too_few_message(),
                            prompt: flow.steps[session.step_index].prompt(),
                        });
                    }
                    // A finished multi step always appears in the record, even when empty
                    session.list_mut(&step.field);
                }
                Step::Multi(step) => {
                    if let Err(message) =
                        run_validator(step.item_validator.as_ref(), text, &flow.validator_failed_message)
                    {
                        debug!(user_id = %user, field = %step.field, "Item rejected");
                        return Err(CollectorError::Validation {
                            message,
                            prompt: flow.steps[session.step_index].prompt(),
                        });
                    }
                    let items = session.list_mut(&step.field);
                    items.push(text.to_string());
                    return Ok(SubmitOutcome::Acknowledged {
                        prompt: step.ack_prompt(),
                        collected: items.len(),
                    });
                }
            }

            session.step_index += 1;
            if let Some(next) = flow.steps.get(session.step_index) {
                return Ok(SubmitOutcome::Prompt(next.prompt()));
            }
        }

        let session = sessions
            .remove(user)
            .ok_or(CollectorError::NoActiveSession)?;
        info!(user_id = %user, flow = %session.flow.name, "Session complete");
        let record = session.into_record();
        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string(&record) {
                Ok(json) => debug!(user_id = %user, record = %json, "Completed record"),
                Err(e) => warn!(user_id = %user, error = %e, "Failed to serialize completed record"),
            }
        }
        Ok(SubmitOutcome::Complete(record))
    }

    /// Drop the user's live session. Returns whether one existed.
    pub fn cancel(&self, user: &K) -> bool {
        let removed = self.sessions().remove(user).is_some();
        if removed {
            info!(user_id = %user, "Session cancelled");
        }
        removed
    }

    pub fn is_active(&self, user: &K) -> bool {
        self.sessions().contains_key(user)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    pub fn snapshot(&self, user: &K) -> Option<SessionSnapshot> {
        self.sessions().get(user).map(|session| SessionSnapshot {
            step_index: session.step_index,
            record: session.record(),
        })
    }

    /// Remove sessions idle for longer than `max_idle`
    pub fn expire_idle(&self, max_idle: Duration) -> usize {
        self.expire_idle_before(Utc::now() - max_idle)
    }

    /// Remove sessions whose last activity is older than `cutoff`
    pub fn expire_idle_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|user, session| {
            let keep = session.last_activity >= cutoff;
            if !keep {
                info!(user_id = %user, flow = %session.flow.name, "Idle session expired");
            }
            keep
        });
        before - sessions.len()
    }
}

fn run_validator(
    validator: Option<&Validator>,
    text: &str,
    fallback_message: &str,
) -> Result<(), String> {
    let Some(validator) = validator else {
        return Ok(());
    };
    match panic::catch_unwind(AssertUnwindSafe(|| validator(text))) {
        Ok(result) => result,
        Err(_) => {
            warn!("Validator panicked, treating answer as invalid");
            Err(fallback_message.to_string())
        }
    }
}
