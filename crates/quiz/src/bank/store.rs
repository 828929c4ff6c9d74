use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::normalize::normalize;
use super::record::{Choice, QuestionKind, QuestionRecord};
use super::storage::{QuizStorage, QUESTIONS_KEY};

/// Invoked with the new working-set size after every mutation so a list
/// view can refresh without polling.
pub type ChangeListener = Box<dyn FnMut(usize)>;

#[derive(Debug, Error)]
pub enum BankError {
    #[error("no question with id {id}")]
    QuestionNotFound { id: String },
    #[error("failed to serialize question set: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    pub added: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub file_name: String,
    pub json: String,
}

/// Owns the three question collections: the editable working set (the
/// only persisted one), the default set kept for reset, and an ephemeral
/// staged replacement pool from file import.
pub struct QuestionBank<S> {
    storage: S,
    working: Vec<QuestionRecord>,
    defaults: Vec<QuestionRecord>,
    staged_import: Vec<QuestionRecord>,
    on_changed: Option<ChangeListener>,
}

impl<S: QuizStorage> QuestionBank<S> {
    /// A persisted blob that parses and normalizes to at least one record
    /// wins over the fetched defaults; a malformed or empty blob is
    /// erased and treated as absent. The default set falls back to the
    /// built-in records when the fetch produced nothing, so reset always
    /// has a target.
    pub fn load(mut storage: S, fetched_defaults: Vec<QuestionRecord>) -> Self {
        let defaults = if fetched_defaults.is_empty() {
            warn!("no fetched default questions, using built-in fallback set");
            builtin_fallback_set()
        } else {
            fetched_defaults
        };

        let working = match storage.get(QUESTIONS_KEY) {
            None => defaults.clone(),
            Some(blob) => match parse_persisted_blob(&blob) {
                Some(records) if !records.is_empty() => {
                    info!(count = records.len(), "loaded persisted question set");
                    records
                }
                _ => {
                    warn!("persisted question set empty or malformed, reverting to defaults");
                    if let Err(error) = storage.remove(QUESTIONS_KEY) {
                        warn!(%error, "failed to erase bad persisted question set");
                    }
                    defaults.clone()
                }
            },
        };

        Self {
            storage,
            working,
            defaults,
            staged_import: Vec::new(),
            on_changed: None,
        }
    }

    pub fn set_change_listener(&mut self, listener: ChangeListener) {
        self.on_changed = Some(listener);
    }

    pub fn working(&self) -> &[QuestionRecord] {
        &self.working
    }

    pub fn defaults(&self) -> &[QuestionRecord] {
        &self.defaults
    }

    pub fn staged_import(&self) -> &[QuestionRecord] {
        &self.staged_import
    }

    pub fn find(&self, id: &str) -> Option<&QuestionRecord> {
        self.working.iter().find(|record| record.id == id)
    }

    /// Pool a round draws from: the staged replacement set when the
    /// caller asked for it and one exists, otherwise the working set.
    pub fn round_source(&self, use_staged: bool) -> &[QuestionRecord] {
        if use_staged && !self.staged_import.is_empty() {
            &self.staged_import
        } else {
            &self.working
        }
    }

    pub fn add(&mut self, record: QuestionRecord) {
        self.working.push(record);
        self.persist_working();
        self.notify_changed();
    }

    pub fn update(&mut self, id: &str, record: QuestionRecord) -> Result<(), BankError> {
        let slot = self
            .working
            .iter()
            .position(|existing| existing.id == id)
            .ok_or_else(|| BankError::QuestionNotFound { id: id.to_string() })?;
        self.working[slot] = record;
        self.persist_working();
        self.notify_changed();
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<(), BankError> {
        let slot = self
            .working
            .iter()
            .position(|existing| existing.id == id)
            .ok_or_else(|| BankError::QuestionNotFound { id: id.to_string() })?;
        self.working.remove(slot);
        self.persist_working();
        self.notify_changed();
        Ok(())
    }

    pub fn remove_all(&mut self) -> usize {
        let removed = self.working.len();
        self.working.clear();
        self.persist_working();
        self.notify_changed();
        removed
    }

    /// Stages a replacement pool; the working set and storage are
    /// untouched until a round actually starts with the staged pool.
    pub fn import_replace(&mut self, records: Vec<QuestionRecord>) {
        info!(count = records.len(), "staged replacement question pool");
        self.staged_import = records;
    }

    /// Merges keyed by id; an imported record whose id already exists is
    /// discarded and counted as a duplicate.
    pub fn import_append(&mut self, records: Vec<QuestionRecord>) -> AppendOutcome {
        let mut outcome = AppendOutcome::default();
        for record in records {
            if self.working.iter().any(|existing| existing.id == record.id) {
                warn!(id = %record.id, "duplicate question id, keeping existing record");
                outcome.duplicates += 1;
            } else {
                self.working.push(record);
                outcome.added += 1;
            }
        }
        self.staged_import.clear();
        self.persist_working();
        self.notify_changed();
        outcome
    }

    pub fn reset(&mut self) {
        info!(count = self.defaults.len(), "resetting question set to defaults");
        self.working = self.defaults.clone();
        self.staged_import.clear();
        if let Err(error) = self.storage.remove(QUESTIONS_KEY) {
            warn!(%error, "failed to erase persisted question set during reset");
        }
        self.notify_changed();
    }

    pub fn export(&self) -> Result<ExportPayload, BankError> {
        let json = serde_json::to_string_pretty(&self.working)?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
        Ok(ExportPayload {
            file_name: format!("trivia-questions-{timestamp}.json"),
            json,
        })
    }

    /// Whole-collection replacement write; failure is logged and the
    /// in-memory mutation stands.
    fn persist_working(&mut self) {
        match serde_json::to_string(&self.working) {
            Ok(blob) => {
                if let Err(error) = self.storage.set(QUESTIONS_KEY, &blob) {
                    warn!(%error, "failed to persist question set");
                }
            }
            Err(error) => warn!(%error, "failed to serialize question set for persistence"),
        }
    }

    fn notify_changed(&mut self) {
        let count = self.working.len();
        if let Some(listener) = self.on_changed.as_mut() {
            listener(count);
        }
    }
}

fn parse_persisted_blob(blob: &str) -> Option<Vec<QuestionRecord>> {
    match serde_json::from_str::<Vec<Value>>(blob) {
        Ok(items) => Some(normalize(&items, &QuestionKind::Normal)),
        Err(error) => {
            warn!(%error, "persisted question blob is not a JSON array");
            None
        }
    }
}

fn builtin_fallback_set() -> Vec<QuestionRecord> {
    vec![
        QuestionRecord {
            id: "builtin_q1".to_string(),
            question: "Which is the tallest mountain on Earth?".to_string(),
            choices: vec![
                Choice {
                    text: "Everest".to_string(),
                    id: "builtin_q1_c0".to_string(),
                },
                Choice {
                    text: "K2".to_string(),
                    id: "builtin_q1_c1".to_string(),
                },
            ],
            correct: "Everest".to_string(),
            verse: None,
            kind: QuestionKind::Normal,
        },
        QuestionRecord {
            id: "builtin_q2".to_string(),
            question: "A stranger sues you for your coat. What does Matthew 5:40 say to do?"
                .to_string(),
            choices: vec![
                Choice {
                    text: "Hand over your cloak as well".to_string(),
                    id: "builtin_q2_c0".to_string(),
                },
                Choice {
                    text: "Refuse".to_string(),
                    id: "builtin_q2_c1".to_string(),
                },
            ],
            correct: "Hand over your cloak as well".to_string(),
            verse: Some("Matthew 5:40".to_string()),
            kind: QuestionKind::Biblical,
        },
    ]
}
