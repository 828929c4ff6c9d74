use rand::Rng;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use super::record::{Choice, QuestionKind, QuestionRecord, RawChoice, RawQuestion};

/// Canonicalizes raw question payloads. Items missing a question text, a
/// non-empty choice list, or a declared correct answer are dropped; the
/// rest are repaired into records that satisfy the `QuestionRecord`
/// invariants. Pure aside from warning output and fresh-id randomness.
pub fn normalize(raw_items: &[Value], default_kind: &QuestionKind) -> Vec<QuestionRecord> {
    raw_items
        .iter()
        .enumerate()
        .filter_map(|(ordinal, item)| normalize_one(item, ordinal, default_kind))
        .collect()
}

fn normalize_one(item: &Value, ordinal: usize, default_kind: &QuestionKind) -> Option<QuestionRecord> {
    let raw: RawQuestion = match serde_json::from_value(item.clone()) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(ordinal, %error, "dropping unreadable question entry");
            return None;
        }
    };

    let question = match raw.question.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            warn!(ordinal, "dropping question entry without question text");
            return None;
        }
    };
    let declared_correct = match raw.correct.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            warn!(ordinal, "dropping question entry without a correct answer");
            return None;
        }
    };
    if raw.choices.is_empty() {
        warn!(ordinal, "dropping question entry without choices");
        return None;
    }

    let question_id = match raw.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => fresh_question_id(ordinal),
    };

    let choices = collect_choices(&raw.choices, &question_id);
    if choices.is_empty() {
        warn!(
            ordinal,
            %question_id, "dropping question entry with no valid choices"
        );
        return None;
    }

    let correct = if choices.iter().any(|choice| choice.text == declared_correct) {
        declared_correct
    } else {
        // Repair policy: a declared answer that did not survive choice
        // filtering falls back to the first valid choice.
        let fallback = choices[0].text.clone();
        warn!(
            %question_id,
            declared = %declared_correct,
            %fallback, "declared correct answer not among valid choices, repairing"
        );
        fallback
    };

    let verse = raw
        .verse
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    let kind = match raw.kind {
        Some(name) => QuestionKind::from(name),
        None if verse.is_some() => QuestionKind::Biblical,
        None => default_kind.clone(),
    };

    Some(QuestionRecord {
        id: question_id,
        question,
        choices,
        correct,
        verse,
        kind,
    })
}

fn collect_choices(raw_choices: &[RawChoice], question_id: &str) -> Vec<Choice> {
    raw_choices
        .iter()
        .enumerate()
        .filter_map(|(ordinal, raw)| {
            let (text, id) = match raw {
                RawChoice::Text(text) => (text.as_str(), None),
                RawChoice::Entry { text: Some(text), id } => (text.as_str(), id.as_deref()),
                RawChoice::Entry { text: None, .. } | RawChoice::Malformed(_) => {
                    warn!(question_id, ordinal, "dropping malformed choice entry");
                    return None;
                }
            };
            let trimmed = text.trim();
            if trimmed.is_empty() {
                warn!(question_id, ordinal, "dropping empty choice entry");
                return None;
            }
            let id = id
                .map(str::to_string)
                .unwrap_or_else(|| format!("{question_id}_c{ordinal}"));
            Some(Choice {
                text: trimmed.to_string(),
                id,
            })
        })
        .collect()
}

fn fresh_question_id(ordinal: usize) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let suffix: u64 = rand::thread_rng().gen();
    format!("q_{millis}_{suffix:016x}_{ordinal}")
}
