use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::bank::{QuestionKind, QuestionRecord};

pub const MIN_TEAMS: usize = 1;
pub const MAX_TEAMS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundFilter {
    Mixed,
    Kind(QuestionKind),
}

impl RoundFilter {
    pub fn from_wire(value: &str) -> Self {
        if value == "mixed" {
            Self::Mixed
        } else {
            Self::Kind(QuestionKind::from(value.to_string()))
        }
    }

    pub fn matches(&self, record: &QuestionRecord) -> bool {
        match self {
            Self::Mixed => true,
            Self::Kind(kind) => record.kind == *kind,
        }
    }
}

impl std::fmt::Display for RoundFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mixed => f.write_str("mixed"),
            Self::Kind(kind) => f.write_str(kind.as_wire()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("no questions available for the selected filter")]
    EmptyFilteredPool,
    #[error("requested question count {requested} is invalid (available: {available})")]
    InvalidQuestionCount { requested: usize, available: usize },
    #[error("team count {teams} is out of range (1..=10)")]
    InvalidTeamCount { teams: usize },
}

#[derive(Debug, Clone)]
pub struct RoundPlan {
    /// Shuffled display order, already truncated to the requested count.
    pub questions: Vec<QuestionRecord>,
    /// The full filtered pool the round drew from; skip replacements come
    /// out of this.
    pub source_pool: Vec<QuestionRecord>,
}

/// Draws one round from `pool` without mutating it. All validation
/// happens before anything is cloned into the plan, so a failed build
/// leaves no trace.
pub fn build_round(
    pool: &[QuestionRecord],
    filter: &RoundFilter,
    requested_count: usize,
    team_count: usize,
    rng: &mut impl Rng,
) -> Result<RoundPlan, RoundError> {
    let source_pool: Vec<QuestionRecord> = pool
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect();

    if source_pool.is_empty() {
        return Err(RoundError::EmptyFilteredPool);
    }
    if !(MIN_TEAMS..=MAX_TEAMS).contains(&team_count) {
        return Err(RoundError::InvalidTeamCount { teams: team_count });
    }
    if requested_count == 0 || requested_count > source_pool.len() {
        return Err(RoundError::InvalidQuestionCount {
            requested: requested_count,
            available: source_pool.len(),
        });
    }

    let mut questions = source_pool.clone();
    questions.shuffle(rng);
    questions.truncate(requested_count);

    Ok(RoundPlan {
        questions,
        source_pool,
    })
}
