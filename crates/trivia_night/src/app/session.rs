use std::collections::HashSet;
use std::fmt;

use quiz::{build_round, QuestionBank, QuestionRecord, QuizStorage, RoundError, RoundFilter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GamePhase {
    Loading,
    Setup,
    Presenting,
    Voted,
    Scoring,
    Scored,
    End,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Loading => "loading",
            Self::Setup => "setup",
            Self::Presenting => "presenting",
            Self::Voted => "voted",
            Self::Scoring => "scoring",
            Self::Scored => "scored",
            Self::End => "end",
        };
        f.write_str(token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Team {
    pub(crate) name: String,
    pub(crate) score: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct GameSettings {
    /// One entry per team; blank entries get a "Team N" default.
    pub(crate) team_names: Vec<String>,
    pub(crate) question_count: usize,
    pub(crate) filter: RoundFilter,
    pub(crate) use_staged_import: bool,
}

#[derive(Debug)]
struct RoundState {
    questions: Vec<QuestionRecord>,
    source_pool: Vec<QuestionRecord>,
    shown_ids: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StartOutcome {
    Started,
    Rejected(RoundError),
    OutOfPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VoteOutcome {
    Accepted { correct: bool, correct_text: String },
    OutOfPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AwardOutcome {
    Awarded { team_index: usize, new_score: u32 },
    NoPoints,
    OutOfPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Presented,
    RoundOver,
    OutOfPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipOutcome {
    Replaced,
    NoReplacementAdvanced,
    NoReplacementRoundOver,
    OutOfPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Winner {
    None,
    Single(String),
    Tie(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FinalSummary {
    pub(crate) scores: Vec<Team>,
    pub(crate) winner: Winner,
}

/// The whole game aggregate: phase, teams, and the active round. Every
/// mutation goes through a command function whose phase guard makes
/// out-of-turn calls explicit no-ops rather than errors.
pub(crate) struct GameSession {
    phase: GamePhase,
    teams: Vec<Team>,
    total_questions_to_ask: usize,
    questions_asked_count: usize,
    current_question: Option<QuestionRecord>,
    round: Option<RoundState>,
    rng: StdRng,
}

impl GameSession {
    pub(crate) fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub(crate) fn with_rng(rng: StdRng) -> Self {
        Self {
            phase: GamePhase::Loading,
            teams: Vec::new(),
            total_questions_to_ask: 0,
            questions_asked_count: 0,
            current_question: None,
            round: None,
            rng,
        }
    }

    pub(crate) fn phase(&self) -> GamePhase {
        self.phase
    }

    pub(crate) fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub(crate) fn current_question(&self) -> Option<&QuestionRecord> {
        self.current_question.as_ref()
    }

    pub(crate) fn questions_asked_count(&self) -> usize {
        self.questions_asked_count
    }

    pub(crate) fn total_questions_to_ask(&self) -> usize {
        self.total_questions_to_ask
    }

    pub(crate) fn finish_loading(&mut self) -> bool {
        if self.phase != GamePhase::Loading {
            return false;
        }
        self.set_phase(GamePhase::Setup);
        true
    }

    /// Builds a fresh round from the bank's selected pool. A failed build
    /// leaves phase, teams, and any previous round untouched.
    pub(crate) fn start_game<S: QuizStorage>(
        &mut self,
        bank: &QuestionBank<S>,
        settings: &GameSettings,
    ) -> StartOutcome {
        if self.phase != GamePhase::Setup {
            return StartOutcome::OutOfPhase;
        }

        let pool = bank.round_source(settings.use_staged_import);
        let plan = match build_round(
            pool,
            &settings.filter,
            settings.question_count,
            settings.team_names.len(),
            &mut self.rng,
        ) {
            Ok(plan) => plan,
            Err(error) => return StartOutcome::Rejected(error),
        };

        self.teams = settings
            .team_names
            .iter()
            .enumerate()
            .map(|(index, raw)| Team {
                name: default_team_name(raw, index),
                score: 0,
            })
            .collect();
        self.total_questions_to_ask = plan.questions.len();
        self.questions_asked_count = 0;
        self.current_question = None;
        self.round = Some(RoundState {
            questions: plan.questions,
            source_pool: plan.source_pool,
            shown_ids: HashSet::new(),
        });

        info!(
            teams = self.teams.len(),
            questions = self.total_questions_to_ask,
            filter = %settings.filter,
            staged = settings.use_staged_import,
            "game started"
        );
        self.present_next();
        StartOutcome::Started
    }

    /// Freezes the board for the current question. Outside `Presenting`
    /// (a double vote, a vote after a skip) this is a guarded no-op.
    pub(crate) fn vote(&mut self, choice_text: &str) -> VoteOutcome {
        if self.phase != GamePhase::Presenting {
            return VoteOutcome::OutOfPhase;
        }
        let Some(question) = self.current_question.as_ref() else {
            return VoteOutcome::OutOfPhase;
        };
        let correct_text = question.correct.clone();
        let correct = choice_text == correct_text;
        self.set_phase(GamePhase::Voted);
        VoteOutcome::Accepted {
            correct,
            correct_text,
        }
    }

    /// The shell owns the cosmetic reveal pause; this is the transition
    /// it fires afterwards.
    pub(crate) fn begin_scoring(&mut self) -> bool {
        if self.phase != GamePhase::Voted {
            return false;
        }
        self.set_phase(GamePhase::Scoring);
        true
    }

    pub(crate) fn award_point(&mut self, target: Option<usize>) -> AwardOutcome {
        if self.phase != GamePhase::Scoring {
            return AwardOutcome::OutOfPhase;
        }
        self.set_phase(GamePhase::Scored);
        match target {
            Some(index) if index < self.teams.len() => {
                self.teams[index].score += 1;
                AwardOutcome::Awarded {
                    team_index: index,
                    new_score: self.teams[index].score,
                }
            }
            Some(index) => {
                warn!(team_index = index, "award target out of range, no point awarded");
                AwardOutcome::NoPoints
            }
            None => AwardOutcome::NoPoints,
        }
    }

    pub(crate) fn next_question(&mut self) -> StepOutcome {
        if self.phase != GamePhase::Scored {
            return StepOutcome::OutOfPhase;
        }
        self.present_next()
    }

    /// Swaps the current slot for an unseen question from the round's
    /// source pool. The round length never changes; when the pool is
    /// exhausted the slot is simply lost and play advances.
    pub(crate) fn skip_question(&mut self) -> SkipOutcome {
        if self.phase != GamePhase::Presenting {
            return SkipOutcome::OutOfPhase;
        }
        let Some(current) = self.current_question.as_ref() else {
            return SkipOutcome::OutOfPhase;
        };
        let current_id = current.id.clone();
        let Some(round) = self.round.as_mut() else {
            return SkipOutcome::OutOfPhase;
        };

        round.shown_ids.insert(current_id.clone());
        // A replacement must not repeat anything already shown, and must
        // not steal a question still scheduled for an upcoming slot.
        let candidate_slots: Vec<usize> = {
            let upcoming: HashSet<&str> = round.questions[self.questions_asked_count..]
                .iter()
                .map(|record| record.id.as_str())
                .collect();
            round
                .source_pool
                .iter()
                .enumerate()
                .filter(|(_, record)| {
                    !round.shown_ids.contains(&record.id) && !upcoming.contains(record.id.as_str())
                })
                .map(|(slot, _)| slot)
                .collect()
        };

        if candidate_slots.is_empty() {
            info!(skipped = %current_id, "no replacement questions left, advancing");
            return match self.present_next() {
                StepOutcome::RoundOver => SkipOutcome::NoReplacementRoundOver,
                _ => SkipOutcome::NoReplacementAdvanced,
            };
        }

        let pick = candidate_slots[self.rng.gen_range(0..candidate_slots.len())];
        let replacement = round.source_pool[pick].clone();
        round.shown_ids.insert(replacement.id.clone());

        // Rewind so the same slot is presented again with the new
        // question; the skipped one can never come back this round.
        let slot = self.questions_asked_count.saturating_sub(1);
        round.questions[slot] = replacement.clone();
        self.questions_asked_count = slot;
        info!(skipped = %current_id, replacement = %replacement.id, "question skipped");
        self.present_next();
        SkipOutcome::Replaced
    }

    pub(crate) fn restart(&mut self) -> bool {
        if self.phase != GamePhase::End {
            return false;
        }
        self.current_question = None;
        self.round = None;
        self.set_phase(GamePhase::Setup);
        true
    }

    pub(crate) fn final_summary(&self) -> FinalSummary {
        let top_score = self.teams.iter().map(|team| team.score).max().unwrap_or(0);
        let leaders: Vec<String> = self
            .teams
            .iter()
            .filter(|team| team.score == top_score)
            .map(|team| team.name.clone())
            .collect();
        let winner = if leaders.is_empty() || top_score == 0 {
            Winner::None
        } else if leaders.len() == 1 {
            Winner::Single(leaders.into_iter().next().unwrap_or_default())
        } else {
            Winner::Tie(leaders)
        };
        FinalSummary {
            scores: self.teams.clone(),
            winner,
        }
    }

    fn present_next(&mut self) -> StepOutcome {
        if self.questions_asked_count >= self.total_questions_to_ask {
            self.set_phase(GamePhase::End);
            return StepOutcome::RoundOver;
        }
        let Some(round) = self.round.as_mut() else {
            self.set_phase(GamePhase::End);
            return StepOutcome::RoundOver;
        };
        let question = round.questions[self.questions_asked_count].clone();
        round.shown_ids.insert(question.id.clone());
        self.current_question = Some(question);
        self.questions_asked_count += 1;
        self.set_phase(GamePhase::Presenting);
        StepOutcome::Presented
    }

    fn set_phase(&mut self, next: GamePhase) {
        info!(from = %self.phase, to = %next, "game phase");
        self.phase = next;
    }

    #[cfg(test)]
    fn round_length(&self) -> Option<usize> {
        self.round.as_ref().map(|round| round.questions.len())
    }
}

fn default_team_name(raw: &str, index: usize) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Team {}", index + 1)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz::{Choice, MemoryStorage, QuestionKind};
    use std::collections::HashSet;

    fn record(id: &str, kind: QuestionKind) -> QuestionRecord {
        QuestionRecord {
            id: id.to_string(),
            question: format!("question {id}"),
            choices: vec![
                Choice {
                    text: "right".to_string(),
                    id: format!("{id}_c0"),
                },
                Choice {
                    text: "wrong".to_string(),
                    id: format!("{id}_c1"),
                },
            ],
            correct: "right".to_string(),
            verse: None,
            kind,
        }
    }

    fn bank_with(count: usize) -> QuestionBank<MemoryStorage> {
        let records = (0..count)
            .map(|index| record(&format!("q{index}"), QuestionKind::Normal))
            .collect();
        QuestionBank::load(MemoryStorage::new(), records)
    }

    fn settings(teams: usize, question_count: usize) -> GameSettings {
        GameSettings {
            team_names: vec![String::new(); teams],
            question_count,
            filter: RoundFilter::Mixed,
            use_staged_import: false,
        }
    }

    fn ready_session() -> GameSession {
        let mut session = GameSession::with_rng(StdRng::seed_from_u64(11));
        assert!(session.finish_loading());
        session
    }

    fn started(teams: usize, question_count: usize, pool: usize) -> GameSession {
        let bank = bank_with(pool);
        let mut session = ready_session();
        assert_eq!(
            session.start_game(&bank, &settings(teams, question_count)),
            StartOutcome::Started
        );
        session
    }

    fn answer_and_score(session: &mut GameSession, award: Option<usize>) {
        let outcome = session.vote("right");
        assert!(matches!(outcome, VoteOutcome::Accepted { correct: true, .. }));
        assert!(session.begin_scoring());
        assert_ne!(session.award_point(award), AwardOutcome::OutOfPhase);
    }

    #[test]
    fn finish_loading_moves_to_setup_exactly_once() {
        let mut session = GameSession::with_rng(StdRng::seed_from_u64(1));
        assert_eq!(session.phase(), GamePhase::Loading);
        assert!(session.finish_loading());
        assert!(!session.finish_loading());
        assert_eq!(session.phase(), GamePhase::Setup);
    }

    #[test]
    fn rejected_start_leaves_state_untouched() {
        let bank = bank_with(3);
        let mut session = ready_session();

        assert_eq!(
            session.start_game(&bank, &settings(2, 4)),
            StartOutcome::Rejected(RoundError::InvalidQuestionCount {
                requested: 4,
                available: 3
            })
        );
        assert_eq!(
            session.start_game(&bank, &settings(11, 2)),
            StartOutcome::Rejected(RoundError::InvalidTeamCount { teams: 11 })
        );
        assert_eq!(session.phase(), GamePhase::Setup);
        assert!(session.teams().is_empty());
        assert!(session.current_question().is_none());
    }

    #[test]
    fn start_is_refused_outside_setup() {
        let bank = bank_with(5);
        let mut session = GameSession::with_rng(StdRng::seed_from_u64(3));
        assert_eq!(
            session.start_game(&bank, &settings(2, 2)),
            StartOutcome::OutOfPhase
        );
    }

    #[test]
    fn blank_team_names_default_to_numbered_teams() {
        let bank = bank_with(4);
        let mut session = ready_session();
        let config = GameSettings {
            team_names: vec!["  The Owls  ".to_string(), String::new()],
            question_count: 2,
            filter: RoundFilter::Mixed,
            use_staged_import: false,
        };
        assert_eq!(session.start_game(&bank, &config), StartOutcome::Started);
        assert_eq!(session.teams()[0].name, "The Owls");
        assert_eq!(session.teams()[1].name, "Team 2");
    }

    #[test]
    fn full_round_scenario_ends_with_scores_summing_to_five() {
        let mut session = started(2, 5, 10);
        assert_eq!(session.total_questions_to_ask(), 5);

        for question_index in 0..5 {
            assert_eq!(session.phase(), GamePhase::Presenting);
            answer_and_score(&mut session, Some(question_index % 2));
            session.next_question();
        }

        assert_eq!(session.phase(), GamePhase::End);
        let summary = session.final_summary();
        let total: u32 = summary.scores.iter().map(|team| team.score).sum();
        assert_eq!(total, 5);
        assert_eq!(summary.winner, Winner::Single("Team 1".to_string()));
    }

    #[test]
    fn second_vote_on_the_same_question_is_a_no_op() {
        let mut session = started(2, 2, 4);
        assert!(matches!(session.vote("wrong"), VoteOutcome::Accepted { correct: false, .. }));
        assert_eq!(session.vote("right"), VoteOutcome::OutOfPhase);
        assert_eq!(session.phase(), GamePhase::Voted);
    }

    #[test]
    fn award_and_scoring_guards_hold_outside_their_phases() {
        let mut session = started(2, 2, 4);
        assert_eq!(session.award_point(Some(0)), AwardOutcome::OutOfPhase);
        assert!(!session.begin_scoring());
        assert_eq!(session.next_question(), StepOutcome::OutOfPhase);

        session.vote("right");
        assert!(session.begin_scoring());
        assert_eq!(
            session.award_point(Some(7)),
            AwardOutcome::NoPoints,
            "out-of-range team index awards nothing"
        );
        assert!(session.teams().iter().all(|team| team.score == 0));
    }

    #[test]
    fn skip_keeps_round_length_and_rewinds_the_slot_counter() {
        let mut session = started(1, 3, 8);
        let before = session.questions_asked_count();
        let first_id = session.current_question().expect("question").id.clone();

        assert_eq!(session.skip_question(), SkipOutcome::Replaced);
        assert_eq!(session.round_length(), Some(3));
        assert_eq!(session.questions_asked_count(), before);
        assert_eq!(session.total_questions_to_ask(), 3);
        assert_ne!(session.current_question().expect("question").id, first_id);
        assert_eq!(session.phase(), GamePhase::Presenting);
    }

    #[test]
    fn no_question_id_repeats_within_a_round() {
        let mut session = started(1, 3, 10);
        let mut presented: Vec<String> = Vec::new();

        // Skip through every available replacement, then play out what
        // is left; nothing presented may repeat.
        loop {
            let Some(current) = session.current_question() else {
                break;
            };
            presented.push(current.id.clone());
            match session.skip_question() {
                SkipOutcome::Replaced | SkipOutcome::NoReplacementAdvanced => {}
                SkipOutcome::NoReplacementRoundOver | SkipOutcome::OutOfPhase => break,
            }
        }

        let distinct: HashSet<&String> = presented.iter().collect();
        assert_eq!(distinct.len(), presented.len());
    }

    #[test]
    fn skip_on_last_question_with_exhausted_pool_ends_the_round() {
        // Pool exactly as large as the round: after presenting all three
        // there is nothing left to swap in.
        let mut session = started(1, 3, 3);
        answer_and_score(&mut session, Some(0));
        session.next_question();
        answer_and_score(&mut session, None);
        session.next_question();

        assert_eq!(session.questions_asked_count(), 3);
        assert_eq!(session.skip_question(), SkipOutcome::NoReplacementRoundOver);
        assert_eq!(session.phase(), GamePhase::End);
    }

    #[test]
    fn skip_mid_round_with_exhausted_pool_advances_to_the_next_slot() {
        let mut session = started(1, 2, 2);
        let first_id = session.current_question().expect("question").id.clone();

        assert_eq!(session.skip_question(), SkipOutcome::NoReplacementAdvanced);
        assert_eq!(session.phase(), GamePhase::Presenting);
        assert_ne!(session.current_question().expect("question").id, first_id);
        assert_eq!(session.questions_asked_count(), 2);
    }

    #[test]
    fn skip_is_refused_after_a_vote() {
        let mut session = started(1, 2, 6);
        session.vote("right");
        assert_eq!(session.skip_question(), SkipOutcome::OutOfPhase);
    }

    #[test]
    fn restart_only_leaves_the_end_phase() {
        let mut session = started(1, 1, 2);
        assert!(!session.restart());

        answer_and_score(&mut session, Some(0));
        session.next_question();
        assert_eq!(session.phase(), GamePhase::End);
        assert!(session.restart());
        assert_eq!(session.phase(), GamePhase::Setup);
        assert!(session.current_question().is_none());
    }

    #[test]
    fn winner_resolution_handles_ties_and_scoreless_games() {
        let mut session = started(2, 2, 4);
        answer_and_score(&mut session, None);
        session.next_question();
        answer_and_score(&mut session, None);
        session.next_question();
        assert_eq!(session.final_summary().winner, Winner::None);

        assert!(session.restart());
        let bank = bank_with(4);
        assert_eq!(
            session.start_game(&bank, &settings(2, 2)),
            StartOutcome::Started
        );
        answer_and_score(&mut session, Some(0));
        session.next_question();
        answer_and_score(&mut session, Some(1));
        session.next_question();
        assert_eq!(
            session.final_summary().winner,
            Winner::Tie(vec!["Team 1".to_string(), "Team 2".to_string()])
        );
    }

    #[test]
    fn staged_import_pool_feeds_the_round_when_requested() {
        let mut bank = bank_with(2);
        bank.import_replace(
            (0..6)
                .map(|index| record(&format!("staged{index}"), QuestionKind::Normal))
                .collect(),
        );
        let mut session = ready_session();
        let config = GameSettings {
            team_names: vec![String::new()],
            question_count: 5,
            filter: RoundFilter::Mixed,
            use_staged_import: true,
        };
        assert_eq!(session.start_game(&bank, &config), StartOutcome::Started);
        assert!(session
            .current_question()
            .expect("question")
            .id
            .starts_with("staged"));
    }
}
