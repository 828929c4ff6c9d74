mod app;

use std::fs;
use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::info;

use app::bootstrap::{self, AppWiring};
use app::prefs;
use app::scene_host::SceneSwitchOutcome;
use app::session::{
    AwardOutcome, FinalSummary, GamePhase, GameSession, GameSettings, SkipOutcome, StartOutcome,
    StepOutcome, VoteOutcome, Winner,
};
use app::status::StatusLine;
use quiz::{import_question_files, normalize, QuestionKind, QuestionRecord, RoundFilter};

const VOTE_REVEAL_PAUSE: Duration = Duration::from_millis(500);
const LIST_PREVIEW_CHARS: usize = 60;

fn main() {
    let wiring = match bootstrap::build_app() {
        Ok(wiring) => wiring,
        Err(error) => {
            eprintln!("startup failed: {error}");
            std::process::exit(1);
        }
    };
    if let Err(error) = run(wiring) {
        eprintln!("shell error: {error}");
        std::process::exit(1);
    }
}

fn run(mut wiring: AppWiring) -> io::Result<()> {
    info!(root = %wiring.paths.root.display(), "app root resolved");

    let theme = prefs::resolve_theme(&wiring.prefs_storage);
    info!(%theme, "theme applied");

    let initial_scene = prefs::resolve_initial_scene(&wiring.prefs_storage, &wiring.scenes);
    wiring.scenes.switch_to(&initial_scene);

    wiring
        .bank
        .set_change_listener(Box::new(|count| info!(count, "question bank updated")));

    wiring.session.finish_loading();
    emit(&StatusLine::info(format!(
        "Loaded {} questions. Type help to begin.",
        wiring.bank.working().len()
    )));

    let stdin = io::stdin();
    print_prompt(&wiring.session)?;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            print_prompt(&wiring.session)?;
            continue;
        }
        match parse_command(&line) {
            Err(usage) => emit(&StatusLine::error(usage)),
            Ok(ShellCommand::Quit) => break,
            Ok(command) => dispatch(&mut wiring, command),
        }
        print_prompt(&wiring.session)?;
    }

    wiring.scenes.shutdown();
    Ok(())
}

fn print_prompt(session: &GameSession) -> io::Result<()> {
    print!("[{}] > ", session.phase());
    io::stdout().flush()
}

fn emit(status: &StatusLine) {
    if status.level.auto_clears() {
        println!("{status}");
    } else {
        eprintln!("{status}");
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ShellCommand {
    Help,
    Quit,
    Score,
    Questions,
    Start {
        teams: usize,
        question_count: usize,
        filter: RoundFilter,
        use_staged: bool,
    },
    Vote {
        choice: String,
    },
    Award {
        target: Option<usize>,
    },
    Next,
    Skip,
    Restart,
    List,
    Add {
        json: String,
    },
    Update {
        id: String,
        json: String,
    },
    Remove {
        id: String,
    },
    RemoveAll,
    Import {
        replace: bool,
        files: Vec<PathBuf>,
    },
    Export {
        path: Option<PathBuf>,
    },
    Reset,
    Scene {
        name: String,
    },
    SceneShow,
    Resize {
        width: u32,
        height: u32,
    },
    Theme {
        name: String,
    },
}

fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let trimmed = line.trim();
    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "help" => Ok(ShellCommand::Help),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        "score" => Ok(ShellCommand::Score),
        "questions" => Ok(ShellCommand::Questions),
        "start" => parse_start(rest),
        "vote" => {
            if rest.is_empty() {
                Err("usage: vote <choice text>".to_string())
            } else {
                Ok(ShellCommand::Vote {
                    choice: rest.to_string(),
                })
            }
        }
        "award" => parse_award(rest),
        "next" => Ok(ShellCommand::Next),
        "skip" => Ok(ShellCommand::Skip),
        "restart" => Ok(ShellCommand::Restart),
        "list" => Ok(ShellCommand::List),
        "add" => {
            if rest.is_empty() {
                Err("usage: add <question JSON object>".to_string())
            } else {
                Ok(ShellCommand::Add {
                    json: rest.to_string(),
                })
            }
        }
        "update" => match rest.split_once(char::is_whitespace) {
            Some((id, json)) if !json.trim().is_empty() => Ok(ShellCommand::Update {
                id: id.to_string(),
                json: json.trim().to_string(),
            }),
            _ => Err("usage: update <id> <question JSON object>".to_string()),
        },
        "remove" => {
            if rest.is_empty() {
                Err("usage: remove <id>".to_string())
            } else {
                Ok(ShellCommand::Remove {
                    id: rest.to_string(),
                })
            }
        }
        "removeall" => Ok(ShellCommand::RemoveAll),
        "import" => parse_import(rest),
        "export" => Ok(ShellCommand::Export {
            path: (!rest.is_empty()).then(|| PathBuf::from(rest)),
        }),
        "reset" => Ok(ShellCommand::Reset),
        "scene" => {
            if rest.is_empty() {
                Ok(ShellCommand::SceneShow)
            } else {
                Ok(ShellCommand::Scene {
                    name: rest.to_string(),
                })
            }
        }
        "resize" => parse_resize(rest),
        "theme" => {
            if rest.is_empty() {
                Err("usage: theme <name>".to_string())
            } else {
                Ok(ShellCommand::Theme {
                    name: rest.to_string(),
                })
            }
        }
        other => Err(format!("unknown command: {other} (try help)")),
    }
}

fn parse_start(rest: &str) -> Result<ShellCommand, String> {
    const USAGE: &str = "usage: start <teams> <questions> [filter] [--staged]";
    let mut use_staged = false;
    let mut positional: Vec<&str> = Vec::new();
    for token in rest.split_whitespace() {
        if token == "--staged" {
            use_staged = true;
        } else {
            positional.push(token);
        }
    }
    if positional.len() < 2 || positional.len() > 3 {
        return Err(USAGE.to_string());
    }
    let teams: usize = positional[0]
        .parse()
        .map_err(|_| format!("team count must be a number. {USAGE}"))?;
    let question_count: usize = positional[1]
        .parse()
        .map_err(|_| format!("question count must be a number. {USAGE}"))?;
    let filter = positional
        .get(2)
        .map(|token| RoundFilter::from_wire(token))
        .unwrap_or(RoundFilter::Mixed);
    Ok(ShellCommand::Start {
        teams,
        question_count,
        filter,
        use_staged,
    })
}

fn parse_award(rest: &str) -> Result<ShellCommand, String> {
    const USAGE: &str = "usage: award <team number|none>";
    if rest.eq_ignore_ascii_case("none") {
        return Ok(ShellCommand::Award { target: None });
    }
    let number: usize = rest.parse().map_err(|_| USAGE.to_string())?;
    if number == 0 {
        return Err(USAGE.to_string());
    }
    Ok(ShellCommand::Award {
        target: Some(number - 1),
    })
}

fn parse_resize(rest: &str) -> Result<ShellCommand, String> {
    const USAGE: &str = "usage: resize <width> <height>";
    let mut tokens = rest.split_whitespace();
    let (Some(width), Some(height), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(USAGE.to_string());
    };
    let width: u32 = width.parse().map_err(|_| USAGE.to_string())?;
    let height: u32 = height.parse().map_err(|_| USAGE.to_string())?;
    Ok(ShellCommand::Resize { width, height })
}

fn parse_import(rest: &str) -> Result<ShellCommand, String> {
    let mut replace = false;
    let mut files: Vec<PathBuf> = Vec::new();
    for token in rest.split_whitespace() {
        if token == "--replace" {
            replace = true;
        } else {
            files.push(PathBuf::from(token));
        }
    }
    if files.is_empty() {
        return Err("usage: import [--replace] <file.json> [more files...]".to_string());
    }
    Ok(ShellCommand::Import { replace, files })
}

fn dispatch(wiring: &mut AppWiring, command: ShellCommand) {
    match command {
        ShellCommand::Quit => {}
        ShellCommand::Help => print_help(),
        ShellCommand::Score => print_scores(&wiring.session),
        ShellCommand::Questions => {
            let staged = wiring.bank.staged_import().len();
            let mut text = format!("{} questions in the working set", wiring.bank.working().len());
            if staged > 0 {
                text.push_str(&format!(
                    ", {staged} staged for replacement (start with --staged)"
                ));
            }
            emit(&StatusLine::info(text));
        }
        ShellCommand::Start {
            teams,
            question_count,
            filter,
            use_staged,
        } => {
            let settings = GameSettings {
                team_names: vec![String::new(); teams],
                question_count,
                filter,
                use_staged_import: use_staged,
            };
            match wiring.session.start_game(&wiring.bank, &settings) {
                StartOutcome::Started => present_current(&wiring.session),
                StartOutcome::Rejected(error) => emit(&StatusLine::error(error.to_string())),
                StartOutcome::OutOfPhase => emit(&StatusLine::error(
                    "a game can only start from the setup screen",
                )),
            }
        }
        ShellCommand::Vote { choice } => match wiring.session.vote(&choice) {
            VoteOutcome::Accepted {
                correct,
                correct_text,
            } => {
                if correct {
                    emit(&StatusLine::success("Correct!"));
                } else {
                    emit(&StatusLine::info(format!(
                        "Wrong. The answer is: {correct_text}"
                    )));
                }
                if let Some(verse) = wiring
                    .session
                    .current_question()
                    .and_then(|question| question.verse.as_deref())
                {
                    println!("  ({verse})");
                }
                thread::sleep(VOTE_REVEAL_PAUSE);
                wiring.session.begin_scoring();
                print_award_options(&wiring.session);
            }
            VoteOutcome::OutOfPhase => emit(&StatusLine::error("no vote is open right now")),
        },
        ShellCommand::Award { target } => match wiring.session.award_point(target) {
            AwardOutcome::Awarded {
                team_index,
                new_score,
            } => {
                let name = wiring.session.teams()[team_index].name.clone();
                emit(&StatusLine::success(format!(
                    "Point to {name} (now {new_score}). Type next to continue."
                )));
            }
            AwardOutcome::NoPoints => {
                emit(&StatusLine::info("No points this time. Type next to continue."))
            }
            AwardOutcome::OutOfPhase => {
                emit(&StatusLine::error("points can only be awarded after the reveal"))
            }
        },
        ShellCommand::Next => match wiring.session.next_question() {
            StepOutcome::Presented => present_current(&wiring.session),
            StepOutcome::RoundOver => print_final_summary(&wiring.session.final_summary()),
            StepOutcome::OutOfPhase => {
                emit(&StatusLine::error("award the point first, then type next"))
            }
        },
        ShellCommand::Skip => match wiring.session.skip_question() {
            SkipOutcome::Replaced => {
                emit(&StatusLine::info("Question swapped for a fresh one."));
                present_current(&wiring.session);
            }
            SkipOutcome::NoReplacementAdvanced => {
                emit(&StatusLine::info("No replacements left, moving on."));
                present_current(&wiring.session);
            }
            SkipOutcome::NoReplacementRoundOver => {
                emit(&StatusLine::info("No replacements and no questions left."));
                print_final_summary(&wiring.session.final_summary());
            }
            SkipOutcome::OutOfPhase => {
                emit(&StatusLine::error("skipping is only possible before a vote"))
            }
        },
        ShellCommand::Restart => {
            if wiring.session.restart() {
                let scene = prefs::resolve_initial_scene(&wiring.prefs_storage, &wiring.scenes);
                wiring.scenes.switch_to(&scene);
                emit(&StatusLine::success("Back to setup. Adjust anything, then start."));
            } else {
                emit(&StatusLine::error("restart is only available after a game ends"));
            }
        }
        ShellCommand::List => print_question_list(&wiring.bank),
        ShellCommand::Add { json } => {
            if editing_locked(&wiring.session) {
                return;
            }
            match parse_question_payload(&json, None) {
                Ok(record) => {
                    wiring.bank.add(record);
                    emit(&StatusLine::success(format!(
                        "Question added ({} total).",
                        wiring.bank.working().len()
                    )));
                }
                Err(reason) => emit(&StatusLine::error(reason)),
            }
        }
        ShellCommand::Update { id, json } => {
            if editing_locked(&wiring.session) {
                return;
            }
            match parse_question_payload(&json, Some(&id)) {
                Ok(record) => match wiring.bank.update(&id, record) {
                    Ok(()) => emit(&StatusLine::success("Question updated.")),
                    Err(error) => emit(&StatusLine::error(error.to_string())),
                },
                Err(reason) => emit(&StatusLine::error(reason)),
            }
        }
        ShellCommand::Remove { id } => {
            if editing_locked(&wiring.session) {
                return;
            }
            match wiring.bank.remove(&id) {
                Ok(()) => emit(&StatusLine::success(format!(
                    "Question removed ({} left).",
                    wiring.bank.working().len()
                ))),
                Err(error) => emit(&StatusLine::error(error.to_string())),
            }
        }
        ShellCommand::RemoveAll => {
            if editing_locked(&wiring.session) {
                return;
            }
            let removed = wiring.bank.remove_all();
            emit(&StatusLine::success(format!("Removed all {removed} questions.")));
        }
        ShellCommand::Import { replace, files } => {
            if editing_locked(&wiring.session) {
                return;
            }
            handle_import(wiring, replace, &files);
        }
        ShellCommand::Export { path } => match wiring.bank.export() {
            Ok(payload) => {
                let count = wiring.bank.working().len();
                let target = path.unwrap_or_else(|| PathBuf::from(&payload.file_name));
                match fs::write(&target, payload.json) {
                    Ok(()) => emit(&StatusLine::success(format!(
                        "Exported {count} questions to {}.",
                        target.display()
                    ))),
                    Err(error) => emit(&StatusLine::error(format!("export failed: {error}"))),
                }
            }
            Err(error) => emit(&StatusLine::error(format!("export failed: {error}"))),
        },
        ShellCommand::Reset => {
            if editing_locked(&wiring.session) {
                return;
            }
            wiring.bank.reset();
            emit(&StatusLine::success(format!(
                "Questions reset to the default set ({}).",
                wiring.bank.working().len()
            )));
        }
        ShellCommand::Scene { name } => handle_scene_change(wiring, &name),
        ShellCommand::SceneShow => {
            let current = wiring.scenes.active_scene_name().unwrap_or("none");
            emit(&StatusLine::info(format!(
                "Current scene: {current}. Available: {}, none.",
                wiring.scenes.scene_names().join(", ")
            )));
        }
        ShellCommand::Resize { width, height } => {
            wiring.scenes.resize(width, height);
        }
        ShellCommand::Theme { name } => {
            let applied = prefs::apply_theme(&mut wiring.prefs_storage, &name);
            emit(&StatusLine::success(format!("Theme: {applied}.")));
        }
    }
}

fn editing_locked(session: &GameSession) -> bool {
    if session.phase() == GamePhase::Setup {
        false
    } else {
        emit(&StatusLine::error(
            "question editing is only available from the setup screen",
        ));
        true
    }
}

/// Scene changes apply immediately during setup; mid-game they only save
/// the preference for the next setup screen.
fn handle_scene_change(wiring: &mut AppWiring, name: &str) {
    if wiring.session.phase() == GamePhase::Setup {
        match wiring.scenes.switch_to(name) {
            SceneSwitchOutcome::Activated { name: applied } => {
                prefs::save_scene(&mut wiring.prefs_storage, &applied);
                emit(&StatusLine::success(format!("Scene: {applied}.")));
            }
            SceneSwitchOutcome::NoScene => {
                prefs::save_scene(&mut wiring.prefs_storage, "none");
                emit(&StatusLine::success("Scene disabled."));
            }
            SceneSwitchOutcome::FellBack { requested, reason } => emit(&StatusLine::error(
                format!("scene {requested} failed to load ({reason}); continuing without one"),
            )),
        }
    } else if wiring.scenes.is_known(name) {
        prefs::save_scene(&mut wiring.prefs_storage, name);
        emit(&StatusLine::info(format!(
            "Scene {name} saved; it will load at the next setup screen."
        )));
    } else {
        emit(&StatusLine::error(format!(
            "unknown scene: {name} (known: {}, none)",
            wiring.scenes.scene_names().join(", ")
        )));
    }
}

fn handle_import(wiring: &mut AppWiring, replace: bool, files: &[PathBuf]) {
    let outcome = import_question_files(files, &QuestionKind::Normal);
    let summary = outcome.summary;
    let mut text = if replace {
        let staged = outcome.records.len();
        wiring.bank.import_replace(outcome.records);
        format!(
            "Staged {staged} questions from {} file(s); they replace the current set when you start with --staged.",
            summary.files_imported
        )
    } else {
        let append = wiring.bank.import_append(outcome.records);
        format!(
            "Added {} new questions ({} total), ignored {} duplicate(s).",
            append.added,
            wiring.bank.working().len(),
            append.duplicates
        )
    };
    if summary.files_skipped > 0 {
        text.push_str(&format!(" Skipped {} non-JSON file(s).", summary.files_skipped));
    }
    if summary.files_failed > 0 {
        text.push_str(&format!(" {} file(s) failed.", summary.files_failed));
    }
    if summary.files_failed > 0 {
        emit(&StatusLine::error(text));
    } else {
        emit(&StatusLine::success(text));
    }
}

fn parse_question_payload(json: &str, keep_id: Option<&str>) -> Result<QuestionRecord, String> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|error| format!("invalid JSON: {error}"))?;
    let mut records = normalize(&[value], &QuestionKind::Normal);
    let mut record = records
        .pop()
        .ok_or_else(|| "not a usable question (needs question, choices, correct)".to_string())?;
    if let Some(id) = keep_id {
        record.id = id.to_string();
        for (ordinal, choice) in record.choices.iter_mut().enumerate() {
            choice.id = format!("{id}_c{ordinal}");
        }
    }
    Ok(record)
}

fn present_current(session: &GameSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    println!();
    println!(
        "Question {}/{}",
        session.questions_asked_count(),
        session.total_questions_to_ask()
    );
    println!("  {}", question.question);
    let mut texts: Vec<&str> = question
        .choices
        .iter()
        .map(|choice| choice.text.as_str())
        .collect();
    texts.shuffle(&mut rand::thread_rng());
    for text in texts {
        println!("   - {text}");
    }
    println!("Discuss, then: vote <choice>  (or skip)");
}

fn print_award_options(session: &GameSession) {
    println!("Who gets the point?");
    for (index, team) in session.teams().iter().enumerate() {
        println!("  award {}  ->  {} ({})", index + 1, team.name, team.score);
    }
    println!("  award none");
}

fn print_scores(session: &GameSession) {
    if session.teams().is_empty() {
        emit(&StatusLine::info("No teams yet."));
        return;
    }
    for team in session.teams() {
        println!("  {}: {}", team.name, team.score);
    }
}

fn print_final_summary(summary: &FinalSummary) {
    println!();
    println!("Final scores:");
    for team in &summary.scores {
        println!("  {}: {}", team.name, team.score);
    }
    let verdict = match &summary.winner {
        Winner::None => "No winner!".to_string(),
        Winner::Single(name) => format!("Winner: {name}!"),
        Winner::Tie(names) => format!("It's a tie between: {}!", names.join(", ")),
    };
    println!("{verdict}");
    println!("Type restart to play again.");
}

fn print_question_list(bank: &quiz::QuestionBank<quiz::FileStorage>) {
    if bank.working().is_empty() {
        emit(&StatusLine::info("No questions yet."));
        return;
    }
    for record in bank.working() {
        let mut preview = record.question.clone();
        if preview.chars().count() > LIST_PREVIEW_CHARS {
            preview = preview.chars().take(LIST_PREVIEW_CHARS - 3).collect::<String>() + "...";
        }
        println!("  {}  [{}]  {}", record.id, record.kind, preview);
    }
}

fn print_help() {
    println!("Game:");
    println!("  start <teams> <questions> [filter] [--staged]  begin a round");
    println!("      filter: mixed (default), normal, biblical, or any custom kind");
    println!("      --staged: play the staged import instead of the working set");
    println!("  vote <choice text>   lock in the group's answer");
    println!("  skip                 swap the current question for an unseen one");
    println!("  award <team#|none>   hand out the point after the reveal");
    println!("  next                 advance to the next question");
    println!("  score                show team scores");
    println!("  restart              back to setup once the game ends");
    println!("Question bank (setup screen only for edits):");
    println!("  questions            counts for working and staged sets");
    println!("  list                 all questions with ids");
    println!("  add <json>           add one question object");
    println!("  update <id> <json>   replace one question");
    println!("  remove <id>          delete one question");
    println!("  removeall            delete every question");
    println!("  import [--replace] <file.json>...   merge or stage question files");
    println!("  export [path]        write the working set as pretty JSON");
    println!("  reset                restore the default question set");
    println!("Shell:");
    println!("  scene [name|none]    show or swap the background scene");
    println!("  resize <w> <h>       forward a window resize to the scene");
    println!("  theme <name>         pick a color theme");
    println!("  help, quit");
}
