use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod bank;
pub mod round;

pub use bank::{
    import_question_files, load_question_file, normalize, AppendOutcome, BankError,
    ChangeListener, Choice, ExportPayload, FileStorage, ImportOutcome, ImportSummary,
    MemoryStorage, QuestionBank, QuestionKind, QuestionRecord, QuizStorage, StorageError,
    QUESTIONS_KEY, SCENE_KEY, THEME_KEY,
};
pub use round::{build_round, RoundError, RoundFilter, RoundPlan, MAX_TEAMS, MIN_TEAMS};

pub const ROOT_ENV_VAR: &str = "TRIVIA_NIGHT_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub questions_dir: PathBuf,
    pub state_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create state directory at {path}: {source}")]
    CreateStateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "TRIVIA_NIGHT_ROOT is set but does not point to a valid app root: {path}\n\
A valid root must contain a questions/ directory."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect the app root by walking upward from the executable directory: {start_dir}\n\
Expected a directory containing questions/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/trivia-night\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let questions_dir = root.join("questions");
    let state_dir = root.join("state");

    fs::create_dir_all(&state_dir).map_err(|source| StartupError::CreateStateDir {
        path: state_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        questions_dir,
        state_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_app_root(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_app_root(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_app_root(path: &Path) -> bool {
    path.join("questions").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
