use quiz::{
    load_question_file, resolve_app_paths, AppPaths, FileStorage, QuestionBank, QuestionKind,
    QuestionRecord, StartupError,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::scene_host::{BackdropScene, SceneHost};
use super::session::GameSession;

pub(crate) const NORMAL_QUESTION_FILE: &str = "trivia-normal.json";
pub(crate) const BIBLICAL_QUESTION_FILE: &str = "trivia-biblical.json";
const MOUNT_TARGET: &str = "main-window";

pub(crate) struct AppWiring {
    pub(crate) paths: AppPaths,
    pub(crate) bank: QuestionBank<FileStorage>,
    pub(crate) prefs_storage: FileStorage,
    pub(crate) scenes: SceneHost,
    pub(crate) session: GameSession,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Trivia Night Startup ===");

    let paths = resolve_app_paths()?;
    let fetched = load_default_question_sets(&paths);
    let bank = QuestionBank::load(FileStorage::new(paths.state_dir.clone()), fetched);
    let prefs_storage = FileStorage::new(paths.state_dir.clone());

    Ok(AppWiring {
        paths,
        bank,
        prefs_storage,
        scenes: build_scene_host(),
        session: GameSession::new(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// The two shipped question files are fetched independently; either may
/// be missing or broken without taking the other down. An entirely empty
/// result is handled downstream by the bank's built-in fallback set.
pub(crate) fn load_default_question_sets(paths: &AppPaths) -> Vec<QuestionRecord> {
    let normal = load_question_file(
        &paths.questions_dir.join(NORMAL_QUESTION_FILE),
        &QuestionKind::Normal,
    );
    let biblical = load_question_file(
        &paths.questions_dir.join(BIBLICAL_QUESTION_FILE),
        &QuestionKind::Biblical,
    );
    info!(
        normal = normal.len(),
        biblical = biblical.len(),
        "default question sets loaded"
    );
    let mut fetched = biblical;
    fetched.extend(normal);
    fetched
}

fn build_scene_host() -> SceneHost {
    let mut host = SceneHost::new(MOUNT_TARGET);
    for label in [
        "campfire",
        "starry-night",
        "forest",
        "abstract",
        "desert",
        "wilderness",
    ] {
        host.register(label, move || Box::new(BackdropScene::new(label)));
    }
    host
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_paths(dir: &std::path::Path) -> AppPaths {
        AppPaths {
            root: dir.to_path_buf(),
            questions_dir: dir.join("questions"),
            state_dir: dir.join("state"),
        }
    }

    #[test]
    fn default_set_loading_survives_a_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = temp_paths(dir.path());
        fs::create_dir_all(&paths.questions_dir).expect("mkdir");
        fs::write(
            paths.questions_dir.join(BIBLICAL_QUESTION_FILE),
            r#"[{"question": "Q", "choices": ["a"], "correct": "a", "verse": "John 1:1"}]"#,
        )
        .expect("write");

        let fetched = load_default_question_sets(&paths);
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].kind, QuestionKind::Biblical);
    }

    #[test]
    fn both_files_missing_yields_an_empty_fetch() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_default_question_sets(&temp_paths(dir.path())).is_empty());
    }

    #[test]
    fn built_in_scene_registry_covers_the_default_scene() {
        let host = build_scene_host();
        assert!(host.is_known(super::super::scene_host::DEFAULT_SCENE_NAME));
        assert!(host.is_known("none"));
        assert!(!host.is_known("volcano"));
    }
}
