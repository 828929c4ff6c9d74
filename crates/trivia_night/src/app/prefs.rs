use quiz::{QuizStorage, SCENE_KEY, THEME_KEY};
use tracing::warn;

use super::scene_host::{SceneHost, DEFAULT_SCENE_NAME, NO_SCENE_NAME};

pub(crate) const THEMES: [&str; 3] = ["campfire", "mono-dark", "forest"];

/// Clamps unknown theme names to the first known theme, persists the
/// result, and returns what was actually applied.
pub(crate) fn apply_theme(storage: &mut impl QuizStorage, requested: &str) -> String {
    let applied = if THEMES.contains(&requested) {
        requested
    } else {
        warn!(requested, fallback = THEMES[0], "unknown theme name");
        THEMES[0]
    };
    if let Err(error) = storage.set(THEME_KEY, applied) {
        warn!(%error, "failed to persist theme preference");
    }
    applied.to_string()
}

pub(crate) fn resolve_theme(storage: &impl QuizStorage) -> String {
    match storage.get(THEME_KEY) {
        Some(saved) if THEMES.contains(&saved.as_str()) => saved,
        Some(saved) => {
            warn!(%saved, "ignoring unknown persisted theme");
            THEMES[0].to_string()
        }
        None => THEMES[0].to_string(),
    }
}

pub(crate) fn save_scene(storage: &mut impl QuizStorage, name: &str) {
    if let Err(error) = storage.set(SCENE_KEY, name) {
        warn!(%error, "failed to persist scene preference");
    }
}

/// Saved `"none"` is respected; a saved name the host does not know falls
/// back to the default scene.
pub(crate) fn resolve_initial_scene(storage: &impl QuizStorage, host: &SceneHost) -> String {
    match storage.get(SCENE_KEY) {
        Some(saved) if saved == NO_SCENE_NAME => saved,
        Some(saved) if host.is_known(&saved) => saved,
        Some(saved) => {
            warn!(%saved, fallback = DEFAULT_SCENE_NAME, "ignoring unknown persisted scene");
            DEFAULT_SCENE_NAME.to_string()
        }
        None => DEFAULT_SCENE_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::scene_host::BackdropScene;
    use super::*;
    use quiz::MemoryStorage;

    fn host() -> SceneHost {
        let mut host = SceneHost::new("canvas");
        host.register("campfire", || Box::new(BackdropScene::new("campfire")));
        host.register("starry-night", || Box::new(BackdropScene::new("starry-night")));
        host
    }

    #[test]
    fn theme_round_trips_and_clamps_unknown_names() {
        let mut storage = MemoryStorage::new();
        assert_eq!(apply_theme(&mut storage, "mono-dark"), "mono-dark");
        assert_eq!(resolve_theme(&storage), "mono-dark");

        assert_eq!(apply_theme(&mut storage, "neon"), "campfire");
        assert_eq!(resolve_theme(&storage), "campfire");
    }

    #[test]
    fn unknown_persisted_theme_falls_back_without_erroring() {
        let storage = MemoryStorage::with_entry(THEME_KEY, "glitter");
        assert_eq!(resolve_theme(&storage), "campfire");
    }

    #[test]
    fn scene_preference_respects_none_and_rejects_unknown_names() {
        let host = host();
        let mut storage = MemoryStorage::new();
        assert_eq!(resolve_initial_scene(&storage, &host), "campfire");

        save_scene(&mut storage, "none");
        assert_eq!(resolve_initial_scene(&storage, &host), "none");

        save_scene(&mut storage, "starry-night");
        assert_eq!(resolve_initial_scene(&storage, &host), "starry-night");

        save_scene(&mut storage, "volcano");
        assert_eq!(resolve_initial_scene(&storage, &host), "campfire");
    }
}
