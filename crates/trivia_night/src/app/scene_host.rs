use tracing::{error, info, warn};

pub(crate) const NO_SCENE_NAME: &str = "none";
pub(crate) const DEFAULT_SCENE_NAME: &str = "campfire";

/// Lifecycle contract for a decorative background scene. The host never
/// looks inside a module; it only drives init/teardown and forwards
/// resizes. Resize support is optional, with a no-op default.
pub(crate) trait SceneModule {
    fn init(&mut self, mount_target: &str) -> Result<(), String>;
    fn teardown(&mut self);
    fn on_resize(&mut self, _width: u32, _height: u32) {}
}

type SceneFactory = Box<dyn Fn() -> Box<dyn SceneModule>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SceneSwitchOutcome {
    Activated { name: String },
    NoScene,
    FellBack { requested: String, reason: String },
}

struct ActiveScene {
    name: String,
    module: Box<dyn SceneModule>,
}

/// Owns the single live scene context. Switching always tears the
/// previous module down before constructing the next; an init failure
/// degrades to the no-scene state instead of retrying.
pub(crate) struct SceneHost {
    mount_target: String,
    factories: Vec<(String, SceneFactory)>,
    active: Option<ActiveScene>,
}

impl SceneHost {
    pub(crate) fn new(mount_target: &str) -> Self {
        Self {
            mount_target: mount_target.to_string(),
            factories: Vec::new(),
            active: None,
        }
    }

    pub(crate) fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn SceneModule> + 'static,
    {
        self.factories.push((name.to_string(), Box::new(factory)));
    }

    pub(crate) fn scene_names(&self) -> Vec<&str> {
        self.factories.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub(crate) fn is_known(&self, name: &str) -> bool {
        name == NO_SCENE_NAME || self.factories.iter().any(|(known, _)| known == name)
    }

    pub(crate) fn active_scene_name(&self) -> Option<&str> {
        self.active.as_ref().map(|scene| scene.name.as_str())
    }

    pub(crate) fn switch_to(&mut self, requested: &str) -> SceneSwitchOutcome {
        self.teardown_active();

        if requested == NO_SCENE_NAME {
            info!("no background scene selected");
            return SceneSwitchOutcome::NoScene;
        }

        let name = if self.factories.iter().any(|(known, _)| known == requested) {
            requested
        } else {
            warn!(requested, fallback = DEFAULT_SCENE_NAME, "unknown scene name");
            DEFAULT_SCENE_NAME
        };
        let Some((_, factory)) = self.factories.iter().find(|(known, _)| known == name) else {
            error!(name, "default scene is not registered, running without a scene");
            return SceneSwitchOutcome::FellBack {
                requested: requested.to_string(),
                reason: "default scene not registered".to_string(),
            };
        };

        let mut module = factory();
        match module.init(&self.mount_target) {
            Ok(()) => {
                info!(scene = name, "scene initialized");
                self.active = Some(ActiveScene {
                    name: name.to_string(),
                    module,
                });
                SceneSwitchOutcome::Activated {
                    name: name.to_string(),
                }
            }
            Err(reason) => {
                error!(scene = name, reason = %reason, "scene init failed, running without a scene");
                SceneSwitchOutcome::FellBack {
                    requested: name.to_string(),
                    reason,
                }
            }
        }
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if let Some(scene) = self.active.as_mut() {
            scene.module.on_resize(width, height);
        }
    }

    pub(crate) fn shutdown(&mut self) {
        self.teardown_active();
    }

    fn teardown_active(&mut self) {
        if let Some(mut scene) = self.active.take() {
            info!(scene = %scene.name, "tearing down scene");
            scene.module.teardown();
        }
    }
}

/// Stand-in for the decorative renderers: the lifecycle is real, the
/// drawing is a log line.
pub(crate) struct BackdropScene {
    label: &'static str,
}

impl BackdropScene {
    pub(crate) fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl SceneModule for BackdropScene {
    fn init(&mut self, mount_target: &str) -> Result<(), String> {
        info!(backdrop = self.label, mount_target, "backdrop ready");
        Ok(())
    }

    fn teardown(&mut self) {
        info!(backdrop = self.label, "backdrop released");
    }
}
