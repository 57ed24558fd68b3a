/// The director: activates one scene at a time, arbitrates the visitor's
/// choice, confirms it, and moves on to whatever the scene routed to.
///
/// Everything a task may touch lives in `FlowState`; the director itself
/// only owns the scheduler that drives those tasks and the idle watchdog
/// that can unwind all of it.
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;

use crate::core::ambience::AmbienceBus;
use crate::core::choice::ChoiceArbiter;
use crate::core::config::{ConfigError, DirectorConfig};
use crate::core::confirm::{ConfirmState, ConfirmTimer};
use crate::core::ledger::{InMemoryLedger, OutcomeLedger};
use crate::core::scheduler::{Scheduler, Spawner, TaskKind, TaskMeta};
use crate::core::stage::{Stage, VisualEffect};
use crate::core::tasks::{RoutineTask, TransitionTask};
use crate::core::watchdog::IdleWatchdog;
use crate::schema::cue::{Cue, Sound};
use crate::schema::input::{FrameInput, HoverEdge};
use crate::schema::line::{CatalogError, LanguageTag, LineCatalog};
use crate::schema::scene::{
    AmbienceRoute, ChoiceSide, RoutingTable, SceneDestination, SceneId, StoryError, StoryGraph,
};

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("story error: {0}")]
    Story(#[from] StoryError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("no story was provided")]
    MissingStory,
    #[error("director has not been started")]
    NotStarted,
}

/// Per-activation state. Created on entry, dropped on teardown.
#[derive(Debug, Clone)]
pub struct Activation {
    pub id: u64,
    pub scene: SceneId,
    pub routing: Option<RoutingTable>,
    /// Index of the left line of the armed choice pair.
    pub choice_base: usize,
    pub input_enabled: bool,
    /// Set once a confirm has started the transition out.
    pub ending: bool,
    pub confirm: ConfirmTimer,
}

impl Activation {
    fn new(id: u64, scene: SceneId, hold_seconds: f32) -> Self {
        Self {
            id,
            scene,
            routing: None,
            choice_base: 0,
            input_enabled: false,
            ending: false,
            confirm: ConfirmTimer::new(hold_seconds),
        }
    }
}

/// The world every scheduled task runs against.
pub struct FlowState {
    pub(crate) stage: Stage,
    pub(crate) bus: AmbienceBus,
    pub(crate) arbiter: ChoiceArbiter,
    pub(crate) activation: Option<Activation>,
    next_activation: u64,
    pub(crate) language: LanguageTag,
    pub(crate) random_pick: Option<u8>,
    pub(crate) story: StoryGraph,
    pub(crate) dialogue: LineCatalog,
    pub(crate) choices: LineCatalog,
    pub(crate) config: DirectorConfig,
    pub(crate) rng: StdRng,
    pub(crate) ledger: Box<dyn OutcomeLedger>,
}

impl FlowState {
    /// Whether `activation` is the one currently on stage.
    pub fn is_current(&self, activation: u64) -> bool {
        self.activation.as_ref().map(|a| a.id) == Some(activation)
    }

    pub fn current_scene(&self) -> Option<&SceneId> {
        self.activation.as_ref().map(|a| &a.scene)
    }

    pub(crate) fn set_routing(&mut self, routing: RoutingTable) {
        if let Some(act) = self.activation.as_mut() {
            act.routing = Some(routing);
        }
    }

    /// Arm choice input on choice lines `2 * pair` and `2 * pair + 1`.
    pub(crate) fn enable_choice(&mut self, pair: usize) {
        let Some(act) = self.activation.as_mut() else {
            return;
        };
        if act.routing.is_none() {
            tracing::warn!(scene = %act.scene, "choice armed before any routing was set");
        }
        act.choice_base = pair * 2;
        act.input_enabled = true;
        self.arbiter.rearm();
        self.arbitrate();
    }

    /// Re-resolve hover and gesture and apply the result to the preview,
    /// the ambience preview and the confirm timer.
    pub(crate) fn arbitrate(&mut self) {
        let enabled = self
            .activation
            .as_ref()
            .is_some_and(|a| a.input_enabled && !a.ending);
        let Some(resolution) = self.arbiter.resolve(enabled) else {
            return;
        };
        let Some(act) = self.activation.as_mut() else {
            return;
        };

        let Some(side) = resolution.side else {
            self.arbiter.close_preview();
            self.bus.stop_preview();
            act.confirm.set_active(None);
            return;
        };

        let index = act.choice_base + side.offset();
        let (text, font_size) = match self.choices.localized(index, &self.language) {
            Ok((text, font_size)) => (text.to_string(), font_size),
            Err(err) => {
                tracing::error!(scene = %act.scene, index, ?side, error = %err, "choice line lookup failed");
                act.confirm.set_active(None);
                return;
            }
        };
        if self.arbiter.open_preview(side, &text, font_size, resolution.ring) {
            self.stage
                .play(Sound::ChoiceOpen, self.config.audio.choice_open_volume, 1.0);
        }
        if let Some(routing) = act.routing.as_ref() {
            self.bus.preview(routing.get(side).ambience);
        }
        act.confirm
            .set_active(if resolution.ring { Some(side) } else { None });
    }

    /// Advance the hold timer and confirm when it fires.
    fn advance_confirm(&mut self, spawner: &mut Spawner<FlowState>, dt: f32) {
        let Some(act) = self.activation.as_mut() else {
            return;
        };
        let enabled = act.input_enabled && !act.ending;
        let Some(side) = act.confirm.advance(dt, enabled) else {
            return;
        };
        if act.routing.is_none() {
            tracing::warn!(scene = %act.scene, ?side, "hold completed with no routing armed");
            return;
        }
        self.stage
            .play(Sound::ChoiceConfirm, self.config.audio.confirm_volume, 1.0);
        self.confirm_choice(spawner, side);
    }

    /// Take `side` of the routing table: settle the ambience and start the
    /// transition out. A no-op once ending or when nothing was routed.
    pub(crate) fn confirm_choice(&mut self, spawner: &mut Spawner<FlowState>, side: ChoiceSide) -> bool {
        let Some(act) = self.activation.as_mut() else {
            return false;
        };
        if act.ending {
            tracing::debug!(scene = %act.scene, ?side, "already ending, confirm ignored");
            return false;
        }
        let Some(routing) = act.routing.as_ref() else {
            tracing::debug!(scene = %act.scene, ?side, "nothing routed, confirm ignored");
            return false;
        };
        let destination = routing.get(side).clone();
        act.ending = true;
        act.confirm.latch();
        tracing::info!(scene = %act.scene, ?side, next = %destination.next, "choice confirmed");

        match destination.ambience {
            AmbienceRoute::Silence => self.bus.release(),
            route if destination.commit_ambience => self.bus.commit(route),
            AmbienceRoute::Channel(_) => self.bus.stop_preview(),
        }
        self.stage
            .play(Sound::Transition, self.config.audio.transition_volume, 1.0);
        spawner.spawn(
            TaskMeta::system(TaskKind::Transition),
            TransitionTask::new(act.id, destination),
        );
        true
    }

    /// Drop the current activation and everything it started.
    pub(crate) fn teardown(&mut self, spawner: &mut Spawner<FlowState>, destination: &SceneDestination) {
        let Some(act) = self.activation.take() else {
            return;
        };
        let cancelled = spawner.cancel_where(|m| m.owner == Some(act.id));
        tracing::debug!(scene = %act.scene, cancelled, "scene torn down");

        self.arbiter.hide_now();
        let textbox = self.stage.textbox_mut();
        textbox.visible = false;
        textbox.text.clear();

        if let Some(language) = &destination.language {
            tracing::info!(language = %language, "display language changed");
            self.language = language.clone();
        }
    }

    /// Make `scene` the live scene and start its routine.
    pub(crate) fn activate(&mut self, spawner: &mut Spawner<FlowState>, scene: &SceneId) -> Result<(), StoryError> {
        let node = self.story.node(scene)?.clone();

        if let Some(previous) = self.stage.active_root().cloned() {
            self.stage.hide_root(&previous);
        }
        if let Some(root) = &node.root {
            self.stage.show_root(root);
        }

        let id = self.next_activation;
        self.next_activation += 1;
        self.activation = Some(Activation::new(id, scene.clone(), self.config.choice.hold_seconds));
        self.bus.reset_commit();
        self.arbiter.rearm();
        self.stage.emit(Cue::SceneEntered(scene.clone()));
        tracing::info!(scene = %scene, activation = id, "scene activated");

        spawner.spawn(
            TaskMeta::owned(TaskKind::Routine, id),
            RoutineTask::new(id, scene.clone(), node.steps),
        );
        self.stage.update_effect();
        Ok(())
    }

    /// Instant unwind of every shared surface. Tasks are cancelled by the
    /// caller before this runs.
    fn clear_for_reset(&mut self) {
        self.bus.silence_now();
        self.arbiter.hide_now();
        *self.stage.textbox_mut() = Default::default();
        self.stage.set_cover_alpha(1.0);
        self.language = self.config.default_language.clone();
        self.random_pick = None;
        self.activation = None;
        self.stage.emit(Cue::HardReset);
    }
}

/// The scene graph interpreter. Built via `Director::builder()`.
pub struct Director {
    scheduler: Scheduler<FlowState>,
    state: FlowState,
    watchdog: IdleWatchdog,
    started: bool,
}

impl Director {
    pub fn builder() -> DirectorBuilder {
        DirectorBuilder {
            story_dir: None,
            story: None,
            dialogue: None,
            choices: None,
            config: None,
            ledger: None,
            stage: None,
            effect: None,
            seed: None,
        }
    }

    /// Activate the entry scene. Calling it again does nothing.
    pub fn start(&mut self) -> Result<(), DirectorError> {
        if self.started {
            return Ok(());
        }
        let entry = self.state.story.entry.clone();
        self.state.activate(self.scheduler.spawner(), &entry)?;
        self.started = true;
        self.scheduler.flush(&mut self.state);
        self.state.stage.update_effect();
        Ok(())
    }

    /// Run one frame: apply this tick's input, let the watchdog and the
    /// confirm timer act, then advance every task by `dt`.
    pub fn tick(&mut self, dt: f32, input: &FrameInput) -> Result<(), DirectorError> {
        if !self.started {
            return Err(DirectorError::NotStarted);
        }
        let dt = dt.max(0.0);
        if let Some(pick) = input.random_pick {
            self.state.random_pick = Some(pick);
        }
        for edge in &input.hover {
            self.state.arbiter.on_hover(*edge);
        }
        self.state.arbiter.on_gesture(input.gesture.preview_side());
        self.state.arbitrate();

        let at_title = self.state.current_scene() == Some(&self.state.story.title);
        if self.watchdog.observe(dt, at_title, input.user_present) {
            self.hard_reset();
            return Ok(());
        }

        self.state.advance_confirm(self.scheduler.spawner(), dt);
        self.state.bus.update(dt);
        let progress = self
            .state
            .activation
            .as_ref()
            .map_or(0.0, |a| a.confirm.progress());
        self.state.arbiter.update(dt, progress);

        self.scheduler.run(&mut self.state, dt);
        self.state.stage.update_effect();
        Ok(())
    }

    /// Feed a hover edge outside of `tick`.
    pub fn on_hover(&mut self, edge: HoverEdge) {
        self.state.arbiter.on_hover(edge);
        self.state.arbitrate();
    }

    /// Feed the gesture preview side outside of `tick`.
    pub fn on_gesture_preview(&mut self, side: Option<ChoiceSide>) {
        self.state.arbiter.on_gesture(side);
        self.state.arbitrate();
    }

    /// Confirm `side` without a hold. Returns false if the scene has not
    /// routed anything or is already ending.
    pub fn confirm_choice(&mut self, side: ChoiceSide) -> bool {
        let confirmed = self.state.confirm_choice(self.scheduler.spawner(), side);
        if confirmed {
            self.scheduler.flush(&mut self.state);
        }
        confirmed
    }

    /// Cancel everything, silence the bus, cover the screen and go back to
    /// the title scene.
    pub fn hard_reset(&mut self) {
        tracing::warn!(scene = ?self.state.current_scene(), "hard reset to title");
        self.scheduler.cancel_all();
        self.watchdog.reset();
        self.state.clear_for_reset();
        let title = self.state.story.title.clone();
        if let Err(err) = self.state.activate(self.scheduler.spawner(), &title) {
            tracing::error!(scene = %title, error = %err, "title scene could not be activated");
        }
        self.started = true;
        self.scheduler.flush(&mut self.state);
        self.state.stage.update_effect();
    }

    pub fn current_scene(&self) -> Option<&SceneId> {
        self.state.current_scene()
    }

    pub fn activation(&self) -> Option<&Activation> {
        self.state.activation.as_ref()
    }

    pub fn confirm_state(&self) -> Option<ConfirmState> {
        self.state.activation.as_ref().map(|a| a.confirm.state())
    }

    pub fn input_enabled(&self) -> bool {
        self.state
            .activation
            .as_ref()
            .is_some_and(|a| a.input_enabled && !a.ending)
    }

    pub fn stage(&self) -> &Stage {
        &self.state.stage
    }

    pub fn ambience(&self) -> &AmbienceBus {
        &self.state.bus
    }

    pub fn arbiter(&self) -> &ChoiceArbiter {
        &self.state.arbiter
    }

    pub fn language(&self) -> &LanguageTag {
        &self.state.language
    }

    pub fn random_pick(&self) -> Option<u8> {
        self.state.random_pick
    }

    pub fn story(&self) -> &StoryGraph {
        &self.state.story
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.state.config
    }

    pub fn idle_seconds(&self) -> f32 {
        self.watchdog.idle_seconds()
    }

    /// Tasks still running, including décor loops.
    pub fn live_tasks(&self) -> usize {
        self.scheduler.live_count()
    }

    /// Take every cue produced since the last drain.
    pub fn drain_cues(&mut self) -> Vec<Cue> {
        self.state.stage.drain_cues()
    }
}

/// Builder for constructing a `Director`.
pub struct DirectorBuilder {
    story_dir: Option<String>,
    /// Directly provided story (for testing without files).
    story: Option<StoryGraph>,
    dialogue: Option<LineCatalog>,
    choices: Option<LineCatalog>,
    config: Option<DirectorConfig>,
    ledger: Option<Box<dyn OutcomeLedger>>,
    stage: Option<Stage>,
    effect: Option<Box<dyn VisualEffect>>,
    seed: Option<u64>,
}

impl DirectorBuilder {
    /// Load `story.ron`, `dialogue.ron`, `choices.ron` and, if present,
    /// `config.ron` from a directory. Directly provided parts win.
    pub fn story_dir(mut self, path: &str) -> Self {
        self.story_dir = Some(path.to_string());
        self
    }

    pub fn with_story(mut self, story: StoryGraph) -> Self {
        self.story = Some(story);
        self
    }

    pub fn with_dialogue(mut self, dialogue: LineCatalog) -> Self {
        self.dialogue = Some(dialogue);
        self
    }

    pub fn with_choices(mut self, choices: LineCatalog) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn with_config(mut self, config: DirectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_ledger(mut self, ledger: Box<dyn OutcomeLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Use a pre-wired stage instead of one wired from the story.
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_effect(mut self, effect: Box<dyn VisualEffect>) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Override the config's RNG seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Director, DirectorError> {
        let mut story = self.story;
        let mut dialogue = self.dialogue;
        let mut choices = self.choices;
        let mut config = self.config;

        if let Some(ref dir) = self.story_dir {
            let dir = Path::new(dir);
            if story.is_none() {
                story = Some(StoryGraph::load_from_ron(&dir.join("story.ron"))?);
            }
            if dialogue.is_none() {
                dialogue = Some(LineCatalog::load_from_ron(&dir.join("dialogue.ron"))?);
            }
            if choices.is_none() {
                choices = Some(LineCatalog::load_from_ron(&dir.join("choices.ron"))?);
            }
            let config_path = dir.join("config.ron");
            if config.is_none() && config_path.exists() {
                config = Some(DirectorConfig::load_from_ron(&config_path)?);
            }
        }

        let story = story.ok_or(DirectorError::MissingStory)?;
        let dialogue = dialogue.unwrap_or_default();
        let choices = choices.unwrap_or_default();
        let mut config = config.unwrap_or_default();
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate()?;
        story.validate()?;
        for issue in story.lint(&dialogue, &choices, config.ambience.channels) {
            tracing::warn!(%issue, "story lint");
        }

        let mut stage = self.stage.unwrap_or_else(|| Stage::wired_for(&story));
        let title_root = story.node(&story.title)?.root.clone();
        stage.set_title_root(title_root);
        if let Some(effect) = self.effect {
            stage.set_effect(effect);
        }

        let ledger = self
            .ledger
            .unwrap_or_else(|| Box::new(InMemoryLedger::default()));

        let state = FlowState {
            stage,
            bus: AmbienceBus::new(config.ambience.clone()),
            arbiter: ChoiceArbiter::new(config.choice.clone()),
            activation: None,
            next_activation: 1,
            language: config.default_language.clone(),
            random_pick: None,
            rng: StdRng::seed_from_u64(config.seed),
            story,
            dialogue,
            choices,
            ledger,
            config,
        };
        let watchdog = IdleWatchdog::new(state.config.watchdog.idle_timeout_seconds);

        Ok(Director {
            scheduler: Scheduler::new(),
            state,
            watchdog,
            started: false,
        })
    }
}
