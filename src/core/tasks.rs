/// Concrete tasks run by the director's scheduler.
///
/// Every task started on behalf of a scene carries that scene's activation
/// id and drops itself the moment another activation is current, so a
/// stale task never touches the shared stage.
use rand::Rng;
use std::f32::consts::TAU;

use crate::core::config::DirectorConfig;
use crate::core::director::FlowState;
use crate::core::scheduler::{Context, Poll, Task, TaskId, TaskKind, TaskMeta};
use crate::core::tween::{Ease, Tween, Vec3};
use crate::core::typewriter::Typewriter;
use crate::schema::cue::{Cue, Sound};
use crate::schema::scene::{
    ChoiceSide, DriftParams, PropId, RoutingTable, SceneDestination, SceneId, Step,
};

fn is_stale(world: &FlowState, activation: u64, task: &'static str) -> bool {
    if world.is_current(activation) {
        return false;
    }
    tracing::debug!(task, activation, "stale task dropped");
    true
}

// ---------------------------------------------------------------------------
// Scene routine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Suspension {
    Running,
    Seconds(f32),
    /// Every non-looping task this routine started has finished.
    Join,
    /// Choice input is armed; only teardown ends the routine now.
    Confirm,
}

enum Flow {
    Next,
    Suspend,
    Finish,
}

/// Interprets a scene node's steps in order, suspending on waits.
pub struct RoutineTask {
    activation: u64,
    scene: SceneId,
    steps: Vec<Step>,
    pc: usize,
    suspension: Suspension,
    children: Vec<TaskId>,
}

impl RoutineTask {
    pub fn new(activation: u64, scene: SceneId, steps: Vec<Step>) -> Self {
        Self {
            activation,
            scene,
            steps,
            pc: 0,
            suspension: Suspension::Running,
            children: Vec::new(),
        }
    }

    fn spawn_child<T>(&mut self, cx: &mut Context<'_, FlowState>, kind: TaskKind, task: T)
    where
        T: Task<FlowState> + 'static,
    {
        let id = cx.spawn(TaskMeta::owned(kind, self.activation), task);
        if kind != TaskKind::DecorLoop {
            self.children.push(id);
        }
    }

    fn execute(&mut self, step: Step, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Flow {
        match step {
            Step::Place {
                prop,
                position,
                opacity,
                scale,
            } => {
                if let Some(p) = world.stage.prop_mut(&prop) {
                    if let Some(position) = position {
                        p.position = position;
                    }
                    if let Some(opacity) = opacity {
                        p.opacity = opacity.clamp(0.0, 1.0);
                    }
                    if let Some(scale) = scale {
                        p.scale = scale;
                    }
                }
            }
            Step::Fade { prop, to, seconds } => {
                if let Some(p) = world.stage.prop_mut(&prop) {
                    let tween = Tween::new(p.opacity, to.clamp(0.0, 1.0), seconds, Ease::Linear);
                    let task = PropTweenTask::new(self.activation, prop, PropChannel::Opacity(tween));
                    self.spawn_child(cx, TaskKind::Decor, task);
                }
            }
            Step::Move { prop, to, seconds } => {
                if let Some(p) = world.stage.prop_mut(&prop) {
                    let tween = Tween::new(p.position, to, seconds, Ease::Cosine);
                    let task = PropTweenTask::new(self.activation, prop, PropChannel::Position(tween));
                    self.spawn_child(cx, TaskKind::Decor, task);
                }
            }
            Step::Scale { prop, to, seconds } => {
                if let Some(p) = world.stage.prop_mut(&prop) {
                    let tween = Tween::new(p.scale, to, seconds, Ease::Cosine);
                    let task = PropTweenTask::new(self.activation, prop, PropChannel::Scale(tween));
                    self.spawn_child(cx, TaskKind::Decor, task);
                }
            }
            Step::Drift { prop, drift } => {
                let task = DriftTask::new(self.activation, prop, drift);
                self.spawn_child(cx, TaskKind::DecorLoop, task);
            }
            Step::Carousel {
                props,
                hold_seconds,
                crossfade_seconds,
            } => {
                let task = CarouselTask::new(self.activation, props, hold_seconds, crossfade_seconds);
                self.spawn_child(cx, TaskKind::DecorLoop, task);
            }
            Step::PickImage { prop, options } => {
                if options == 0 {
                    tracing::warn!(scene = %self.scene, prop = %prop, "image pick with no options skipped");
                    return Flow::Next;
                }
                let index = world.rng.gen_range(0..options);
                world.random_pick = Some(index);
                tracing::debug!(scene = %self.scene, prop = %prop, index, "image picked");
                world.stage.emit(Cue::ImagePicked { prop, index });
            }
            Step::Wait { seconds } => {
                self.suspension = Suspension::Seconds(seconds);
                return Flow::Suspend;
            }
            Step::Preroll => {
                self.suspension = Suspension::Seconds(world.config.cover.preroll_seconds);
                return Flow::Suspend;
            }
            Step::Join => {
                self.suspension = Suspension::Join;
                return Flow::Suspend;
            }
            Step::Reveal => {
                let tween = Tween::new(
                    world.stage.cover().alpha,
                    0.0,
                    world.config.cover.fade_seconds,
                    Ease::Linear,
                );
                cx.spawner().cancel_where(|m| m.kind == TaskKind::Cover);
                self.spawn_child(cx, TaskKind::Cover, CoverFadeTask::new(self.activation, tween));
            }
            Step::Say { line } => {
                let (text, font_size) = match world.dialogue.localized(line, &world.language) {
                    Ok((text, font_size)) => (text.to_string(), font_size),
                    Err(err) => {
                        tracing::error!(scene = %self.scene, line, error = %err, "dialogue line lookup failed");
                        return Flow::Next;
                    }
                };
                cx.spawner().cancel_where(|m| m.kind == TaskKind::Textbox);
                let task = TextboxTask::new(self.activation, text, font_size, &world.config);
                self.spawn_child(cx, TaskKind::Textbox, task);
            }
            Step::Hush => {
                cx.spawner().cancel_where(|m| m.kind == TaskKind::Textbox);
                let textbox = world.stage.textbox_mut();
                if textbox.visible {
                    textbox.visible = false;
                    textbox.text.clear();
                    let volume = world.config.audio.click_volume;
                    world.stage.play(Sound::TextboxClose, volume, 1.0);
                }
            }
            Step::Route { left, right } => {
                world.set_routing(RoutingTable { left, right });
            }
            Step::RouteByPick(matrix) => {
                if world.random_pick.is_none() {
                    tracing::warn!(scene = %self.scene, "no random pick recorded, using the unmatched routes");
                }
                let routing = matrix.resolve(world.random_pick).clone();
                world.set_routing(routing);
            }
            Step::EnableChoice { pair } => {
                world.enable_choice(pair);
                self.suspension = Suspension::Confirm;
                return Flow::Suspend;
            }
            Step::Record { rank } => {
                let stats = world.ledger.record(rank);
                tracing::info!(scene = %self.scene, ?rank, total = stats.total, today = stats.today, "outcome recorded");
                world.stage.emit(Cue::OutcomeRecorded(stats));
            }
            Step::Continue { to } => {
                world.set_routing(RoutingTable::linear(to));
                world.confirm_choice(cx.spawner(), ChoiceSide::Left);
                return Flow::Finish;
            }
        }
        Flow::Next
    }
}

impl Task<FlowState> for RoutineTask {
    fn poll(&mut self, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Poll {
        if is_stale(world, self.activation, "routine") {
            return Poll::Ready;
        }
        let mut dt = cx.dt();
        loop {
            match self.suspension {
                Suspension::Seconds(remaining) => {
                    let remaining = remaining - dt;
                    dt = 0.0;
                    if remaining > 0.0 {
                        self.suspension = Suspension::Seconds(remaining);
                        return Poll::Pending;
                    }
                    self.suspension = Suspension::Running;
                }
                Suspension::Join => {
                    if !cx.all_done(&self.children) {
                        return Poll::Pending;
                    }
                    self.children.clear();
                    self.suspension = Suspension::Running;
                }
                Suspension::Confirm => return Poll::Pending,
                Suspension::Running => {
                    let Some(step) = self.steps.get(self.pc).cloned() else {
                        return Poll::Ready;
                    };
                    self.pc += 1;
                    match self.execute(step, world, cx) {
                        Flow::Next | Flow::Suspend => {}
                        Flow::Finish => return Poll::Ready,
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Décor
// ---------------------------------------------------------------------------

pub enum PropChannel {
    Opacity(Tween<f32>),
    Position(Tween<Vec3>),
    Scale(Tween<Vec3>),
}

/// A single fade, move or scale on one prop.
pub struct PropTweenTask {
    activation: u64,
    prop: PropId,
    channel: PropChannel,
}

impl PropTweenTask {
    pub fn new(activation: u64, prop: PropId, channel: PropChannel) -> Self {
        Self {
            activation,
            prop,
            channel,
        }
    }
}

impl Task<FlowState> for PropTweenTask {
    fn poll(&mut self, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Poll {
        if is_stale(world, self.activation, "prop tween") {
            return Poll::Ready;
        }
        let Some(prop) = world.stage.prop_mut(&self.prop) else {
            return Poll::Ready;
        };
        let finished = match &mut self.channel {
            PropChannel::Opacity(t) => {
                prop.opacity = t.advance(cx.dt());
                t.is_finished()
            }
            PropChannel::Position(t) => {
                prop.position = t.advance(cx.dt());
                t.is_finished()
            }
            PropChannel::Scale(t) => {
                prop.scale = t.advance(cx.dt());
                t.is_finished()
            }
        };
        if finished {
            Poll::Ready
        } else {
            Poll::Pending
        }
    }
}

/// Drifts a prop at constant velocity with a gentle, eased-in roll. Never
/// finishes on its own.
pub struct DriftTask {
    activation: u64,
    prop: PropId,
    params: DriftParams,
    elapsed: f32,
    roll: f32,
}

impl DriftTask {
    pub fn new(activation: u64, prop: PropId, params: DriftParams) -> Self {
        Self {
            activation,
            prop,
            params,
            elapsed: 0.0,
            roll: 0.0,
        }
    }
}

impl Task<FlowState> for DriftTask {
    fn poll(&mut self, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Poll {
        if is_stale(world, self.activation, "drift") {
            return Poll::Ready;
        }
        let dt = cx.dt();
        let Some(prop) = world.stage.prop_mut(&self.prop) else {
            return Poll::Ready;
        };
        self.elapsed += dt;
        prop.position = prop.position + self.params.velocity.scaled(dt);

        let amplitude = if self.params.roll_ease_in_seconds <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.params.roll_ease_in_seconds).clamp(0.0, 1.0)
        };
        let target = (self.elapsed * TAU * self.params.roll_hz).sin() * self.params.roll_degrees * amplitude;
        let k = 1.0 - (-self.params.roll_damping * dt).exp();
        self.roll += (target - self.roll) * k;
        prop.roll = self.roll;
        Poll::Pending
    }
}

#[derive(Debug, Clone, Copy)]
enum CarouselPhase {
    Starting,
    Holding(f32),
    Fading { next: usize, elapsed: f32 },
}

/// Title slideshow: one prop fully visible at a time, cross-fading to a
/// different random prop after every hold.
pub struct CarouselTask {
    activation: u64,
    props: Vec<PropId>,
    hold_seconds: f32,
    crossfade_seconds: f32,
    current: usize,
    phase: CarouselPhase,
}

impl CarouselTask {
    pub fn new(activation: u64, props: Vec<PropId>, hold_seconds: f32, crossfade_seconds: f32) -> Self {
        Self {
            activation,
            props,
            hold_seconds,
            crossfade_seconds: crossfade_seconds.max(0.01),
            current: 0,
            phase: CarouselPhase::Starting,
        }
    }

    fn set_opacity(world: &mut FlowState, prop: &PropId, opacity: f32) {
        if let Some(p) = world.stage.prop_mut(prop) {
            p.opacity = opacity;
        }
    }
}

impl Task<FlowState> for CarouselTask {
    fn poll(&mut self, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Poll {
        if is_stale(world, self.activation, "carousel") {
            return Poll::Ready;
        }
        if self.props.is_empty() {
            return Poll::Ready;
        }
        match self.phase {
            CarouselPhase::Starting => {
                self.current = world.rng.gen_range(0..self.props.len());
                for (i, prop) in self.props.iter().enumerate() {
                    Self::set_opacity(world, prop, if i == self.current { 1.0 } else { 0.0 });
                }
                self.phase = CarouselPhase::Holding(self.hold_seconds);
            }
            CarouselPhase::Holding(remaining) => {
                let remaining = remaining - cx.dt();
                if remaining > 0.0 || self.props.len() < 2 {
                    self.phase = CarouselPhase::Holding(remaining.max(0.0));
                    return Poll::Pending;
                }
                let mut next = self.current;
                while next == self.current {
                    next = world.rng.gen_range(0..self.props.len());
                }
                self.phase = CarouselPhase::Fading { next, elapsed: 0.0 };
            }
            CarouselPhase::Fading { next, elapsed } => {
                let elapsed = elapsed + cx.dt();
                let a = (elapsed / self.crossfade_seconds).clamp(0.0, 1.0);
                let incoming = self.props[next].clone();
                let outgoing = self.props[self.current].clone();
                Self::set_opacity(world, &incoming, a);
                Self::set_opacity(world, &outgoing, 1.0 - a);
                if a >= 1.0 {
                    self.current = next;
                    self.phase = CarouselPhase::Holding(self.hold_seconds);
                } else {
                    self.phase = CarouselPhase::Fading { next, elapsed };
                }
            }
        }
        Poll::Pending
    }
}

// ---------------------------------------------------------------------------
// Cover, textbox, transition
// ---------------------------------------------------------------------------

/// Fades the screen cover. Used by scenes to reveal themselves.
pub struct CoverFadeTask {
    activation: u64,
    tween: Tween<f32>,
}

impl CoverFadeTask {
    pub fn new(activation: u64, tween: Tween<f32>) -> Self {
        Self { activation, tween }
    }
}

impl Task<FlowState> for CoverFadeTask {
    fn poll(&mut self, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Poll {
        if is_stale(world, self.activation, "cover fade") {
            return Poll::Ready;
        }
        let alpha = self.tween.advance(cx.dt());
        world.stage.set_cover_alpha(alpha);
        if self.tween.is_finished() {
            Poll::Ready
        } else {
            Poll::Pending
        }
    }
}

enum TextboxPhase {
    Start,
    Opening(Tween<f32>),
    Typing(Typewriter),
}

/// Opens the textbox with a scale pop, then types the line into it.
pub struct TextboxTask {
    activation: u64,
    text: String,
    font_size: f32,
    open_seconds: f32,
    open_scale: f32,
    chars_per_second: f32,
    click_min_interval: f32,
    since_click: f32,
    phase: TextboxPhase,
}

impl TextboxTask {
    pub fn new(activation: u64, text: String, font_size: f32, config: &DirectorConfig) -> Self {
        Self {
            activation,
            text,
            font_size,
            open_seconds: config.typing.open_seconds,
            open_scale: config.typing.open_scale,
            chars_per_second: config.typing.chars_per_second,
            click_min_interval: config.typing.click_min_interval,
            since_click: config.typing.click_min_interval,
            phase: TextboxPhase::Start,
        }
    }

    fn click(&mut self, world: &mut FlowState, revealed: &[char]) {
        for ch in revealed {
            if ch.is_whitespace() || self.since_click < self.click_min_interval {
                continue;
            }
            let jitter = world.config.typing.pitch_jitter;
            let pitch = 1.0 + world.rng.gen_range(-jitter..=jitter);
            let volume = world.config.audio.click_volume;
            world.stage.play(Sound::TypeChar, volume, pitch);
            self.since_click = 0.0;
        }
    }
}

impl Task<FlowState> for TextboxTask {
    fn poll(&mut self, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Poll {
        if is_stale(world, self.activation, "textbox") {
            return Poll::Ready;
        }
        let dt = cx.dt();
        match &mut self.phase {
            TextboxPhase::Start => {
                let textbox = world.stage.textbox_mut();
                textbox.visible = true;
                textbox.scale = 0.0;
                textbox.text.clear();
                textbox.font_size = self.font_size;
                let volume = world.config.audio.click_volume;
                world.stage.play(Sound::TextboxOpen, volume, 1.0);
                self.phase = TextboxPhase::Opening(Tween::new(0.0, self.open_scale, self.open_seconds, Ease::Cosine));
                Poll::Pending
            }
            TextboxPhase::Opening(tween) => {
                world.stage.textbox_mut().scale = tween.advance(dt);
                if tween.is_finished() {
                    self.phase = TextboxPhase::Typing(Typewriter::new(&self.text, self.chars_per_second));
                }
                Poll::Pending
            }
            TextboxPhase::Typing(writer) => {
                let mut revealed = Vec::new();
                writer.advance(dt, |ch| revealed.push(ch));
                let visible = writer.visible_text();
                let finished = writer.is_finished();
                world.stage.textbox_mut().text = visible;
                self.since_click += dt;
                self.click(world, &revealed);
                if finished {
                    Poll::Ready
                } else {
                    Poll::Pending
                }
            }
        }
    }
}

/// Runs after a confirm: covers the screen, tears the old activation down
/// and activates the destination.
pub struct TransitionTask {
    activation: u64,
    destination: SceneDestination,
    fade: Option<Tween<f32>>,
}

impl TransitionTask {
    pub fn new(activation: u64, destination: SceneDestination) -> Self {
        Self {
            activation,
            destination,
            fade: None,
        }
    }
}

impl Task<FlowState> for TransitionTask {
    fn poll(&mut self, world: &mut FlowState, cx: &mut Context<'_, FlowState>) -> Poll {
        if is_stale(world, self.activation, "transition") {
            return Poll::Ready;
        }
        if self.fade.is_none() {
            cx.spawner().cancel_where(|m| m.kind == TaskKind::Cover);
            self.fade = Some(Tween::new(
                world.stage.cover().alpha,
                1.0,
                world.config.cover.fade_seconds,
                Ease::Linear,
            ));
        }
        let Some(fade) = self.fade.as_mut() else {
            return Poll::Ready;
        };
        let alpha = fade.advance(cx.dt());
        world.stage.set_cover_alpha(alpha);
        if !fade.is_finished() {
            return Poll::Pending;
        }
        world.teardown(cx.spawner(), &self.destination);
        if let Err(err) = world.activate(cx.spawner(), &self.destination.next) {
            tracing::error!(next = %self.destination.next, error = %err, "transition target could not be activated");
        }
        Poll::Ready
    }
}
