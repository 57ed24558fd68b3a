/// Stage: the shared surfaces every task mutates. Décor props, visual
/// roots, the single textbox, the screen cover and the cue outbox.
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::core::tween::Vec3;
use crate::schema::cue::{Cue, Sound};
use crate::schema::scene::{PropId, RootId, StoryGraph};

/// Cover alpha at or below this hides the cover.
const COVER_HIDDEN: f32 = 0.001;

/// A post-processing effect whose strength follows the screen cover.
pub trait VisualEffect {
    fn set_effect_strength(&mut self, strength: f32);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prop {
    pub position: Vec3,
    pub opacity: f32,
    pub scale: Vec3,
    /// Roll around the forward axis, degrees.
    pub roll: f32,
}

impl Default for Prop {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            opacity: 1.0,
            scale: Vec3::ONE,
            roll: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Textbox {
    pub visible: bool,
    pub scale: f32,
    pub text: String,
    pub font_size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cover {
    pub alpha: f32,
    pub visible: bool,
}

impl Default for Cover {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            visible: true,
        }
    }
}

#[derive(Default)]
pub struct Stage {
    props: FxHashMap<PropId, Prop>,
    roots: FxHashMap<RootId, bool>,
    active_root: Option<RootId>,
    title_root: Option<RootId>,
    textbox: Textbox,
    cover: Cover,
    effect_strength: f32,
    effect: Option<Box<dyn VisualEffect>>,
    cues: Vec<Cue>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stage with every prop and root the story mentions already wired.
    pub fn wired_for(story: &StoryGraph) -> Self {
        let mut stage = Self::new();
        for prop in story.props() {
            stage.wire_prop(prop);
        }
        for root in story.roots() {
            stage.wire_root(root);
        }
        stage
    }

    pub fn wire_prop(&mut self, id: PropId) {
        self.props.entry(id).or_default();
    }

    pub fn wire_root(&mut self, id: RootId) {
        self.roots.entry(id).or_insert(false);
    }

    pub fn set_title_root(&mut self, root: Option<RootId>) {
        self.title_root = root;
    }

    pub fn set_effect(&mut self, effect: Box<dyn VisualEffect>) {
        self.effect = Some(effect);
    }

    pub fn prop(&self, id: &PropId) -> Option<&Prop> {
        self.props.get(id)
    }

    /// Mutable access to a wired prop. Unwired props log and return `None`.
    pub fn prop_mut(&mut self, id: &PropId) -> Option<&mut Prop> {
        let prop = self.props.get_mut(id);
        if prop.is_none() {
            tracing::warn!(prop = %id, "prop is not wired, step skipped");
        }
        prop
    }

    pub fn props(&self) -> impl Iterator<Item = (&PropId, &Prop)> {
        self.props.iter()
    }

    /// Show a root and make it the active one. Returns false if unwired.
    pub fn show_root(&mut self, id: &RootId) -> bool {
        match self.roots.get_mut(id) {
            Some(visible) => {
                *visible = true;
                self.active_root = Some(id.clone());
                self.cues.push(Cue::ShowRoot(id.clone()));
                true
            }
            None => {
                tracing::warn!(root = %id, "visual root is not wired, show skipped");
                false
            }
        }
    }

    pub fn hide_root(&mut self, id: &RootId) -> bool {
        match self.roots.get_mut(id) {
            Some(visible) => {
                *visible = false;
                if self.active_root.as_ref() == Some(id) {
                    self.active_root = None;
                }
                self.cues.push(Cue::HideRoot(id.clone()));
                true
            }
            None => {
                tracing::warn!(root = %id, "visual root is not wired, hide skipped");
                false
            }
        }
    }

    pub fn is_root_visible(&self, id: &RootId) -> bool {
        self.roots.get(id).copied().unwrap_or(false)
    }

    pub fn active_root(&self) -> Option<&RootId> {
        self.active_root.as_ref()
    }

    pub fn textbox(&self) -> &Textbox {
        &self.textbox
    }

    pub fn textbox_mut(&mut self) -> &mut Textbox {
        &mut self.textbox
    }

    pub fn cover(&self) -> Cover {
        self.cover
    }

    pub fn set_cover_alpha(&mut self, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        self.cover.alpha = alpha;
        self.cover.visible = alpha > COVER_HIDDEN;
    }

    /// Push the effect strength to the wired effect: full while the title
    /// root is showing, otherwise following the cover.
    pub fn update_effect(&mut self) {
        let at_title = self.title_root.is_some() && self.active_root == self.title_root;
        self.effect_strength = if at_title { 1.0 } else { self.cover.alpha };
        if let Some(effect) = self.effect.as_mut() {
            effect.set_effect_strength(self.effect_strength);
        }
    }

    pub fn effect_strength(&self) -> f32 {
        self.effect_strength
    }

    pub fn emit(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    pub fn play(&mut self, sound: Sound, volume: f32, pitch: f32) {
        self.cues.push(Cue::PlaySound {
            sound,
            volume,
            pitch,
        });
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn drain_cues(&mut self) -> Vec<Cue> {
        std::mem::take(&mut self.cues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Probe(Rc<Cell<f32>>);

    impl VisualEffect for Probe {
        fn set_effect_strength(&mut self, strength: f32) {
            self.0.set(strength);
        }
    }

    #[test]
    fn cover_hides_when_transparent() {
        let mut stage = Stage::new();
        assert!(stage.cover().visible);
        stage.set_cover_alpha(0.0005);
        assert!(!stage.cover().visible);
        stage.set_cover_alpha(0.5);
        assert!(stage.cover().visible);
    }

    #[test]
    fn unwired_root_is_skipped() {
        let mut stage = Stage::new();
        assert!(!stage.show_root(&RootId::new("ghost")));
        assert!(stage.active_root().is_none());
        assert!(stage.cues().is_empty());
    }

    #[test]
    fn show_and_hide_root_emit_cues() {
        let mut stage = Stage::new();
        let root = RootId::new("intro");
        stage.wire_root(root.clone());
        stage.show_root(&root);
        assert!(stage.is_root_visible(&root));
        stage.hide_root(&root);
        assert!(!stage.is_root_visible(&root));
        assert_eq!(
            stage.drain_cues(),
            vec![Cue::ShowRoot(root.clone()), Cue::HideRoot(root)]
        );
        assert!(stage.cues().is_empty());
    }

    #[test]
    fn effect_is_full_at_title_else_follows_cover() {
        let seen = Rc::new(Cell::new(-1.0));
        let mut stage = Stage::new();
        stage.set_effect(Box::new(Probe(seen.clone())));
        let title = RootId::new("title");
        let other = RootId::new("other");
        stage.wire_root(title.clone());
        stage.wire_root(other.clone());
        stage.set_title_root(Some(title.clone()));

        stage.show_root(&title);
        stage.set_cover_alpha(0.25);
        stage.update_effect();
        assert_eq!(seen.get(), 1.0);

        stage.hide_root(&title);
        stage.show_root(&other);
        stage.update_effect();
        assert_eq!(seen.get(), 0.25);
    }

    #[test]
    fn unwired_prop_returns_none() {
        let mut stage = Stage::new();
        assert!(stage.prop_mut(&PropId::new("boat")).is_none());
        stage.wire_prop(PropId::new("boat"));
        assert_eq!(stage.prop(&PropId::new("boat")), Some(&Prop::default()));
    }
}
