/// Choice arbitration: merges hover and gesture into one previewed side
/// and owns the preview box the visitor sees.
///
/// Hover always beats gesture. Only hover shows the hold ring, so a raised
/// arm can preview a side but never start the confirm countdown.
use crate::core::config::ChoiceConfig;
use crate::core::tween::{Lerp, Tween, Vec2};
use crate::schema::input::HoverEdge;
use crate::schema::scene::ChoiceSide;

/// What the preview should show after arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub side: Option<ChoiceSide>,
    /// Show the hold ring (and let the confirm timer run).
    pub ring: bool,
}

/// The on-screen preview box and its hold ring.
#[derive(Debug, Clone)]
pub struct ChoicePreview {
    visible: bool,
    closing: bool,
    side: Option<ChoiceSide>,
    text: String,
    font_size: f32,
    scale: Tween<f32>,
    position: Tween<Vec2>,
    ring_visible: bool,
    ring_progress: f32,
}

impl Default for ChoicePreview {
    fn default() -> Self {
        Self {
            visible: false,
            closing: false,
            side: None,
            text: String::new(),
            font_size: 0.0,
            scale: Tween::settled(0.0),
            position: Tween::settled(Vec2::ZERO),
            ring_visible: false,
            ring_progress: 0.0,
        }
    }
}

impl ChoicePreview {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn side(&self) -> Option<ChoiceSide> {
        self.side
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn scale(&self) -> f32 {
        self.scale.value()
    }

    pub fn position(&self) -> Vec2 {
        self.position.value()
    }

    pub fn ring_visible(&self) -> bool {
        self.ring_visible
    }

    pub fn ring_progress(&self) -> f32 {
        self.ring_progress
    }
}

#[derive(Debug, Clone)]
pub struct ChoiceArbiter {
    hover: Option<ChoiceSide>,
    gesture: Option<ChoiceSide>,
    applied: Option<Resolution>,
    opened_this_arming: bool,
    preview: ChoicePreview,
    config: ChoiceConfig,
}

impl ChoiceArbiter {
    pub fn new(config: ChoiceConfig) -> Self {
        Self {
            hover: None,
            gesture: None,
            applied: None,
            opened_this_arming: false,
            preview: ChoicePreview::default(),
            config,
        }
    }

    /// Track a hover edge. Leaving a side that is not the hovered one
    /// changes nothing.
    pub fn on_hover(&mut self, edge: HoverEdge) {
        if edge.entered {
            self.hover = Some(edge.side);
        } else if self.hover == Some(edge.side) {
            self.hover = None;
        }
    }

    pub fn on_gesture(&mut self, side: Option<ChoiceSide>) {
        self.gesture = side;
    }

    pub fn hover(&self) -> Option<ChoiceSide> {
        self.hover
    }

    pub fn gesture(&self) -> Option<ChoiceSide> {
        self.gesture
    }

    /// Hover if present, else gesture.
    pub fn desired(&self) -> Option<ChoiceSide> {
        self.hover.or(self.gesture)
    }

    /// Resolve the current inputs. Returns a resolution only when it
    /// differs from the last one applied; nothing while input is disabled.
    pub fn resolve(&mut self, enabled: bool) -> Option<Resolution> {
        if !enabled {
            return None;
        }
        let next = Resolution {
            side: self.desired(),
            ring: self.hover.is_some(),
        };
        if self.applied == Some(next) {
            return None;
        }
        self.applied = Some(next);
        Some(next)
    }

    /// Forget what was applied so the next resolve re-applies, and allow
    /// the open sound to play again. Called whenever choice input is armed.
    pub fn rearm(&mut self) {
        self.applied = None;
        self.opened_this_arming = false;
    }

    /// Where the preview sits for `side`: the side's anchor pulled towards
    /// the middle by the configured blend, then offset.
    pub fn preview_position(&self, side: ChoiceSide) -> Vec2 {
        let anchor = match side {
            ChoiceSide::Left => self.config.left_anchor,
            ChoiceSide::Right => self.config.right_anchor,
        };
        let middle = Vec2::lerp(self.config.left_anchor, self.config.right_anchor, 0.5);
        Vec2::lerp(anchor, middle, self.config.toward_center) + self.config.offset
    }

    /// Open the preview on `side`, or move it there if already open.
    /// Returns true the first time the preview opens in this arming.
    pub fn open_preview(&mut self, side: ChoiceSide, text: &str, font_size: f32, ring: bool) -> bool {
        let target = self.preview_position(side);
        let anim = self.config.anim_seconds;
        let preview = &mut self.preview;
        if preview.visible && !preview.closing {
            preview.position.retarget(target, anim);
        } else {
            if !preview.visible {
                preview.position.snap(target);
            } else {
                preview.position.retarget(target, anim);
            }
            preview.visible = true;
            preview.closing = false;
            preview.scale.restart(preview.scale.value(), 1.0, anim);
        }
        preview.side = Some(side);
        preview.text = text.to_string();
        preview.font_size = font_size;
        preview.ring_visible = ring;
        if !ring {
            preview.ring_progress = 0.0;
        }
        let first = !self.opened_this_arming;
        self.opened_this_arming = true;
        first
    }

    /// Animate the preview closed; it deactivates once the scale reaches 0.
    pub fn close_preview(&mut self) {
        let preview = &mut self.preview;
        preview.ring_visible = false;
        preview.ring_progress = 0.0;
        if !preview.visible || preview.closing {
            return;
        }
        preview.closing = true;
        preview.scale.retarget(0.0, self.config.anim_seconds);
    }

    /// Hide the preview immediately and forget the applied resolution.
    pub fn hide_now(&mut self) {
        self.preview = ChoicePreview::default();
        self.applied = None;
    }

    /// Advance preview animations and copy the confirm progress into the ring.
    pub fn update(&mut self, dt: f32, ring_progress: f32) {
        let preview = &mut self.preview;
        preview.scale.advance(dt);
        preview.position.advance(dt);
        if preview.ring_visible {
            preview.ring_progress = ring_progress;
        }
        if preview.closing && preview.scale.is_finished() {
            preview.visible = false;
            preview.closing = false;
            preview.side = None;
        }
    }

    pub fn preview(&self) -> &ChoicePreview {
        &self.preview
    }

    /// Where the hold ring sits: just below the preview box.
    pub fn ring_position(&self) -> Vec2 {
        self.preview.position() + Vec2::new(0.0, -self.config.ring_gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arbiter() -> ChoiceArbiter {
        ChoiceArbiter::new(ChoiceConfig::default())
    }

    #[test]
    fn hover_beats_gesture() {
        let mut arb = arbiter();
        arb.on_gesture(Some(ChoiceSide::Right));
        arb.on_hover(HoverEdge::enter(ChoiceSide::Left));
        let res = arb.resolve(true).unwrap();
        assert_eq!(res.side, Some(ChoiceSide::Left));
        assert!(res.ring);
    }

    #[test]
    fn gesture_alone_previews_without_ring() {
        let mut arb = arbiter();
        arb.on_gesture(Some(ChoiceSide::Right));
        let res = arb.resolve(true).unwrap();
        assert_eq!(
            res,
            Resolution {
                side: Some(ChoiceSide::Right),
                ring: false
            }
        );
    }

    #[test]
    fn unchanged_resolution_is_not_reapplied() {
        let mut arb = arbiter();
        arb.on_hover(HoverEdge::enter(ChoiceSide::Left));
        assert!(arb.resolve(true).is_some());
        assert!(arb.resolve(true).is_none());
        arb.rearm();
        assert!(arb.resolve(true).is_some());
    }

    #[test]
    fn exit_from_other_side_is_ignored() {
        let mut arb = arbiter();
        arb.on_hover(HoverEdge::enter(ChoiceSide::Left));
        arb.on_hover(HoverEdge::enter(ChoiceSide::Right));
        arb.on_hover(HoverEdge::exit(ChoiceSide::Left));
        assert_eq!(arb.hover(), Some(ChoiceSide::Right));
        arb.on_hover(HoverEdge::exit(ChoiceSide::Right));
        assert_eq!(arb.hover(), None);
    }

    #[test]
    fn disabled_input_resolves_nothing() {
        let mut arb = arbiter();
        arb.on_hover(HoverEdge::enter(ChoiceSide::Left));
        assert!(arb.resolve(false).is_none());
        assert!(arb.resolve(true).is_some());
    }

    #[test]
    fn preview_position_blends_towards_middle() {
        let arb = arbiter();
        let left = arb.preview_position(ChoiceSide::Left);
        assert_eq!(left, Vec2::new(-360.0, 120.0));
        let right = arb.preview_position(ChoiceSide::Right);
        assert_eq!(right, Vec2::new(360.0, 120.0));
    }

    #[test]
    fn ring_sits_below_the_preview() {
        let mut arb = arbiter();
        arb.open_preview(ChoiceSide::Left, "a", 20.0, true);
        assert_eq!(arb.ring_position(), Vec2::new(-360.0, 108.0));
    }

    #[test]
    fn open_sound_once_per_arming() {
        let mut arb = arbiter();
        assert!(arb.open_preview(ChoiceSide::Left, "a", 20.0, true));
        assert!(!arb.open_preview(ChoiceSide::Right, "b", 20.0, true));
        arb.rearm();
        assert!(arb.open_preview(ChoiceSide::Right, "b", 20.0, true));
    }

    #[test]
    fn close_animates_then_deactivates() {
        let mut arb = arbiter();
        arb.open_preview(ChoiceSide::Left, "a", 20.0, true);
        arb.update(0.25, 0.0);
        assert_eq!(arb.preview().scale(), 1.0);
        arb.close_preview();
        assert!(arb.preview().is_visible());
        assert!(!arb.preview().ring_visible());
        arb.update(0.25, 0.0);
        assert!(!arb.preview().is_visible());
        assert_eq!(arb.preview().scale(), 0.0);
    }

    #[test]
    fn reopen_while_closing_grows_back() {
        let mut arb = arbiter();
        arb.open_preview(ChoiceSide::Left, "a", 20.0, false);
        arb.update(0.25, 0.0);
        arb.close_preview();
        arb.update(0.1, 0.0);
        arb.open_preview(ChoiceSide::Left, "a", 20.0, false);
        arb.update(0.25, 0.0);
        assert!(arb.preview().is_visible());
        assert_eq!(arb.preview().scale(), 1.0);
    }

    #[test]
    fn ring_tracks_progress_only_when_shown() {
        let mut arb = arbiter();
        arb.open_preview(ChoiceSide::Left, "a", 20.0, false);
        arb.update(0.1, 0.5);
        assert_eq!(arb.preview().ring_progress(), 0.0);
        arb.open_preview(ChoiceSide::Left, "a", 20.0, true);
        arb.update(0.1, 0.5);
        assert_eq!(arb.preview().ring_progress(), 0.5);
    }
}
