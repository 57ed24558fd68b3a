/// Hold-to-confirm: a side must stay hovered for the threshold before the
/// choice takes effect, and it takes effect at most once per activation.
use crate::schema::scene::ChoiceSide;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfirmState {
    pub active_side: Option<ChoiceSide>,
    pub hold_elapsed: f32,
    /// One-way latch until the activation is torn down.
    pub confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct ConfirmTimer {
    threshold: f32,
    state: ConfirmState,
}

impl ConfirmTimer {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: ConfirmState::default(),
        }
    }

    /// Point the timer at the hovered side. Any change restarts the hold.
    pub fn set_active(&mut self, side: Option<ChoiceSide>) {
        if self.state.active_side != side {
            self.state.active_side = side;
            self.state.hold_elapsed = 0.0;
        }
    }

    /// Accumulate hold time. Returns the side on the tick the threshold is
    /// first reached, and never again until `reset`.
    pub fn advance(&mut self, dt: f32, enabled: bool) -> Option<ChoiceSide> {
        if self.state.confirmed || !enabled {
            return None;
        }
        let side = self.state.active_side?;
        self.state.hold_elapsed += dt.max(0.0);
        if self.state.hold_elapsed >= self.threshold {
            self.state.confirmed = true;
            return Some(side);
        }
        None
    }

    /// Ring fill, 0..=1.
    pub fn progress(&self) -> f32 {
        (self.state.hold_elapsed / self.threshold).clamp(0.0, 1.0)
    }

    pub fn state(&self) -> ConfirmState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state.confirmed
    }

    /// Latch the timer without a hold, e.g. for a scripted continue.
    pub fn latch(&mut self) -> bool {
        if self.state.confirmed {
            return false;
        }
        self.state.confirmed = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirms_exactly_at_threshold() {
        let mut timer = ConfirmTimer::new(1.25);
        timer.set_active(Some(ChoiceSide::Left));
        for _ in 0..4 {
            assert_eq!(timer.advance(0.25, true), None);
        }
        assert_eq!(timer.advance(0.25, true), Some(ChoiceSide::Left));
        assert_eq!(timer.advance(0.25, true), None);
        assert!(timer.is_confirmed());
    }

    #[test]
    fn switching_side_restarts_hold() {
        let mut timer = ConfirmTimer::new(1.25);
        timer.set_active(Some(ChoiceSide::Left));
        timer.advance(0.5, true);
        timer.advance(0.25, true);
        timer.set_active(Some(ChoiceSide::Right));
        assert_eq!(timer.state().hold_elapsed, 0.0);
        timer.advance(0.25, true);
        assert_eq!(timer.state().hold_elapsed, 0.25);
    }

    #[test]
    fn release_forgets_partial_hold() {
        let mut timer = ConfirmTimer::new(1.0);
        timer.set_active(Some(ChoiceSide::Right));
        timer.advance(0.75, true);
        timer.set_active(None);
        timer.set_active(Some(ChoiceSide::Right));
        assert_eq!(timer.advance(0.5, true), None);
        assert_eq!(timer.progress(), 0.5);
    }

    #[test]
    fn disabled_timer_does_not_accumulate() {
        let mut timer = ConfirmTimer::new(1.0);
        timer.set_active(Some(ChoiceSide::Left));
        assert_eq!(timer.advance(5.0, false), None);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn no_side_never_confirms() {
        let mut timer = ConfirmTimer::new(0.5);
        assert_eq!(timer.advance(10.0, true), None);
        assert!(!timer.is_confirmed());
    }

    #[test]
    fn latch_is_one_shot() {
        let mut timer = ConfirmTimer::new(1.0);
        assert!(timer.latch());
        assert!(!timer.latch());
        assert!(timer.is_confirmed());
    }
}
