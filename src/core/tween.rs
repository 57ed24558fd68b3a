/// Time-boxed interpolation, the shared engine behind every fade, move
/// and scale the director performs.
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Durations below this are treated as "apply instantly".
const MIN_DURATION: f32 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn scaled(self, k: f32) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Linear interpolation between two values of the same type.
pub trait Lerp: Copy {
    fn lerp(from: Self, to: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(from: f32, to: f32, t: f32) -> f32 {
        from + (to - from) * t
    }
}

impl Lerp for Vec2 {
    fn lerp(from: Vec2, to: Vec2, t: f32) -> Vec2 {
        Vec2::new(f32::lerp(from.x, to.x, t), f32::lerp(from.y, to.y, t))
    }
}

impl Lerp for Vec3 {
    fn lerp(from: Vec3, to: Vec3, t: f32) -> Vec3 {
        Vec3::new(
            f32::lerp(from.x, to.x, t),
            f32::lerp(from.y, to.y, t),
            f32::lerp(from.z, to.z, t),
        )
    }
}

/// Easing curve applied to normalized progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ease {
    Linear,
    /// `0.5 - 0.5 cos(pi t)`: slow in, slow out.
    #[default]
    Cosine,
}

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Cosine => 0.5 - 0.5 * (t * PI).cos(),
        }
    }
}

/// A single interpolation from `from` to `to` over `duration` seconds.
///
/// Restarting replaces the endpoints; a zero duration lands on `to` at the
/// first advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween<T: Lerp> {
    from: T,
    to: T,
    duration: f32,
    elapsed: f32,
    ease: Ease,
}

impl<T: Lerp> Tween<T> {
    pub fn new(from: T, to: T, duration: f32, ease: Ease) -> Self {
        Self {
            from,
            to,
            duration: duration.max(0.0),
            elapsed: 0.0,
            ease,
        }
    }

    /// A tween already resting at `value`.
    pub fn settled(value: T) -> Self {
        Self::new(value, value, 0.0, Ease::Linear)
    }

    /// Start over from `from` towards `to`.
    pub fn restart(&mut self, from: T, to: T, duration: f32) {
        self.from = from;
        self.to = to;
        self.duration = duration.max(0.0);
        self.elapsed = 0.0;
    }

    /// Retarget from wherever the tween currently is.
    pub fn retarget(&mut self, to: T, duration: f32) {
        let here = self.value();
        self.restart(here, to, duration);
    }

    /// Jump straight to `value` and stop.
    pub fn snap(&mut self, value: T) {
        self.restart(value, value, 0.0);
    }

    /// Advance time and return the new value.
    pub fn advance(&mut self, dt: f32) -> T {
        if !self.is_finished() {
            self.elapsed += dt.max(0.0);
        }
        self.value()
    }

    pub fn value(&self) -> T {
        if self.duration <= MIN_DURATION || self.elapsed >= self.duration {
            return self.to;
        }
        let t = self.ease.apply(self.elapsed / self.duration);
        T::lerp(self.from, self.to, t)
    }

    pub fn target(&self) -> T {
        self.to
    }

    pub fn is_finished(&self) -> bool {
        self.duration <= MIN_DURATION || self.elapsed >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_ease_endpoints_and_midpoint() {
        assert_eq!(Ease::Cosine.apply(0.0), 0.0);
        assert!((Ease::Cosine.apply(1.0) - 1.0).abs() < 1e-6);
        assert!((Ease::Cosine.apply(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn ease_clamps_input() {
        assert_eq!(Ease::Linear.apply(-1.0), 0.0);
        assert_eq!(Ease::Linear.apply(2.0), 1.0);
    }

    #[test]
    fn zero_duration_is_instant() {
        let mut tween = Tween::new(0.0_f32, 1.0, 0.0, Ease::Cosine);
        assert!(tween.is_finished());
        assert_eq!(tween.advance(0.0), 1.0);
    }

    #[test]
    fn tween_reaches_target_exactly() {
        let mut tween = Tween::new(Vec3::ZERO, Vec3::new(2.0, 0.0, -4.0), 1.0, Ease::Cosine);
        for _ in 0..3 {
            tween.advance(0.25);
        }
        assert!(!tween.is_finished());
        let end = tween.advance(0.25);
        assert!(tween.is_finished());
        assert_eq!(end, Vec3::new(2.0, 0.0, -4.0));
    }

    #[test]
    fn retarget_starts_from_current_value() {
        let mut tween = Tween::new(0.0_f32, 1.0, 1.0, Ease::Linear);
        tween.advance(0.5);
        tween.retarget(0.0, 1.0);
        assert!((tween.value() - 0.5).abs() < 1e-6);
        tween.advance(1.0);
        assert_eq!(tween.value(), 0.0);
    }

    #[test]
    fn snap_settles_immediately() {
        let mut tween = Tween::new(1.0_f32, 0.0, 5.0, Ease::Cosine);
        tween.snap(0.25);
        assert!(tween.is_finished());
        assert_eq!(tween.value(), 0.25);
    }
}
