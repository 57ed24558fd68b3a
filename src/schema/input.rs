use serde::{Deserialize, Serialize};

use super::scene::ChoiceSide;

/// A spatial trigger edge: the visitor entered or left a side's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverEdge {
    pub side: ChoiceSide,
    pub entered: bool,
}

impl HoverEdge {
    pub fn enter(side: ChoiceSide) -> Self {
        Self { side, entered: true }
    }

    pub fn exit(side: ChoiceSide) -> Self {
        Self {
            side,
            entered: false,
        }
    }
}

/// Raised-limb flags from the body-tracking collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GestureFlags {
    pub left_raised: bool,
    pub right_raised: bool,
}

impl GestureFlags {
    /// The side the gesture points at. Both raised is ambiguous and maps to none.
    pub fn preview_side(self) -> Option<ChoiceSide> {
        match (self.left_raised, self.right_raised) {
            (true, false) => Some(ChoiceSide::Left),
            (false, true) => Some(ChoiceSide::Right),
            _ => None,
        }
    }
}

/// Everything the director polls from its collaborators in one tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameInput {
    /// Hover edges since the previous tick, in arrival order.
    #[serde(default)]
    pub hover: Vec<HoverEdge>,
    #[serde(default)]
    pub gesture: GestureFlags,
    #[serde(default)]
    pub user_present: bool,
    /// Externally recorded random selection (0..=7), if any.
    #[serde(default)]
    pub random_pick: Option<u8>,
}

impl FrameInput {
    /// A visitor is present and doing nothing.
    pub fn present() -> Self {
        Self {
            user_present: true,
            ..Self::default()
        }
    }

    /// Nobody in front of the sensor.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn with_hover(mut self, edge: HoverEdge) -> Self {
        self.hover.push(edge);
        self
    }

    pub fn with_gesture(mut self, left_raised: bool, right_raised: bool) -> Self {
        self.gesture = GestureFlags {
            left_raised,
            right_raised,
        };
        self
    }
}
