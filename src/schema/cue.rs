use serde::{Deserialize, Serialize};

use super::scene::{PropId, RootId, SceneId};
use crate::core::ledger::OutcomeStats;

/// One-shot sounds the director asks the audio collaborator to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sound {
    TypeChar,
    TextboxOpen,
    TextboxClose,
    ChoiceOpen,
    ChoiceConfirm,
    Transition,
}

/// A call produced for a collaborator. The host drains these every tick;
/// continuous state (prop transforms, volumes, UI) is read from snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cue {
    ShowRoot(RootId),
    HideRoot(RootId),
    PlaySound { sound: Sound, volume: f32, pitch: f32 },
    ImagePicked { prop: PropId, index: u8 },
    OutcomeRecorded(OutcomeStats),
    SceneEntered(SceneId),
    HardReset,
}
