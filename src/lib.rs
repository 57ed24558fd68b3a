//! Narrative Flow: the scene director behind a sensor-driven story
//! installation.
//!
//! A visitor picks between two sides by standing in front of them (hover)
//! or raising an arm (gesture). The director previews the side they lean
//! towards, confirms it after a continuous hold, and walks an authored
//! graph of scenes, each a small data-driven routine of décor animation,
//! dialogue and ambience. If the visitor walks away, an idle watchdog
//! unwinds everything back to the title scene.
//!
//! The crate owns no renderer, audio device or sensor. Hosts feed a
//! `FrameInput` every tick, read the `Stage` and `AmbienceBus` state, and
//! drain `Cue`s for one-shot calls such as sounds and root visibility.

pub mod core;
pub mod schema;
