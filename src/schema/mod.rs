pub mod cue;
pub mod input;
pub mod line;
pub mod scene;
