pub mod ambience;
pub mod choice;
pub mod config;
pub mod confirm;
pub mod director;
pub mod ledger;
pub mod scheduler;
pub mod stage;
pub mod tasks;
pub mod tween;
pub mod typewriter;
pub mod watchdog;

pub use director::{Director, DirectorBuilder, DirectorError};
