/// Ambience bus: N looping background channels crossfaded as one vector.
///
/// Only one fade is ever in flight; starting a new one replaces it and
/// eases from wherever the channels currently are. Once committed, the bus
/// ignores previews until the next scene resets it.
use crate::core::config::AmbienceConfig;
use crate::core::tween::{Ease, Lerp, Tween};
use crate::schema::scene::AmbienceRoute;

/// Volumes at or below this count as silent.
const SILENT: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AmbienceChannel {
    pub volume: f32,
    pub playing: bool,
}

#[derive(Debug, Clone)]
struct Fade {
    from: Vec<f32>,
    to: Vec<f32>,
    progress: Tween<f32>,
    stop_when_silent: bool,
}

#[derive(Debug, Clone)]
pub struct AmbienceBus {
    channels: Vec<AmbienceChannel>,
    fade: Option<Fade>,
    committed: bool,
    previewing: Option<usize>,
    config: AmbienceConfig,
}

impl AmbienceBus {
    pub fn new(config: AmbienceConfig) -> Self {
        Self {
            channels: vec![AmbienceChannel::default(); config.channels],
            fade: None,
            committed: false,
            previewing: None,
            config,
        }
    }

    /// Ease every channel towards `targets` over `seconds`, replacing any
    /// fade in flight. Channels missing from `targets` fade to 0.
    pub fn fade_to(&mut self, targets: &[f32], seconds: f32, stop_when_silent: bool) {
        let to: Vec<f32> = (0..self.channels.len())
            .map(|i| targets.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0))
            .collect();
        for (channel, target) in self.channels.iter_mut().zip(&to) {
            if *target > SILENT {
                channel.playing = true;
            }
        }
        let from = self.volumes();
        self.fade = Some(Fade {
            from,
            to,
            progress: Tween::new(0.0, 1.0, seconds, Ease::Cosine),
            stop_when_silent,
        });
        if seconds <= 0.0 {
            self.update(0.0);
        }
    }

    /// Advance the in-flight fade.
    pub fn update(&mut self, dt: f32) {
        let Some(fade) = self.fade.as_mut() else {
            return;
        };
        let t = fade.progress.advance(dt);
        let finished = fade.progress.is_finished();
        for (i, channel) in self.channels.iter_mut().enumerate() {
            channel.volume = if finished {
                fade.to[i]
            } else {
                f32::lerp(fade.from[i], fade.to[i], t)
            };
            if finished && fade.stop_when_silent && channel.volume <= SILENT {
                channel.volume = 0.0;
                channel.playing = false;
            }
        }
        if finished {
            self.fade = None;
        }
    }

    /// Quietly preview one route. Ignored once committed or when the same
    /// channel is already being previewed; `Silence` stops the preview.
    pub fn preview(&mut self, route: AmbienceRoute) {
        if self.committed {
            tracing::debug!(?route, "ambience committed, preview ignored");
            return;
        }
        let channel = match route {
            AmbienceRoute::Silence => {
                self.stop_preview();
                return;
            }
            AmbienceRoute::Channel(c) => c,
        };
        if channel >= self.channels.len() {
            tracing::warn!(channel, channels = self.channels.len(), "preview of unknown ambience channel");
            return;
        }
        if self.previewing == Some(channel) {
            return;
        }
        let targets = self.solo(channel, self.config.preview_volume);
        self.fade_to(&targets, self.config.preview_fade_seconds, false);
        self.previewing = Some(channel);
    }

    /// Fade out whatever is being previewed.
    pub fn stop_preview(&mut self) {
        if self.committed || self.previewing.is_none() {
            return;
        }
        self.previewing = None;
        let silent = vec![0.0; self.channels.len()];
        self.fade_to(&silent, self.config.preview_fade_seconds, true);
    }

    /// Bring one channel to full volume and silence the rest. A second
    /// commit before the next reset is a no-op.
    pub fn commit(&mut self, route: AmbienceRoute) {
        if self.committed {
            tracing::debug!(?route, "ambience already committed");
            return;
        }
        let AmbienceRoute::Channel(channel) = route else {
            self.release();
            return;
        };
        if channel >= self.channels.len() {
            tracing::warn!(channel, channels = self.channels.len(), "commit to unknown ambience channel");
            return;
        }
        let targets = self.solo(channel, 1.0);
        self.fade_to(&targets, self.config.commit_fade_seconds, true);
        self.committed = true;
        self.previewing = None;
    }

    /// Fade every channel out and stop it. Counts as committing to silence.
    pub fn release(&mut self) {
        let silent = vec![0.0; self.channels.len()];
        self.fade_to(&silent, self.config.stop_fade_seconds, true);
        self.committed = true;
        self.previewing = None;
    }

    /// Re-open the bus for previews. Called on every scene activation.
    pub fn reset_commit(&mut self) {
        self.committed = false;
        self.previewing = None;
    }

    /// Zero and stop every channel right now, dropping any fade.
    pub fn silence_now(&mut self) {
        self.fade = None;
        for channel in &mut self.channels {
            *channel = AmbienceChannel::default();
        }
        self.committed = false;
        self.previewing = None;
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.channels.iter().map(|c| c.volume).collect()
    }

    pub fn channels(&self) -> &[AmbienceChannel] {
        &self.channels
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn previewing(&self) -> Option<usize> {
        self.previewing
    }

    fn solo(&self, channel: usize, volume: f32) -> Vec<f32> {
        (0..self.channels.len())
            .map(|i| if i == channel { volume } else { 0.0 })
            .collect()
    }
}
