/// Idle watchdog: counts time without a visitor and says when to give up
/// on the current run.

#[derive(Debug, Clone)]
pub struct IdleWatchdog {
    timeout: f32,
    idle: f32,
}

impl IdleWatchdog {
    pub fn new(timeout: f32) -> Self {
        Self { timeout, idle: 0.0 }
    }

    /// Feed one tick. Returns true on the tick the timeout is reached; the
    /// counter restarts from zero afterwards. Never fires at the title.
    pub fn observe(&mut self, dt: f32, at_title: bool, user_present: bool) -> bool {
        if at_title || user_present {
            self.idle = 0.0;
            return false;
        }
        self.idle += dt.max(0.0);
        if self.idle >= self.timeout {
            self.idle = 0.0;
            return true;
        }
        false
    }

    pub fn idle_seconds(&self) -> f32 {
        self.idle
    }

    pub fn reset(&mut self) {
        self.idle = 0.0;
    }
}
