/// Typewriter: reveals a line one character at a time at a fixed rate.

/// Reveal state for a single line.
///
/// The empty prefix is shown first; every `1 / cps` seconds one more
/// character appears, and the writer finishes one interval after the last
/// character, so a line of `n` characters takes `(n + 1) / cps` seconds.
#[derive(Debug, Clone)]
pub struct Typewriter {
    chars: Vec<char>,
    revealed: usize,
    interval: f32,
    timer: f32,
    finished: bool,
}

impl Typewriter {
    /// `cps` below 1 is treated as 1.
    pub fn new(text: &str, cps: f32) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self {
            finished: chars.is_empty(),
            chars,
            revealed: 0,
            interval: 1.0 / cps.max(1.0),
            timer: 0.0,
        }
    }

    /// Advance by `dt`, calling `on_reveal` for every character that appears.
    pub fn advance<F>(&mut self, dt: f32, mut on_reveal: F)
    where
        F: FnMut(char),
    {
        if self.finished {
            return;
        }
        self.timer += dt.max(0.0);
        while self.timer >= self.interval {
            self.timer -= self.interval;
            if self.revealed == self.chars.len() {
                self.finished = true;
                return;
            }
            let ch = self.chars[self.revealed];
            self.revealed += 1;
            on_reveal(ch);
        }
    }

    pub fn visible_text(&self) -> String {
        self.chars[..self.revealed].iter().collect()
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveals_one_char_per_interval() {
        let mut tw = Typewriter::new("abc", 4.0);
        let mut seen = Vec::new();
        tw.advance(0.25, |c| seen.push(c));
        assert_eq!(tw.visible_text(), "a");
        tw.advance(0.5, |c| seen.push(c));
        assert_eq!(tw.visible_text(), "abc");
        assert_eq!(seen, vec!['a', 'b', 'c']);
        assert!(!tw.is_finished());
        tw.advance(0.25, |_| {});
        assert!(tw.is_finished());
    }

    #[test]
    fn starts_empty() {
        let tw = Typewriter::new("hello", 45.0);
        assert_eq!(tw.visible_text(), "");
        assert!(!tw.is_finished());
    }

    #[test]
    fn empty_text_is_finished_immediately() {
        let tw = Typewriter::new("", 45.0);
        assert!(tw.is_finished());
    }

    #[test]
    fn handles_multibyte_characters() {
        let mut tw = Typewriter::new("Tür", 1.0);
        tw.advance(2.0, |_| {});
        assert_eq!(tw.visible_text(), "Tü");
    }

    #[test]
    fn low_rate_is_clamped() {
        let mut tw = Typewriter::new("ab", 0.0);
        tw.advance(1.0, |_| {});
        assert_eq!(tw.revealed(), 1);
    }
}
