/// Outcome ledger: counts which rank each finished run was awarded.
///
/// Only the call surface lives here; where the counts are persisted is
/// up to the host's `OutcomeLedger` implementation.
use serde::{Deserialize, Serialize};

/// The rank awarded at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankId {
    Thinker,
    TechEnthusiast,
    Visionary,
    BridgeBuilder,
    Doubter,
    OpinionShaper,
    Individualist,
    Humanist,
}

impl RankId {
    pub const ALL: [RankId; 8] = [
        Self::Thinker,
        Self::TechEnthusiast,
        Self::Visionary,
        Self::BridgeBuilder,
        Self::Doubter,
        Self::OpinionShaper,
        Self::Individualist,
        Self::Humanist,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Aggregate counts returned after recording a rank, ready for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub rank: RankId,
    pub total: u32,
    pub today: u32,
    pub total_runs: u32,
    pub today_runs: u32,
    /// Share of all runs that ended in this rank, 0..=100.
    pub percent_total: f32,
    /// Share of today's runs that ended in this rank, 0..=100.
    pub percent_today: f32,
}

/// Records finished runs and reports aggregate counts.
pub trait OutcomeLedger {
    fn record(&mut self, rank: RankId) -> OutcomeStats;
}

/// A ledger that keeps everything in memory, with a manual day rollover.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    /// Day key, e.g. `"2026-10-16"`.
    pub date: String,
    pub total_runs: u32,
    pub today_runs: u32,
    totals: [u32; 8],
    today: [u32; 8],
}

impl InMemoryLedger {
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            ..Self::default()
        }
    }

    /// Switch to `date`. A new day carries totals over and resets today's counts.
    pub fn roll_day(&mut self, date: &str) {
        if self.date == date {
            return;
        }
        self.date = date.to_string();
        self.today_runs = 0;
        self.today = [0; 8];
    }

    pub fn total(&self, rank: RankId) -> u32 {
        self.totals[rank.index()]
    }

    pub fn today(&self, rank: RankId) -> u32 {
        self.today[rank.index()]
    }

    pub fn stats(&self, rank: RankId) -> OutcomeStats {
        OutcomeStats {
            rank,
            total: self.total(rank),
            today: self.today(rank),
            total_runs: self.total_runs,
            today_runs: self.today_runs,
            percent_total: percent(self.total(rank), self.total_runs),
            percent_today: percent(self.today(rank), self.today_runs),
        }
    }
}

impl OutcomeLedger for InMemoryLedger {
    fn record(&mut self, rank: RankId) -> OutcomeStats {
        self.total_runs += 1;
        self.today_runs += 1;
        self.totals[rank.index()] += 1;
        self.today[rank.index()] += 1;
        self.stats(rank)
    }
}

fn percent(count: u32, runs: u32) -> f32 {
    if runs == 0 {
        return 0.0;
    }
    count as f32 / runs as f32 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_and_percentages() {
        let mut ledger = InMemoryLedger::new("2026-10-16");
        ledger.record(RankId::Thinker);
        ledger.record(RankId::Doubter);
        ledger.record(RankId::Thinker);
        let stats = ledger.record(RankId::Humanist);

        assert_eq!(stats.total, 1);
        assert_eq!(stats.total_runs, 4);
        assert!((stats.percent_total - 25.0).abs() < 1e-4);

        let thinker = ledger.stats(RankId::Thinker);
        assert_eq!(thinker.today, 2);
        assert!((thinker.percent_today - 50.0).abs() < 1e-4);
    }

    #[test]
    fn roll_day_resets_today_only() {
        let mut ledger = InMemoryLedger::new("2026-10-16");
        ledger.record(RankId::Visionary);
        ledger.roll_day("2026-10-17");

        let stats = ledger.stats(RankId::Visionary);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.today, 0);
        assert_eq!(stats.today_runs, 0);
        assert_eq!(stats.percent_today, 0.0);
    }

    #[test]
    fn roll_same_day_is_noop() {
        let mut ledger = InMemoryLedger::new("2026-10-16");
        ledger.record(RankId::Individualist);
        ledger.roll_day("2026-10-16");
        assert_eq!(ledger.today(RankId::Individualist), 1);
    }

    #[test]
    fn empty_ledger_percentages_are_zero() {
        let ledger = InMemoryLedger::default();
        assert_eq!(ledger.stats(RankId::Thinker).percent_total, 0.0);
    }
}
