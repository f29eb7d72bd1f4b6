//! Change counts per interval and across a whole report.
use crate::diff::ChangeEntry;
use crate::engine::Report;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeStats {
    pub found: usize,
    pub removed: usize,
    pub moved: usize,
}

impl ChangeStats {
    pub fn total(&self) -> usize {
        self.found + self.removed + self.moved
    }

    fn add(&mut self, other: &ChangeStats) {
        self.found += other.found;
        self.removed += other.removed;
        self.moved += other.moved;
    }
}

pub fn count_changes(changes: &[ChangeEntry]) -> ChangeStats {
    let mut s = ChangeStats::default();
    for c in changes {
        match c {
            ChangeEntry::Found { .. } => s.found += 1,
            ChangeEntry::Removed { .. } => s.removed += 1,
            ChangeEntry::Moved { .. } => s.moved += 1,
        }
    }
    s
}

/// Counts for each interval, in report order, plus their sum.
pub fn report_statistics(report: &Report) -> (Vec<ChangeStats>, ChangeStats) {
    let per: Vec<ChangeStats> = report
        .intervals
        .iter()
        .map(|i| count_changes(&i.changes))
        .collect();
    let mut total = ChangeStats::default();
    for s in &per {
        total.add(s);
    }
    (per, total)
}
