//! Engine: drives a tracking report. Selects the enumerations for a domain,
//! then walks them pairwise in chronological order, scoping each output to the
//! domain and diffing it against the previous one.
//!
//! Typical usage:
//!
//! ```no_run
//! use enumtrack::engine::{TrackConfig, Tracker};
//! use enumtrack::store::DirStore;
//! # fn main() -> anyhow::Result<()> {
//! let tracker = Tracker::new(DirStore::open("enumerations")?);
//! let report = tracker.run(&TrackConfig::new("example.com"))?;
//! print!("{}", enumtrack::report::render_report(&report));
//! # Ok(())
//! # }
//! ```
use anyhow::{Context, Result};
use log::info;

use crate::diff::{AddressMatch, ChangeEntry, diff_with};
use crate::output::{OutputRecord, TimeRange};
use crate::scope::scoped_output;
use crate::select::{Selection, WindowPolicy, select};
use crate::store::SnapshotStore;

/// Everything one report run needs besides the store.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub domain: String,
    pub policy: WindowPolicy,
    pub matching: AddressMatch,
}

impl TrackConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            policy: WindowPolicy::default(),
            matching: AddressMatch::default(),
        }
    }

    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Changes between two consecutive enumerations.
#[derive(Debug, Clone)]
pub struct Interval {
    pub earlier: TimeRange,
    pub later: TimeRange,
    pub changes: Vec<ChangeEntry>,
}

/// Result of tracking one domain.
#[derive(Debug, Clone)]
pub struct Report {
    pub domain: String,
    pub selection: Selection,
    pub intervals: Vec<Interval>,
}

/// Runs reports against a snapshot store.
#[derive(Debug)]
pub struct Tracker<S> {
    store: S,
}

impl<S: SnapshotStore> Tracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The ordered, windowed enumerations for `cfg`.
    pub fn select(&self, cfg: &TrackConfig) -> Result<Selection, crate::select::SelectError> {
        select(&self.store, &cfg.domain, cfg.policy)
    }

    /// Select enumerations and diff every adjacent pair, oldest first.
    pub fn run(&self, cfg: &TrackConfig) -> Result<Report> {
        let selection = self.select(cfg)?;
        info!(
            "{}: tracking {} enumerations",
            cfg.domain,
            selection.len()
        );
        let intervals = self.intervals(cfg, &selection)?;
        Ok(Report {
            domain: cfg.domain.clone(),
            selection,
            intervals,
        })
    }

    fn intervals(&self, cfg: &TrackConfig, selection: &Selection) -> Result<Vec<Interval>> {
        let mut intervals = Vec::with_capacity(selection.len().saturating_sub(1));
        let mut prev: Option<(TimeRange, Vec<OutputRecord>)> = None;
        for (id, range) in selection.iter() {
            let out = scoped_output(&self.store, &cfg.domain, id)
                .with_context(|| format!("load enumeration {}", id))?;
            if let Some((prev_range, prev_out)) = &prev {
                intervals.push(Interval {
                    earlier: *prev_range,
                    later: range,
                    changes: diff_with(&cfg.domain, prev_out, &out, cfg.matching),
                });
            }
            prev = Some((range, out));
        }
        Ok(intervals)
    }
}
