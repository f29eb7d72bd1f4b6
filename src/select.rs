//! Enumeration selection: domain membership, chronological ordering and the
//! windowing policy (last N, all, or since a start time).
//!
//! Ordering uses the tracker's precedence rule: `a` goes before `b` when `b`
//! ends later than `a` or `a` starts earlier than `b`. The rule is not a strict
//! weak ordering once ranges overlap irregularly, so ordering is done with a
//! stable insertion sort. When one range contains the other both precede each
//! other; that pair is ranked by end time, then start time, so the result does
//! not depend on store order. Results are chronological for disjoint or
//! well-nested ranges and re-sorting a sorted list leaves it unchanged.
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::debug;

use crate::output::{EnumerationId, TimeRange};
use crate::store::{SnapshotStore, StoreError};

/// Display format for enumeration timestamps, e.g. `01/02 15:04:05 2006 UTC`.
pub const TIME_FORMAT: &str = "%m/%d %H:%M:%S %Y %Z";
/// Human-readable form of the accepted start timestamp format.
pub const START_FORMAT_HINT: &str = "01/02 15:04:05 2006 UTC";
/// Fewest enumerations a tracking window can hold.
pub const MIN_LAST: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("{requested} enumerations are not available ({available} found)")]
    InsufficientData { requested: usize, available: usize },
    #[error("invalid window: {0}")]
    InvalidPolicy(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which part of the ordered enumerations a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// The final `n` enumerations; `n` below 2 is raised to 2.
    LastN(usize),
    All,
    /// Enumerations from the first one not starting before the timestamp.
    Since(DateTime<Utc>),
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy::LastN(MIN_LAST)
    }
}

impl WindowPolicy {
    /// Build a policy from raw command-line values. At most one mode may be
    /// given; with none, the last two enumerations are used.
    pub fn from_options(
        last: Option<usize>,
        all: bool,
        start: Option<&str>,
    ) -> Result<Self, SelectError> {
        match (last, all, start) {
            (_, _, Some(_)) if last.is_some() || all => Err(SelectError::InvalidPolicy(
                "the start option cannot be used with the last or all options".into(),
            )),
            (Some(_), true, None) => Err(SelectError::InvalidPolicy(
                "the last and all options are mutually exclusive".into(),
            )),
            (None, false, Some(s)) => Ok(WindowPolicy::Since(parse_start(s)?)),
            (Some(n), false, None) => Ok(WindowPolicy::LastN(n)),
            (None, true, None) => Ok(WindowPolicy::All),
            _ => Ok(WindowPolicy::default()),
        }
    }
}

/// Parse a start timestamp in `MM/DD hh:mm:ss YYYY ZONE` form, where the zone
/// is a numeric offset or an abbreviation. Abbreviations (`UTC`, `MST`, ...)
/// carry no offset and are read as UTC. RFC 3339 is accepted too.
pub fn parse_start(input: &str) -> Result<DateTime<Utc>, SelectError> {
    let s = input.trim();
    let bad = || {
        SelectError::InvalidPolicy(format!(
            "{:?} is not in the correct format: {}",
            s, START_FORMAT_HINT
        ))
    };
    if s.is_empty() {
        return Err(bad());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let (stamp, zone) = s.rsplit_once(' ').ok_or_else(bad)?;
    match zone {
        z if !z.is_empty() && z.chars().all(|c| c.is_ascii_alphabetic()) => {
            let naive = NaiveDateTime::parse_from_str(stamp.trim(), "%m/%d %H:%M:%S %Y")
                .map_err(|_| bad())?;
            Ok(Utc.from_utc_datetime(&naive))
        }
        _ => DateTime::parse_from_str(s, "%m/%d %H:%M:%S %Y %z")
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| bad()),
    }
}

/// Ordered enumerations chosen for one report, with their time ranges in
/// parallel arrays of equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<EnumerationId>,
    earliest: Vec<DateTime<Utc>>,
    latest: Vec<DateTime<Utc>>,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[EnumerationId] {
        &self.ids
    }

    pub fn earliest(&self) -> &[DateTime<Utc>] {
        &self.earliest
    }

    pub fn latest(&self) -> &[DateTime<Utc>] {
        &self.latest
    }

    pub fn range(&self, i: usize) -> Option<TimeRange> {
        Some(TimeRange::new(*self.earliest.get(i)?, *self.latest.get(i)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TimeRange)> + '_ {
        self.ids
            .iter()
            .zip(self.earliest.iter().zip(&self.latest))
            .map(|(id, (e, l))| (id.as_str(), TimeRange::new(*e, *l)))
    }

    fn from_ordered(ordered: &[(EnumerationId, TimeRange)]) -> Self {
        Self {
            ids: ordered.iter().map(|(id, _)| id.clone()).collect(),
            earliest: ordered.iter().map(|(_, r)| r.earliest).collect(),
            latest: ordered.iter().map(|(_, r)| r.latest).collect(),
        }
    }
}

/// Whether `a` is placed before `b`.
pub fn precedes(a: &TimeRange, b: &TimeRange) -> bool {
    b.latest > a.latest || a.earliest < b.earliest
}

/// Whether `a` must be moved ahead of `b`. Asymmetric: at most one of
/// `goes_before(a, b)` and `goes_before(b, a)` holds.
fn goes_before(a: &TimeRange, b: &TimeRange) -> bool {
    match (precedes(a, b), precedes(b, a)) {
        (true, false) => true,
        // nested ranges
        (true, true) => (a.latest, a.earliest) < (b.latest, b.earliest),
        _ => false,
    }
}

/// Stable in-place chronological ordering of `items` by their time range.
/// Nested ranges are ranked by end time, then start time; identical ranges
/// keep their input order.
pub fn order_chronologically<T>(items: &mut [T], range: impl Fn(&T) -> TimeRange) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && goes_before(&range(&items[j]), &range(&items[j - 1])) {
            items.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Select the enumerations covering `domain` and apply `policy`.
///
/// Membership is an exact match against the enumeration's domain list. A
/// domain no enumeration covers yields an empty selection for every policy.
pub fn select<S: SnapshotStore>(
    store: &S,
    domain: &str,
    policy: WindowPolicy,
) -> Result<Selection, SelectError> {
    let mut candidates: Vec<(EnumerationId, TimeRange)> = Vec::new();
    for id in store.list_enumerations()? {
        if !store.domains_of(&id)?.iter().any(|d| d == domain) {
            continue;
        }
        let range = store.date_range_of(&id)?;
        candidates.push((id, range));
    }
    debug!("{} enumerations include {}", candidates.len(), domain);
    if candidates.is_empty() {
        return Ok(Selection::default());
    }

    order_chronologically(&mut candidates, |(_, r)| *r);

    let begin = match policy {
        WindowPolicy::Since(start) => candidates
            .iter()
            .take_while(|(_, r)| r.earliest < start)
            .count(),
        WindowPolicy::LastN(n) => {
            let n = n.max(MIN_LAST);
            if candidates.len() < n {
                return Err(SelectError::InsufficientData {
                    requested: n,
                    available: candidates.len(),
                });
            }
            candidates.len() - n
        }
        WindowPolicy::All => {
            if candidates.len() < MIN_LAST {
                return Err(SelectError::InsufficientData {
                    requested: MIN_LAST,
                    available: candidates.len(),
                });
            }
            0
        }
    };
    debug!(
        "window {:?} keeps {} of {}",
        policy,
        candidates.len() - begin,
        candidates.len()
    );
    Ok(Selection::from_ordered(&candidates[begin..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn range(a: i64, b: i64) -> TimeRange {
        TimeRange::new(ts(a), ts(b))
    }

    /// Four runs for example.com inserted out of order, plus one for another
    /// domain and one that only covers a subdomain.
    fn store() -> MemoryStore {
        let mut s = MemoryStore::new();
        s.insert("c", &["example.com"], range(300, 350), vec![])
            .insert("a", &["example.com", "other.org"], range(100, 150), vec![])
            .insert("x", &["other.org"], range(50, 60), vec![])
            .insert("d", &["example.com"], range(400, 450), vec![])
            .insert("sub", &["dev.example.com"], range(500, 550), vec![])
            .insert("b", &["example.com"], range(200, 250), vec![]);
        s
    }

    #[test]
    fn orders_disjoint_ranges_chronologically() {
        let sel = select(&store(), "example.com", WindowPolicy::All).unwrap();
        assert_eq!(sel.ids(), ["a", "b", "c", "d"]);
        assert_eq!(sel.earliest(), [ts(100), ts(200), ts(300), ts(400)]);
        assert_eq!(sel.latest(), [ts(150), ts(250), ts(350), ts(450)]);
        assert_eq!(sel.range(1), Some(range(200, 250)));
        assert_eq!(sel.range(4), None);
    }

    #[test]
    fn last_n_keeps_the_tail() {
        let s = store();
        for n in 2..=4 {
            let sel = select(&s, "example.com", WindowPolicy::LastN(n)).unwrap();
            let all = ["a", "b", "c", "d"];
            assert_eq!(sel.ids(), &all[4 - n..]);
            assert_eq!(sel.earliest().len(), n);
            assert_eq!(sel.latest().len(), n);
        }
    }

    #[test]
    fn last_n_below_two_is_clamped() {
        let sel = select(&store(), "example.com", WindowPolicy::LastN(0)).unwrap();
        assert_eq!(sel.ids(), ["c", "d"]);
    }

    #[test]
    fn last_n_beyond_available_is_insufficient() {
        let err = select(&store(), "example.com", WindowPolicy::LastN(5)).unwrap_err();
        assert!(matches!(
            err,
            SelectError::InsufficientData {
                requested: 5,
                available: 4
            }
        ));
    }

    #[test]
    fn all_needs_two_enumerations() {
        let err = select(&store(), "dev.example.com", WindowPolicy::All).unwrap_err();
        assert!(matches!(err, SelectError::InsufficientData { .. }));
    }

    #[test]
    fn since_drops_earlier_runs() {
        let s = store();
        let sel = select(&s, "example.com", WindowPolicy::Since(ts(200))).unwrap();
        assert_eq!(sel.ids(), ["b", "c", "d"]);
        let sel = select(&s, "example.com", WindowPolicy::Since(ts(201))).unwrap();
        assert_eq!(sel.ids(), ["c", "d"]);
        let sel = select(&s, "example.com", WindowPolicy::Since(ts(1000))).unwrap();
        assert!(sel.is_empty());
    }

    #[test]
    fn membership_is_exact() {
        let s = store();
        let sel = select(&s, "dev.example.com", WindowPolicy::Since(ts(0))).unwrap();
        assert_eq!(sel.ids(), ["sub"]);
        let sel = select(&s, "xample.com", WindowPolicy::LastN(2)).unwrap();
        assert!(sel.is_empty());
    }

    #[test]
    fn unknown_domain_yields_empty_selection() {
        for policy in [
            WindowPolicy::LastN(2),
            WindowPolicy::All,
            WindowPolicy::Since(ts(0)),
        ] {
            let sel = select(&store(), "nowhere.net", policy).unwrap();
            assert!(sel.is_empty());
        }
    }

    #[test]
    fn nested_ranges_rank_by_end_time() {
        // long run started first but ended last
        for items in [
            vec![("long", range(0, 1000)), ("short", range(10, 20))],
            vec![("short", range(10, 20)), ("long", range(0, 1000))],
        ] {
            let mut items = items;
            order_chronologically(&mut items, |(_, r)| *r);
            let ids: Vec<_> = items.iter().map(|(id, _)| *id).collect();
            assert_eq!(ids, vec!["short", "long"]);
        }

        let mut nested = vec![("b", range(10, 20)), ("a", range(10, 30))];
        order_chronologically(&mut nested, |(_, r)| *r);
        assert_eq!(nested[0].0, "b");
        assert_eq!(nested[1].0, "a");
    }

    #[test]
    fn nested_selection_ignores_store_order() {
        let mut outer_first = MemoryStore::new();
        outer_first
            .insert("outer", &["example.com"], range(0, 1000), vec![])
            .insert("inner", &["example.com"], range(10, 20), vec![]);
        let mut inner_first = MemoryStore::new();
        inner_first
            .insert("inner", &["example.com"], range(10, 20), vec![])
            .insert("outer", &["example.com"], range(0, 1000), vec![]);
        let a = select(&outer_first, "example.com", WindowPolicy::All).unwrap();
        let b = select(&inner_first, "example.com", WindowPolicy::All).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.ids(), ["inner", "outer"]);
    }

    #[test]
    fn identical_ranges_keep_store_order() {
        let mut items = vec![("y", range(5, 6)), ("x", range(5, 6)), ("w", range(1, 2))];
        order_chronologically(&mut items, |(_, r)| *r);
        let ids: Vec<_> = items.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["w", "y", "x"]);
    }

    #[test]
    fn policy_from_options() {
        assert_eq!(
            WindowPolicy::from_options(None, false, None).unwrap(),
            WindowPolicy::LastN(2)
        );
        assert_eq!(
            WindowPolicy::from_options(Some(5), false, None).unwrap(),
            WindowPolicy::LastN(5)
        );
        assert_eq!(
            WindowPolicy::from_options(None, true, None).unwrap(),
            WindowPolicy::All
        );
        assert_eq!(
            WindowPolicy::from_options(None, false, Some("01/02 15:04:05 2006 UTC")).unwrap(),
            WindowPolicy::Since(Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap())
        );
        for (last, all, start) in [
            (Some(3), false, Some("01/02 15:04:05 2006 UTC")),
            (None, true, Some("01/02 15:04:05 2006 UTC")),
            (Some(3), true, None),
            (None, false, Some("yesterday")),
            (None, false, Some("")),
        ] {
            assert!(matches!(
                WindowPolicy::from_options(last, all, start),
                Err(SelectError::InvalidPolicy(_))
            ));
        }
    }

    #[test]
    fn parse_start_formats() {
        let want = Utc.with_ymd_and_hms(2019, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(parse_start("03/04 05:06:07 2019 UTC").unwrap(), want);
        assert_eq!(parse_start("03/04 05:06:07 2019 GMT").unwrap(), want);
        assert_eq!(parse_start("03/04 07:06:07 2019 +0200").unwrap(), want);
        assert_eq!(parse_start("2019-03-04T05:06:07Z").unwrap(), want);
        assert_eq!(parse_start("03/04 05:06:07 2019 MST").unwrap(), want);
        assert!(parse_start("03/04 05:06:07 2019 M5T").is_err());
        assert!(parse_start("13/04 05:06:07 2019 UTC").is_err());
    }

    #[test]
    fn formats_with_time_format() {
        let t = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(t.format(TIME_FORMAT).to_string(), "01/02 15:04:05 2006 UTC");
    }
}
