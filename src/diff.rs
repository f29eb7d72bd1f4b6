//! Pairwise comparison of two scoped enumeration outputs.
//!
//! [`diff`] reports hostnames that disappeared ([`ChangeEntry::Removed`]),
//! changed addresses ([`ChangeEntry::Moved`]) or appeared
//! ([`ChangeEntry::Found`]). Removed and Moved entries come first in the
//! earlier output's order, then Found entries in the later output's order.
//!
//! Address lists are compared with [`AddressMatch::Containment`] by default:
//! the old list counts as unchanged when each of its addresses is still
//! present, even if new addresses were added.
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::output::{AddressInfo, AddressLine, OutputRecord};

/// One difference between two enumerations.
#[derive(Debug, Clone)]
pub enum ChangeEntry {
    Removed {
        name: String,
        addresses: Vec<AddressInfo>,
    },
    Found {
        name: String,
        addresses: Vec<AddressInfo>,
    },
    Moved {
        name: String,
        from: Vec<AddressInfo>,
        to: Vec<AddressInfo>,
    },
}

impl ChangeEntry {
    pub fn name(&self) -> &str {
        match self {
            ChangeEntry::Removed { name, .. }
            | ChangeEntry::Found { name, .. }
            | ChangeEntry::Moved { name, .. } => name,
        }
    }

    /// Short label used in listings and exports.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEntry::Removed { .. } => "Removed",
            ChangeEntry::Found { .. } => "Found",
            ChangeEntry::Moved { .. } => "Moved",
        }
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEntry::Removed { name, addresses } | ChangeEntry::Found { name, addresses } => {
                write!(f, "{}: {}", self.kind(), name)?;
                if !addresses.is_empty() {
                    write!(f, " {}", AddressLine(addresses))?;
                }
                Ok(())
            }
            ChangeEntry::Moved { name, from, to } => write!(
                f,
                "Moved: {} from {} to {}",
                name,
                AddressLine(from),
                AddressLine(to)
            ),
        }
    }
}

/// How two address lists of the same hostname are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressMatch {
    /// Unchanged when the old addresses are a subset of the new ones.
    #[default]
    Containment,
    /// Unchanged only when both lists hold the same addresses.
    Exact,
}

impl AddressMatch {
    pub fn unchanged(self, old: &[AddressInfo], new: &[AddressInfo]) -> bool {
        match self {
            AddressMatch::Containment => is_subset_of(old, new),
            AddressMatch::Exact => is_subset_of(old, new) && is_subset_of(new, old),
        }
    }
}

/// Every address in `a` is also present in `b`.
pub fn is_subset_of(a: &[AddressInfo], b: &[AddressInfo]) -> bool {
    a.iter().all(|x| b.iter().any(|y| x.same_address(y)))
}

/// Compare two outputs for `domain` using [`AddressMatch::Containment`].
pub fn diff(domain: &str, earlier: &[OutputRecord], later: &[OutputRecord]) -> Vec<ChangeEntry> {
    diff_with(domain, earlier, later, AddressMatch::default())
}

/// Compare two outputs for `domain`. Both outputs are expected to be scoped to
/// the domain already; when a hostname repeats within one output, its last
/// record is the one compared against.
pub fn diff_with(
    domain: &str,
    earlier: &[OutputRecord],
    later: &[OutputRecord],
    matching: AddressMatch,
) -> Vec<ChangeEntry> {
    let before: HashMap<&str, &OutputRecord> =
        earlier.iter().map(|o| (o.name.as_str(), o)).collect();
    let after: HashMap<&str, &OutputRecord> =
        later.iter().map(|o| (o.name.as_str(), o)).collect();

    let mut handled: HashSet<&str> = HashSet::new();
    let mut changes = Vec::new();
    for o in earlier {
        handled.insert(o.name.as_str());
        match after.get(o.name.as_str()) {
            None => changes.push(ChangeEntry::Removed {
                name: o.name.clone(),
                addresses: o.addresses.clone(),
            }),
            Some(o2) if !matching.unchanged(&o.addresses, &o2.addresses) => {
                changes.push(ChangeEntry::Moved {
                    name: o.name.clone(),
                    from: o.addresses.clone(),
                    to: o2.addresses.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for o in later {
        if handled.contains(o.name.as_str()) || before.contains_key(o.name.as_str()) {
            continue;
        }
        changes.push(ChangeEntry::Found {
            name: o.name.clone(),
            addresses: o.addresses.clone(),
        });
    }
    log::debug!(
        "{}: {} changes between {} and {} records",
        domain,
        changes.len(),
        earlier.len(),
        later.len()
    );
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn rec(name: &str, ips: &[&str]) -> OutputRecord {
        let ips: Vec<IpAddr> = ips.iter().map(|s| s.parse().unwrap()).collect();
        OutputRecord::with_ips(name, &ips)
    }

    fn lines(changes: &[ChangeEntry]) -> String {
        changes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn same_output_has_no_changes() {
        let s = vec![
            rec("a.example.com", &["1.1.1.1"]),
            rec("b.example.com", &["2.2.2.2", "3.3.3.3"]),
            rec("c.example.com", &[]),
        ];
        assert!(diff("example.com", &s, &s).is_empty());
        assert!(diff_with("example.com", &s, &s, AddressMatch::Exact).is_empty());
    }

    #[test]
    fn new_hostname_is_found() {
        let a = vec![rec("a", &["1.1.1.1"])];
        let b = vec![rec("a", &["1.1.1.1"]), rec("b", &["2.2.2.2"])];
        let d = diff("d", &a, &b);
        assert_eq!(d.len(), 1);
        assert!(matches!(&d[0], ChangeEntry::Found { name, .. } if name == "b"));
    }

    #[test]
    fn missing_hostname_is_removed() {
        let a = vec![rec("a", &["1.1.1.1"]), rec("c", &["3.3.3.3"])];
        let b = vec![rec("a", &["1.1.1.1"])];
        let d = diff("d", &a, &b);
        assert_eq!(d.len(), 1);
        assert!(matches!(&d[0], ChangeEntry::Removed { name, .. } if name == "c"));
    }

    #[test]
    fn added_address_is_not_a_move() {
        let a = vec![rec("a", &["1.1.1.1"])];
        let b = vec![rec("a", &["1.1.1.1", "9.9.9.9"])];
        assert!(diff("d", &a, &b).is_empty());
        // the reverse direction drops 9.9.9.9, which is a move
        assert_eq!(diff("d", &b, &a).len(), 1);
        // symmetric comparison reports both directions
        assert_eq!(diff_with("d", &a, &b, AddressMatch::Exact).len(), 1);
    }

    #[test]
    fn replaced_address_is_a_move() {
        let a = vec![rec("a", &["1.1.1.1"])];
        let b = vec![rec("a", &["9.9.9.9"])];
        let d = diff("d", &a, &b);
        assert_eq!(d.len(), 1);
        match &d[0] {
            ChangeEntry::Moved { name, from, to } => {
                assert_eq!(name, "a");
                assert_eq!(from[0].address, "1.1.1.1".parse::<IpAddr>().unwrap());
                assert_eq!(to[0].address, "9.9.9.9".parse::<IpAddr>().unwrap());
            }
            other => panic!("expected a move, got {other:?}"),
        }
    }

    #[test]
    fn address_order_does_not_matter() {
        let a = vec![rec("a", &["1.1.1.1", "2.2.2.2"])];
        let b = vec![rec("a", &["2.2.2.2", "::ffff:1.1.1.1"])];
        assert!(diff_with("d", &a, &b, AddressMatch::Exact).is_empty());
    }

    #[test]
    fn emission_order() {
        let a = vec![
            rec("gone1.example.com", &["1.1.1.1"]),
            rec("moved.example.com", &["2.2.2.2"]),
            rec("same.example.com", &["3.3.3.3"]),
            rec("gone2.example.com", &[]),
        ];
        let b = vec![
            rec("new2.example.com", &["5.5.5.5", "6.6.6.6"]),
            rec("same.example.com", &["3.3.3.3"]),
            rec("moved.example.com", &["4.4.4.4"]),
            rec("new1.example.com", &["7.7.7.7"]),
        ];
        insta::assert_snapshot!(lines(&diff("example.com", &a, &b)), @r"
        Removed: gone1.example.com 1.1.1.1
        Moved: moved.example.com from 2.2.2.2 to 4.4.4.4
        Removed: gone2.example.com
        Found: new2.example.com 5.5.5.5,6.6.6.6
        Found: new1.example.com 7.7.7.7
        ");
    }

    #[test]
    fn duplicate_names_compare_against_last_record() {
        let a = vec![rec("a", &["1.1.1.1"])];
        let b = vec![rec("a", &["9.9.9.9"]), rec("a", &["1.1.1.1"])];
        assert!(diff("d", &a, &b).is_empty());
        let b = vec![rec("a", &["1.1.1.1"]), rec("a", &["9.9.9.9"])];
        assert_eq!(diff("d", &a, &b).len(), 1);
    }

    #[test]
    fn subset_predicate() {
        let x = rec("x", &["1.1.1.1"]).addresses;
        let xy = rec("x", &["1.1.1.1", "2.2.2.2"]).addresses;
        assert!(is_subset_of(&x, &xy));
        assert!(!is_subset_of(&xy, &x));
        assert!(is_subset_of(&[], &x));
    }
}
