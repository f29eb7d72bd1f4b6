//! Scope filtering of enumeration output.
//!
//! A hostname is in scope when it ends with the requested domain as a plain
//! string suffix. There is no label-boundary check, so `badexample.com` is in
//! scope for `example.com`.
use std::collections::HashMap;

use log::debug;

use crate::output::OutputRecord;
use crate::store::{SnapshotStore, StoreError};

pub fn in_scope(name: &str, domain: &str) -> bool {
    name.ends_with(domain)
}

/// Output of `enum_id` restricted to hostnames in scope for `domain`, read in
/// cached mode. A hostname recorded more than once keeps its first position
/// and the addresses of its last record.
pub fn scoped_output<S: SnapshotStore>(
    store: &S,
    domain: &str,
    enum_id: &str,
) -> Result<Vec<OutputRecord>, StoreError> {
    let output = store.output_of(enum_id, true)?;
    let total = output.len();
    let scoped = last_write_wins(output.into_iter().filter(|o| in_scope(&o.name, domain)));
    debug!(
        "{}: {} of {} records in scope for {}",
        enum_id,
        scoped.len(),
        total,
        domain
    );
    Ok(scoped)
}

fn last_write_wins(records: impl Iterator<Item = OutputRecord>) -> Vec<OutputRecord> {
    let mut out: Vec<OutputRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for rec in records {
        match index.get(&rec.name) {
            Some(&i) => out[i] = rec,
            None => {
                index.insert(rec.name.clone(), out.len());
                out.push(rec);
            }
        }
    }
    out
}
