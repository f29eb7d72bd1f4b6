//! Export helpers for writing tracking results to CSV and plain text files.
//!
//! - `save_changes_csv` writes one row per change with the compared ranges.
//! - `save_changes_txt` writes the uncolored change lines grouped by interval.
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use csv::Writer;

use crate::diff::ChangeEntry;
use crate::engine::Report;
use crate::output::line_of_addresses;
use crate::select::TIME_FORMAT;

fn ts(t: &chrono::DateTime<chrono::Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

pub fn save_changes_csv<P: AsRef<Path>>(reports: &[Report], path: P) -> Result<()> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record([
        "Domain",
        "Earlier",
        "Later",
        "Change",
        "Name",
        "Addresses",
        "NewAddresses",
    ])?;
    for report in reports {
        for interval in &report.intervals {
            let earlier = format!(
                "{} -> {}",
                ts(&interval.earlier.earliest),
                ts(&interval.earlier.latest)
            );
            let later = format!(
                "{} -> {}",
                ts(&interval.later.earliest),
                ts(&interval.later.latest)
            );
            for c in &interval.changes {
                let (addrs, new_addrs) = match c {
                    ChangeEntry::Removed { addresses, .. } | ChangeEntry::Found { addresses, .. } => {
                        (line_of_addresses(addresses), String::new())
                    }
                    ChangeEntry::Moved { from, to, .. } => {
                        (line_of_addresses(from), line_of_addresses(to))
                    }
                };
                wtr.write_record([
                    report.domain.as_str(),
                    earlier.as_str(),
                    later.as_str(),
                    c.kind(),
                    c.name(),
                    addrs.as_str(),
                    new_addrs.as_str(),
                ])?;
            }
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_changes_txt<P: AsRef<Path>>(reports: &[Report], path: P) -> Result<()> {
    let mut f = File::create(path)?;
    for report in reports {
        for interval in &report.intervals {
            writeln!(
                f,
                "{}: between {} -> {} and {} -> {}",
                report.domain,
                ts(&interval.earlier.earliest),
                ts(&interval.earlier.latest),
                ts(&interval.later.earliest),
                ts(&interval.later.latest)
            )?;
            for c in &interval.changes {
                writeln!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
    }
    Ok(())
}
