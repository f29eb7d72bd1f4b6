//! Human-readable report rendering for terminal output.
//!
//! Each interval is introduced by the two time ranges being compared, followed
//! by one line per change: labels in blue, hostnames in green and addresses in
//! yellow.
use colored::*;

use crate::diff::ChangeEntry;
use crate::engine::Report;
use crate::output::{TimeRange, line_of_addresses};
use crate::select::{Selection, TIME_FORMAT};
use crate::stats::report_statistics;

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

fn span(r: &TimeRange) -> String {
    format!(
        "{}{}{}",
        r.earliest.format(TIME_FORMAT).to_string().yellow(),
        " -> ".blue(),
        r.latest.format(TIME_FORMAT).to_string().yellow()
    )
}

pub fn render_change(change: &ChangeEntry) -> String {
    match change {
        ChangeEntry::Removed { name, addresses } | ChangeEntry::Found { name, addresses } => {
            format!(
                "{}{} {}",
                format!("{}: ", change.kind()).blue(),
                name.green(),
                line_of_addresses(addresses).yellow()
            )
        }
        ChangeEntry::Moved { name, from, to } => format!(
            "{}{}\n\t{}\t{}\n\t{}\t{}",
            "Moved: ".blue(),
            name.green(),
            " from ".blue(),
            line_of_addresses(from).yellow(),
            " to ".blue(),
            line_of_addresses(to).yellow()
        ),
    }
}

/// The change lines of every interval in `report`.
pub fn render_report(report: &Report) -> String {
    let mut out = section_header(&report.domain.bold().cyan().to_string());
    if report.selection.is_empty() {
        out.push_str(&format!(
            "{}\n",
            "(No enumerations include this domain)".dimmed()
        ));
        return out;
    }
    for interval in &report.intervals {
        out.push_str(&format!(
            "{}\t{}\n{}\t{}\n\n",
            "Between".blue(),
            span(&interval.earlier),
            "and".blue(),
            span(&interval.later)
        ));
        if interval.changes.is_empty() {
            out.push_str(&format!("{}\n", "(No changes)".dimmed()));
        }
        for c in &interval.changes {
            out.push_str(&render_change(c));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Numbered time ranges of the selected enumerations.
pub fn render_listing(domain: &str, selection: &Selection) -> String {
    let mut out = section_header(&domain.bold().cyan().to_string());
    if selection.is_empty() {
        out.push_str(&format!(
            "{}\n",
            "(No enumerations include this domain)".dimmed()
        ));
    }
    for (i, (_, r)) in selection.iter().enumerate() {
        out.push_str(
            &format!(
                "{}) {} -> {}",
                i + 1,
                r.earliest.format(TIME_FORMAT),
                r.latest.format(TIME_FORMAT)
            )
            .green()
            .to_string(),
        );
        out.push('\n');
    }
    out
}

/// Per-interval and total change counts.
pub fn render_summary(report: &Report) -> String {
    let (per, total) = report_statistics(report);
    let mut lines: Vec<String> = Vec::new();
    for (i, s) in per.iter().enumerate() {
        lines.push(format!("{}", format!("Interval {}", i + 1).bold().blue()));
        lines.push(format!("  Found: {}", s.found));
        lines.push(format!("  Removed: {}", s.removed));
        lines.push(format!("  Moved: {}", s.moved));
    }
    lines.push(format!("{}", "Total".bold().blue()));
    lines.push(format!("  Enumerations: {}", report.selection.len()));
    lines.push(format!("  Changes: {}", total.total()));
    lines.push(format!("  Found: {}", total.found));
    lines.push(format!("  Removed: {}", total.removed));
    lines.push(format!("  Moved: {}", total.moved));

    let mut out = section_header(&"Change Summary".bold().yellow().to_string());
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}
