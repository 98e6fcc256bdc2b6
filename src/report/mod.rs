pub mod diff;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::range::{Observation, RangeBuilder};
use crate::report::diff::{DiffEdit, diff_sorted};

/// Message sets per file for one revision, sorted on both levels so report
/// output and diff input are deterministic.
pub type MessagesByFile = BTreeMap<String, BTreeSet<String>>;

pub fn group_by_revision(observations: &[Observation]) -> HashMap<String, MessagesByFile> {
    let mut by_revision: HashMap<String, MessagesByFile> = HashMap::new();
    for observation in observations {
        by_revision
            .entry(observation.revision.clone())
            .or_default()
            .entry(observation.filename.clone())
            .or_default()
            .insert(observation.message.clone());
    }
    by_revision
}

/// Add/delete/modify lines between two revisions' message sets. Files only in
/// `to` are reported added, files only in `from` deleted; common files get a
/// diff of their sorted message lists, with the filename header emitted only
/// when the file actually changed.
pub fn compare_revisions(from: &MessagesByFile, to: &MessagesByFile) -> Vec<String> {
    let mut lines = Vec::new();

    for (file, messages) in to {
        if from.contains_key(file) {
            continue;
        }
        lines.push(format!("{file} (file added)"));
        for message in messages {
            lines.push(format!("+ {message}"));
        }
    }

    for (file, messages) in from {
        if to.contains_key(file) {
            continue;
        }
        lines.push(format!("{file} (file deleted)"));
        for message in messages {
            lines.push(format!("- {message}"));
        }
    }

    for (file, from_messages) in from {
        let Some(to_messages) = to.get(file) else {
            continue;
        };
        let from_sorted: Vec<&str> = from_messages.iter().map(String::as_str).collect();
        let to_sorted: Vec<&str> = to_messages.iter().map(String::as_str).collect();

        let mut file_printed = false;
        for edit in diff_sorted(&from_sorted, &to_sorted) {
            if !file_printed {
                lines.push(file.clone());
                file_printed = true;
            }
            match edit {
                DiffEdit::Added(message) => lines.push(format!("+ {message}")),
                DiffEdit::Removed(message) => lines.push(format!("- {message}")),
            }
        }
    }

    lines
}

/// Pairwise evolution across the declared revision sequence, one block per
/// adjacent pair in checkout order. A revision with no observations compares
/// as an empty set.
pub fn evolution_report(
    sequence: &[String],
    by_revision: &HashMap<String, MessagesByFile>,
) -> Vec<String> {
    let empty = MessagesByFile::new();
    let mut lines = Vec::new();

    for pair in sequence.windows(2) {
        let from = by_revision.get(&pair[0]).unwrap_or(&empty);
        let to = by_revision.get(&pair[1]).unwrap_or(&empty);
        lines.push(String::new());
        lines.push(format!("=== {} -> {} ===", pair[0], pair[1]));
        lines.extend(compare_revisions(from, to));
    }

    lines
}

/// Every (filename, message) key sorted, grouped under its filename, with the
/// resolved revision range.
pub fn range_report(builder: &RangeBuilder) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_file = "";

    for key in builder.sorted_keys() {
        let Some(range) = builder.get(key) else {
            continue;
        };
        if key.filename != current_file {
            current_file = &key.filename;
            lines.push(key.filename.clone());
        }
        lines.push(format!("  {range}: {}", key.message));
    }

    lines
}
