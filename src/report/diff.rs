/// One line of a rendered diff between two message lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEdit<'a> {
    Added(&'a str),
    Removed(&'a str),
}

/// Minimal insert/delete script between two sorted sequences. Both inputs
/// must be sorted; equal runs are consumed pairwise, so an element present on
/// both sides never produces a spurious remove/add pair.
pub fn diff_sorted<'a>(from: &[&'a str], to: &[&'a str]) -> Vec<DiffEdit<'a>> {
    let mut edits = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < from.len() && j < to.len() {
        match from[i].cmp(to[j]) {
            std::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                edits.push(DiffEdit::Removed(from[i]));
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                edits.push(DiffEdit::Added(to[j]));
                j += 1;
            }
        }
    }

    while i < from.len() {
        edits.push(DiffEdit::Removed(from[i]));
        i += 1;
    }
    while j < to.len() {
        edits.push(DiffEdit::Added(to[j]));
        j += 1;
    }

    edits
}
