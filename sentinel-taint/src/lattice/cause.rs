//! C4 — the cause-trail: an append-only, de-duplicated record of
//! `(line, taint-at-that-line, link-snapshot)` used to reconstruct a
//! human-readable source → sink chain for a diagnostic.

use sentinel_core::types::identifiers::FunctionId;

use crate::flags::FlagSet;
use crate::lattice::links::LinksSet;

#[derive(Debug, Clone, PartialEq)]
pub struct CauseEntry {
    pub line: u32,
    pub taint: FlagSet,
    pub links: LinksSet,
    pub description: String,
}

/// An ordered, de-duplicated list of cause-trail entries (§3.4).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CausedByLines {
    entries: Vec<CauseEntry>,
}

impl CausedByLines {
    pub fn new() -> CausedByLines {
        CausedByLines::default()
    }

    pub fn push(&mut self, entry: CauseEntry) {
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[CauseEntry] {
        &self.entries
    }

    /// Set-union, preserving the order of first occurrence: `self`'s entries
    /// first, then any of `other`'s not already present.
    pub fn merge(&self, other: &CausedByLines) -> CausedByLines {
        let mut result = self.clone();
        for entry in &other.entries {
            result.push(entry.clone());
        }
        result
    }

    /// Keeps only entries whose link-snapshot mentions `(func, param)`.
    pub fn filter_for_param(&self, func: FunctionId, param: usize) -> CausedByLines {
        let entries = self
            .entries
            .iter()
            .filter(|e| {
                e.links
                    .get(&func)
                    .map(|single| single.params.contains_key(&param))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        CausedByLines { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `(file:line) via description -> (file:line) via description -> ...`
    /// (§6 diagnostic format).
    pub fn render(&self, file: &str) -> String {
        self.entries
            .iter()
            .map(|e| format!("({file}:{}) via {}", e.line, e.description))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line: u32, desc: &str) -> CauseEntry {
        CauseEntry {
            line,
            taint: FlagSet::EMPTY,
            links: LinksSet::default(),
            description: desc.to_string(),
        }
    }

    #[test]
    fn merge_deduplicates_and_preserves_first_occurrence_order() {
        let mut a = CausedByLines::new();
        a.push(entry(1, "source"));
        a.push(entry(2, "assignment"));
        let mut b = CausedByLines::new();
        b.push(entry(2, "assignment"));
        b.push(entry(3, "sink"));
        let merged = a.merge(&b);
        let lines: Vec<u32> = merged.entries().iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn render_formats_as_file_line_via_chain() {
        let mut trail = CausedByLines::new();
        trail.push(entry(1, "$_GET['q']"));
        trail.push(entry(2, "echo"));
        assert_eq!(trail.render("index.php"), "(index.php:1) via $_GET['q'] -> (index.php:2) via echo");
    }
}
