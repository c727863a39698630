//! C3.6 — the fixed table of well-known input-source identifiers.

use crate::flags::{Category, FlagSet};
use crate::lattice::Taintedness;

/// The categories a raw, unsanitized user input can plausibly carry. Derived
/// categories (`SqlNumkey`, `Escaped`) are never part of a bare source taint
/// — they only appear after structural/escaping analysis downstream.
pub fn base_yes_taint() -> FlagSet {
    [
        Category::Html,
        Category::Sql,
        Category::Shell,
        Category::Serialize,
        Category::Custom1,
        Category::Custom2,
        Category::Misc,
    ]
    .into_iter()
    .fold(FlagSet::EMPTY, |acc, c| acc | FlagSet::yes(c))
}

/// Looks up `name` as a superglobal, returning its hardcoded taint (§3.6).
/// Returns `None` for any identifier that isn't a recognized superglobal —
/// the caller falls back to ordinary scope resolution.
pub fn superglobal_taint(name: &str) -> Option<Taintedness> {
    match name {
        "_GET" | "_POST" | "_REQUEST" | "_COOKIE" | "_SERVER" | "_SESSION" | "_ENV" | "argv"
        | "argc" | "GLOBALS" | "http_response_header" => Some(Taintedness::with_flags(base_yes_taint())),
        "_FILES" => Some(files_superglobal()),
        _ => None,
    }
}

/// `$_FILES` is shaped: field names (keys) are attacker-chosen, so
/// `keyFlags` is tainted; within each field's record, `name`/`type` carry
/// attacker-controlled content while `tmp_name`/`error`/`size` are safe
/// (filesystem-generated).
fn files_superglobal() -> Taintedness {
    let mut record = Taintedness::safe();
    record = record.set_at(Some(&"name".into()), Taintedness::with_flags(base_yes_taint()), true);
    record = record.set_at(Some(&"type".into()), Taintedness::with_flags(base_yes_taint()), true);
    record = record.set_at(Some(&"tmp_name".into()), Taintedness::safe(), true);
    record = record.set_at(Some(&"error".into()), Taintedness::safe(), true);
    record = record.set_at(Some(&"size".into()), Taintedness::safe(), true);

    Taintedness {
        flags: FlagSet::EMPTY,
        key_flags: base_yes_taint(),
        known: Default::default(),
        unknown: Some(Box::new(record)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_fully_tainted() {
        let t = superglobal_taint("_GET").unwrap();
        assert_eq!(t.collapse(), base_yes_taint());
    }

    #[test]
    fn unrecognized_identifier_is_not_a_superglobal() {
        assert!(superglobal_taint("my_var").is_none());
    }

    #[test]
    fn files_tmp_name_is_safe_but_name_is_tainted() {
        let files = files_superglobal();
        let one_file = files.project(Some(&"anything".into()));
        assert!(one_file.project(Some(&"tmp_name".into())).collapse().is_empty());
        assert!(!one_file.project(Some(&"name".into())).collapse().is_empty());
    }

    #[test]
    fn files_keys_themselves_are_tainted() {
        let files = files_superglobal();
        assert!(files.key_flags.contains(base_yes_taint()));
    }
}
