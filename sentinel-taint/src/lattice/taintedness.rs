//! C2 — Taintedness: the shape-preserving taint lattice.
//!
//! Grounded on the same "own value + per-key children + catch-all" shape the
//! engine crate's `Taintedness`-adjacent structures (`graph::taint::types`)
//! use for tracking taint per collection element, generalized here to the
//! full recursive lattice the spec requires.

use sentinel_core::types::collections::FxHashMap;

use crate::flags::FlagSet;
use crate::lattice::Key;

/// `{ flags, keyFlags, known, unknown }` (§3.2).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Taintedness {
    /// Taint attributed to this value at its current depth.
    pub flags: FlagSet,
    /// Taint carried by the *keys* themselves at this level.
    pub key_flags: FlagSet,
    /// Taint of the element at each literal key.
    pub known: FxHashMap<Key, Taintedness>,
    /// Taint of any element whose key could not be resolved.
    pub unknown: Option<Box<Taintedness>>,
}

impl Taintedness {
    pub fn safe() -> Taintedness {
        Taintedness::default()
    }

    pub fn with_flags(flags: FlagSet) -> Taintedness {
        Taintedness {
            flags,
            ..Default::default()
        }
    }

    pub fn unknown_sentinel() -> Taintedness {
        Taintedness::with_flags(FlagSet::UNKNOWN)
    }

    pub fn inapplicable() -> Taintedness {
        Taintedness::with_flags(FlagSet::INAPPLICABLE)
    }

    pub fn is_safe(&self) -> bool {
        self.collapse().is_empty()
    }

    fn unknown_child(&self) -> Taintedness {
        self.unknown.as_deref().cloned().unwrap_or_default()
    }

    /// `collapse(T)` (§4.1): flattens all depths into one flag set.
    pub fn collapse(&self) -> FlagSet {
        let mut acc = self.flags | self.key_flags;
        for child in self.known.values() {
            acc |= child.collapse();
        }
        if let Some(unknown) = &self.unknown {
            acc |= unknown.collapse();
        }
        acc
    }

    /// `merge(a, b)` (§4.1): pointwise join. Commutative, associative, idempotent.
    pub fn merge(&self, other: &Taintedness) -> Taintedness {
        let mut known = self.known.clone();
        for (k, v) in &other.known {
            known
                .entry(k.clone())
                .and_modify(|existing| *existing = existing.merge(v))
                .or_insert_with(|| v.clone());
        }
        let unknown = match (&self.unknown, &other.unknown) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => Some(Box::new(a.merge(b))),
        };
        Taintedness {
            flags: self.flags | other.flags,
            key_flags: self.key_flags | other.key_flags,
            known,
            unknown,
        }
    }

    /// `project(T, key)` (§4.1). `key = None` models a non-scalar key.
    pub fn project(&self, key: Option<&Key>) -> Taintedness {
        match key {
            None => {
                let mut result = self.unknown_child();
                for child in self.known.values() {
                    result = result.merge(child);
                }
                result.flags |= self.flags;
                result
            }
            Some(k) => match self.known.get(k) {
                Some(child) => {
                    let mut result = child.merge(&self.unknown_child());
                    result.flags |= self.flags;
                    result
                }
                None => {
                    let mut result = self.unknown_child();
                    result.flags |= self.flags;
                    result
                }
            },
        }
    }

    /// `setAt(T, key, child, override)` (§4.1). Non-scalar keys merge into `unknown`;
    /// scalar keys never disturb siblings.
    pub fn set_at(&self, key: Option<&Key>, child: Taintedness, do_override: bool) -> Taintedness {
        let mut result = self.clone();
        match key {
            None => {
                let merged = if do_override {
                    child
                } else {
                    result.unknown_child().merge(&child)
                };
                result.unknown = Some(Box::new(merged));
            }
            Some(k) => {
                let merged = if do_override {
                    child
                } else {
                    result.known.get(k).cloned().unwrap_or_default().merge(&child)
                };
                result.known.insert(k.clone(), merged);
            }
        }
        result
    }

    /// `setAtPath` (§4.1): descends a key path, autovivifying safe
    /// intermediates and OR-ing each non-scalar intermediate key's taint
    /// into that level's `keyFlags`.
    pub fn set_at_path(
        &self,
        path: &[Option<Key>],
        key_taints: &[FlagSet],
        child: Taintedness,
        do_override: bool,
    ) -> Taintedness {
        match path.split_first() {
            None => child,
            Some((head, rest)) => {
                let head_taint = key_taints.first().copied().unwrap_or(FlagSet::EMPTY);
                let mut result = self.clone();
                if head.is_none() {
                    result.key_flags |= head_taint;
                }
                let rest_key_taints = key_taints.get(1..).unwrap_or(&[]);
                if rest.is_empty() {
                    return result.set_at(head.as_ref(), child, do_override);
                }
                let current_child = match head {
                    None => result.unknown_child(),
                    Some(k) => result.known.get(k).cloned().unwrap_or_default(),
                };
                let new_child = current_child.set_at_path(rest, rest_key_taints, child, do_override);
                result.set_at(head.as_ref(), new_child, true)
            }
        }
    }

    /// `arrayPlus(a, b)` (§4.1): array-union, left wins, no recursive merge —
    /// mirrors a host-language `+` operator on arrays.
    pub fn array_plus(&self, other: &Taintedness) -> Taintedness {
        let mut known = other.known.clone();
        for (k, v) in &self.known {
            known.insert(k.clone(), v.clone());
        }
        let unknown = match (&self.unknown, &other.unknown) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => Some(Box::new(a.merge(b))),
        };
        Taintedness {
            flags: self.flags | other.flags,
            key_flags: self.key_flags | other.key_flags,
            known,
            unknown,
        }
    }

    /// `intersectForSink(sink, value)` (§4.1): asymmetric — result takes the
    /// *sink*'s shape; a non-zero sink category at a level catches any
    /// occurrence of that category anywhere in `value` at/under that level.
    pub fn intersect_for_sink(&self, value: &Taintedness) -> Taintedness {
        let value_collapsed = value.collapse();
        let mut known = FxHashMap::default();
        for (k, sink_child) in &self.known {
            let value_child = value.project(Some(k));
            known.insert(k.clone(), sink_child.intersect_for_sink(&value_child));
        }
        let unknown = self.unknown.as_ref().map(|sink_unknown| {
            let value_unknown = value.project(None);
            Box::new(sink_unknown.intersect_for_sink(&value_unknown))
        });
        Taintedness {
            flags: self.flags & value_collapsed,
            key_flags: self.key_flags & value_collapsed,
            known,
            unknown,
        }
    }

    /// `shapeSubtract(a, b)` (§4.1): removes `b.flags` from `a.flags` at each
    /// level where both have structure; `a.unknown` is left untouched.
    pub fn shape_subtract(&self, other: &Taintedness) -> Taintedness {
        let mut known = self.known.clone();
        for (k, a_child) in known.iter_mut() {
            if let Some(b_child) = other.known.get(k) {
                *a_child = a_child.shape_subtract(b_child);
            }
        }
        Taintedness {
            flags: self.flags.difference(other.flags),
            key_flags: self.key_flags,
            known,
            unknown: self.unknown.clone(),
        }
    }

    /// Structural `execToYes` (§4.2): applies the flag-level conversion at
    /// every depth, preserving shape.
    pub fn exec_to_yes(&self) -> Taintedness {
        Taintedness {
            flags: self.flags.exec_to_yes(),
            key_flags: self.key_flags.exec_to_yes(),
            known: self.known.iter().map(|(k, v)| (k.clone(), v.exec_to_yes())).collect(),
            unknown: self.unknown.as_ref().map(|u| Box::new(u.exec_to_yes())),
        }
    }

    /// Structural `yesToExec` (§4.2).
    pub fn yes_to_exec(&self) -> Taintedness {
        Taintedness {
            flags: self.flags.yes_to_exec(),
            key_flags: self.key_flags.yes_to_exec(),
            known: self.known.iter().map(|(k, v)| (k.clone(), v.yes_to_exec())).collect(),
            unknown: self.unknown.as_ref().map(|u| Box::new(u.yes_to_exec())),
        }
    }

    /// Enforce `SQL_NUMKEY ⇒ SQL` (§3.1) at every depth.
    pub fn normalize(&self) -> Taintedness {
        Taintedness {
            flags: self.flags.normalize(),
            key_flags: self.key_flags.normalize(),
            known: self.known.iter().map(|(k, v)| (k.clone(), v.normalize())).collect(),
            unknown: self.unknown.as_ref().map(|u| Box::new(u.normalize())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Category;

    fn html() -> FlagSet {
        FlagSet::yes(Category::Html)
    }

    fn sql() -> FlagSet {
        FlagSet::yes(Category::Sql)
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let a = Taintedness::with_flags(html());
        let b = Taintedness::with_flags(sql());
        assert_eq!(a.merge(&b), b.merge(&a));
        let c = Taintedness::with_flags(FlagSet::yes(Category::Shell));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn merge_with_safe_is_identity() {
        let a = Taintedness::with_flags(html());
        assert_eq!(a.merge(&Taintedness::safe()), a);
    }

    #[test]
    fn collapse_of_merge_is_union_of_collapses() {
        let mut a = Taintedness::with_flags(html());
        a.known.insert(Key::from("x"), Taintedness::with_flags(sql()));
        let b = Taintedness::with_flags(FlagSet::yes(Category::Shell));
        assert_eq!(a.merge(&b).collapse(), a.collapse() | b.collapse());
    }

    #[test]
    fn set_at_then_project_round_trips() {
        let base = Taintedness::safe();
        let key = Key::from("danger");
        let child = Taintedness::with_flags(html());
        let updated = base.set_at(Some(&key), child.clone(), true);
        assert_eq!(updated.project(Some(&key)), child);
    }

    #[test]
    fn shape_preserving_assignment_does_not_leak_between_keys() {
        let mut arr = Taintedness::safe();
        arr = arr.set_at(Some(&Key::from("safe")), Taintedness::with_flags(FlagSet::EMPTY), true);
        arr = arr.set_at(Some(&Key::from("danger")), Taintedness::with_flags(html()), true);
        assert!(arr.project(Some(&Key::from("safe"))).collapse().is_empty());
        assert!(arr.project(Some(&Key::from("danger"))).collapse().contains(html()));
    }

    #[test]
    fn intersect_for_sink_with_safe_value_is_safe() {
        let mut sink = Taintedness::with_flags(FlagSet::exec(Category::Html));
        sink.known.insert(Key::from("x"), Taintedness::with_flags(FlagSet::exec(Category::Sql)));
        let result = sink.intersect_for_sink(&Taintedness::safe());
        assert!(result.collapse().is_empty());
    }

    #[test]
    fn intersect_for_sink_of_safe_sink_is_safe() {
        let value = Taintedness::with_flags(html());
        let result = Taintedness::safe().intersect_for_sink(&value);
        assert!(result.collapse().is_empty());
    }

    #[test]
    fn intersect_for_sink_result_subset_of_sink_shape() {
        let sink = Taintedness::with_flags(FlagSet::exec(Category::Html));
        let value = Taintedness::with_flags(html() | sql());
        let result = sink.intersect_for_sink(&value);
        assert!(sink.collapse().contains(result.collapse()));
    }

    #[test]
    fn array_plus_on_disjoint_keys_equals_merge() {
        let mut a = Taintedness::safe();
        a.known.insert(Key::from("a"), Taintedness::with_flags(html()));
        let mut b = Taintedness::safe();
        b.known.insert(Key::from("b"), Taintedness::with_flags(sql()));
        assert_eq!(a.array_plus(&b), a.merge(&b));
    }

    #[test]
    fn array_plus_left_wins_on_overlap() {
        let mut a = Taintedness::safe();
        a.known.insert(Key::from("x"), Taintedness::with_flags(html()));
        let mut b = Taintedness::safe();
        b.known.insert(Key::from("x"), Taintedness::with_flags(sql()));
        let result = a.array_plus(&b);
        assert_eq!(result.project(Some(&Key::from("x"))).collapse(), html());
    }

    #[test]
    fn exec_to_yes_structural_is_nilpotent() {
        let mut t = Taintedness::with_flags(FlagSet::exec(Category::Html));
        t.known.insert(Key::from("k"), Taintedness::with_flags(FlagSet::exec(Category::Sql)));
        let once = t.exec_to_yes();
        assert!(once.collapse().contains(html()));
        assert!(once.exec_to_yes().collapse().is_empty());
    }

    #[test]
    fn numkey_invariant_holds_after_normalize() {
        let t = Taintedness::with_flags(FlagSet::yes(Category::SqlNumkey)).normalize();
        assert!(t.flags.has_category_yes(Category::Sql));
    }
}
