//! C3 — MethodLinks: the method-parameter link graph.
//!
//! Mirrors [`crate::lattice::Taintedness`]'s shape (own / known / unknown)
//! but each leaf is a [`LinksSet`] instead of a flag set: a record of which
//! `(function, parameter)` pairs a value was derived from, so a later sink
//! hit can walk backwards and update that function's contract (§4.4).

use sentinel_core::types::collections::FxHashMap;
use sentinel_core::types::identifiers::FunctionId;

use crate::flags::FlagSet;
use crate::lattice::taintedness::Taintedness;
use crate::lattice::Key;

/// Taint-category filter + parameter index through which a value reached
/// this position, for one function. `None` filter means "all categories".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SingleMethodLinks {
    pub params: FxHashMap<usize, Option<FlagSet>>,
}

impl SingleMethodLinks {
    pub fn single(param: usize, filter: Option<FlagSet>) -> SingleMethodLinks {
        let mut params = FxHashMap::default();
        params.insert(param, filter);
        SingleMethodLinks { params }
    }

    pub fn merge(&self, other: &SingleMethodLinks) -> SingleMethodLinks {
        let mut params = self.params.clone();
        for (&idx, other_filter) in &other.params {
            params
                .entry(idx)
                .and_modify(|existing| {
                    *existing = match (*existing, *other_filter) {
                        (None, _) | (_, None) => None,
                        (Some(a), Some(b)) => Some(a | b),
                    };
                })
                .or_insert(*other_filter);
        }
        SingleMethodLinks { params }
    }
}

/// All functions a value depends on at one structural position.
pub type LinksSet = FxHashMap<FunctionId, SingleMethodLinks>;

fn merge_links_sets(a: &LinksSet, b: &LinksSet) -> LinksSet {
    let mut result = a.clone();
    for (func, links) in b {
        result
            .entry(*func)
            .and_modify(|existing| *existing = existing.merge(links))
            .or_insert_with(|| links.clone());
    }
    result
}

/// C3's recursive container, shape-aligned with [`Taintedness`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodLinks {
    pub own: LinksSet,
    pub known: FxHashMap<Key, MethodLinks>,
    pub unknown: Option<Box<MethodLinks>>,
}

impl MethodLinks {
    pub fn none() -> MethodLinks {
        MethodLinks::default()
    }

    pub fn from_param(func: FunctionId, param: usize) -> MethodLinks {
        let mut own = LinksSet::default();
        own.insert(func, SingleMethodLinks::single(param, None));
        MethodLinks {
            own,
            ..Default::default()
        }
    }

    fn unknown_child(&self) -> MethodLinks {
        self.unknown.as_deref().cloned().unwrap_or_default()
    }

    pub fn merge(&self, other: &MethodLinks) -> MethodLinks {
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
        MethodLinks {
            own: merge_links_sets(&self.own, &other.own),
            known,
            unknown,
        }
    }

    /// Mirrors [`Taintedness::project`].
    pub fn project(&self, key: Option<&Key>) -> MethodLinks {
        match key {
            None => {
                let mut result = self.unknown_child();
                for child in self.known.values() {
                    result = result.merge(child);
                }
                result.own = merge_links_sets(&result.own, &self.own);
                result
            }
            Some(k) => match self.known.get(k) {
                Some(child) => {
                    let mut result = child.merge(&self.unknown_child());
                    result.own = merge_links_sets(&result.own, &self.own);
                    result
                }
                None => {
                    let mut result = self.unknown_child();
                    result.own = merge_links_sets(&result.own, &self.own);
                    result
                }
            },
        }
    }

    /// Mirrors [`Taintedness::set_at`].
    pub fn set_at(&self, key: Option<&Key>, child: MethodLinks, do_override: bool) -> MethodLinks {
        let mut result = self.clone();
        match key {
            None => {
                let merged = if do_override { child } else { result.unknown_child().merge(&child) };
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

    /// `setLinksAtOffsetList` (§4.2/§4.7): mirrors [`Taintedness::set_at_path`].
    pub fn set_at_path(&self, path: &[Option<Key>], child: MethodLinks, do_override: bool) -> MethodLinks {
        match path.split_first() {
            None => child,
            Some((head, rest)) => {
                if rest.is_empty() {
                    return self.set_at(head.as_ref(), child, do_override);
                }
                let current_child = match head {
                    None => self.unknown_child(),
                    Some(k) => self.known.get(k).cloned().unwrap_or_default(),
                };
                let new_child = current_child.set_at_path(rest, child, do_override);
                self.set_at(head.as_ref(), new_child, true)
            }
        }
    }

    /// Flattens all depths into one [`LinksSet`] — the link-graph analogue
    /// of [`Taintedness::collapse`].
    pub fn collapse(&self) -> LinksSet {
        let mut acc = self.own.clone();
        for child in self.known.values() {
            acc = merge_links_sets(&acc, &child.collapse());
        }
        if let Some(unknown) = &self.unknown {
            acc = merge_links_sets(&acc, &unknown.collapse());
        }
        acc
    }

    /// Every `(function, param)` pair referenced anywhere in this structure.
    pub fn iter_all(&self) -> impl Iterator<Item = (FunctionId, usize, Option<FlagSet>)> + '_ {
        self.collapse()
            .into_iter()
            .flat_map(|(func, single)| single.params.into_iter().map(move |(idx, filter)| (func, idx, filter)))
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// `preservedTaintForParam` (§4.2): walks the shape and, at every node,
    /// checks whether `(func, i)` is recorded there; builds a
    /// [`Taintedness`]-shaped projection of which categories preserve.
    pub fn preserved_taint_for_param(&self, func: FunctionId, param: usize) -> Taintedness {
        let flags = self
            .own
            .get(&func)
            .and_then(|single| single.params.get(&param))
            .map(|filter| filter.unwrap_or_else(all_category_flags))
            .unwrap_or(FlagSet::EMPTY);

        let known = self
            .known
            .iter()
            .map(|(k, child)| (k.clone(), child.preserved_taint_for_param(func, param)))
            .collect();
        let unknown = self
            .unknown
            .as_ref()
            .map(|u| Box::new(u.preserved_taint_for_param(func, param)));

        Taintedness {
            flags,
            key_flags: FlagSet::EMPTY,
            known,
            unknown,
        }
    }
}

fn all_category_flags() -> FlagSet {
    use crate::flags::Category;
    Category::ALL.into_iter().fold(FlagSet::EMPTY, |acc, c| acc | FlagSet::yes(c))
}
