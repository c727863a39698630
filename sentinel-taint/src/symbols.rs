//! C6 — symbol annotations: the side-table the analyzer owns instead of
//! attaching mutable fields to host-owned symbol objects (Design Notes §9).
//!
//! Keyed by [`SymbolId`], a stable identity the host analyzer hands out for
//! every variable/property/parameter; the analyzer never mutates host state
//! directly, only this map.

use sentinel_core::types::collections::FxHashMap;
use sentinel_core::types::identifiers::{FunctionId, Interner, SymbolId};

use crate::triple::Triple;

/// `Annotations { taint, error, links }` (Design Notes §9), bundled as the triple.
pub type Annotations = Triple;

/// Owns symbol identity (interning host names into [`SymbolId`]) and the
/// taint annotation attached to each one.
#[derive(Debug, Default)]
pub struct SymbolTable {
    interner: Interner<SymbolId>,
    annotations: FxHashMap<SymbolId, Annotations>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Intern `name` (a scope-qualified key such as `"fn:main/$x"` or
    /// `"prop:User::name"`) into a stable [`SymbolId`].
    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.interner.intern(name)
    }

    pub fn get(&self, id: SymbolId) -> Annotations {
        self.annotations.get(&id).cloned().unwrap_or_default()
    }

    /// Store (overwrite) a symbol's triple — always a full clone, never a
    /// shared reference, per §5's clone discipline.
    pub fn set(&mut self, id: SymbolId, annotations: Annotations) {
        self.annotations.insert(id, annotations);
    }

    pub fn has(&self, id: SymbolId) -> bool {
        self.annotations.contains_key(&id)
    }

    /// Captures the current annotation map, for the branch-merge and
    /// loop-prelude hooks (§6, §10.6) to fork and later reconcile.
    pub fn snapshot(&self) -> FxHashMap<SymbolId, Annotations> {
        self.annotations.clone()
    }

    pub fn restore(&mut self, snapshot: FxHashMap<SymbolId, Annotations>) {
        self.annotations = snapshot;
    }
}

/// A single scope's variable-name → symbol-identity mapping. The host would
/// own the real scope graph (§1); this is the minimal read-only view the
/// analyzer needs to resolve a read (§4.3 "Variable read").
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: FxHashMap<String, SymbolId>,
    parent: Option<Box<Scope>>,
}

impl Scope {
    pub fn new() -> Scope {
        Scope::default()
    }

    pub fn child(&self) -> Scope {
        Scope {
            vars: FxHashMap::default(),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn bind(&mut self, name: &str, id: SymbolId) {
        self.vars.insert(name.to_string(), id);
    }

    pub fn resolve(&self, name: &str) -> Option<SymbolId> {
        self.vars
            .get(name)
            .copied()
            .or_else(|| self.parent.as_ref().and_then(|p| p.resolve(name)))
    }

    /// Union two scopes that diverged at a branch point (§6 "branch-merge
    /// closure"): bindings present in both keep `self`'s id (pre-existing
    /// variables resolve to the same id in both branches); a name bound only
    /// in `other` (declared inside that branch alone) is carried over.
    pub fn merge(&self, other: &Scope) -> Scope {
        let mut vars = self.vars.clone();
        for (name, id) in &other.vars {
            vars.entry(name.clone()).or_insert(*id);
        }
        Scope {
            vars,
            parent: self.parent.clone(),
        }
    }
}

/// A formal parameter (§3.5/§4.6: by-reference affects call-site handling).
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub by_ref: bool,
}

/// A function's static shape, as the host would expose it: name, params,
/// variadic slot, and whatever declared return type masks §4.5's step 2.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<ParamDef>,
    pub variadic: Option<ParamDef>,
    /// Categories the declared return type can possibly carry; `None` means
    /// untyped (no masking applied).
    pub declared_return_categories: Option<crate::flags::FlagSet>,
}

impl FunctionDef {
    pub fn new(id: FunctionId, name: &str, params: Vec<ParamDef>) -> FunctionDef {
        FunctionDef {
            id,
            name: name.to_string(),
            params,
            variadic: None,
            declared_return_categories: None,
        }
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigning_into_symbol_and_reading_back_round_trips() {
        let mut table = SymbolTable::new();
        let id = table.intern("fn:main/$x");
        let triple = Triple::with_taint(crate::lattice::Taintedness::with_flags(
            crate::flags::FlagSet::yes(crate::flags::Category::Html),
        ));
        table.set(id, triple.clone());
        assert_eq!(table.get(id), triple);
    }

    #[test]
    fn child_scope_resolves_through_parent() {
        let mut table = SymbolTable::new();
        let id = table.intern("fn:outer/$x");
        let mut outer = Scope::new();
        outer.bind("x", id);
        let inner = outer.child();
        assert_eq!(inner.resolve("x"), Some(id));
        assert_eq!(inner.resolve("y"), None);
    }
}
