//! The analyzer's own state: symbol side-table (C6), function registry and
//! contracts (C5), configuration, and the diagnostics sink. Everything in
//! `visitor/`, `assign.rs`, `calls.rs`, and `loops.rs` is an `impl Analyzer`
//! block operating on this state.

use sentinel_core::types::collections::FxHashMap;
use sentinel_core::types::identifiers::{FunctionId, Interner};

use crate::config::Configuration;
use crate::contracts::FunctionContract;
use crate::diagnostics::Diagnostic;
use crate::flags::Category;
use crate::lattice::Key;
use crate::symbols::{FunctionDef, SymbolTable};

#[derive(Debug)]
pub struct Analyzer {
    pub symbols: SymbolTable,
    pub(crate) function_names: Interner<FunctionId>,
    pub(crate) function_by_name: FxHashMap<String, FunctionId>,
    pub(crate) function_defs: FxHashMap<FunctionId, FunctionDef>,
    pub(crate) contracts: FxHashMap<FunctionId, FunctionContract>,
    pub config: Configuration,
    pub diagnostics: Vec<Diagnostic>,
    pub(crate) file: String,
    /// Functions currently being analyzed, innermost last, so `return`
    /// statements (§4.5) know which contract to update.
    pub(crate) function_stack: Vec<FunctionId>,
    /// Set while the loop-prelude widening pass (§4.3/C10) re-runs a loop
    /// body once to compute the widened entry state; diagnostics from that
    /// throwaway pass must not be emitted twice.
    pub(crate) suppress_diagnostics: bool,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration").finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new(config: Configuration, file: impl Into<String>) -> Analyzer {
        Analyzer {
            symbols: SymbolTable::new(),
            function_names: Interner::new(),
            function_by_name: FxHashMap::default(),
            function_defs: FxHashMap::default(),
            contracts: FxHashMap::default(),
            config,
            diagnostics: Vec::new(),
            file: file.into(),
            function_stack: Vec::new(),
            suppress_diagnostics: false,
        }
    }

    /// Register a function's static shape, interning its name into a stable
    /// id. If no contract is on file yet, install a safe default so that
    /// mutually- or self-recursive calls seen before the body is walked
    /// terminate instead of looping (§4.3 "Closure / function declaration").
    pub fn declare_function(&mut self, mut def: FunctionDef) -> FunctionId {
        let id = self.function_names.intern(&def.name);
        def.id = id;
        self.function_by_name.insert(def.name.clone(), id);
        self.function_defs.insert(id, def);
        self.contracts.entry(id).or_insert_with(FunctionContract::safe_default);
        id
    }

    pub fn resolve_function(&self, name: &str) -> Option<FunctionId> {
        self.function_by_name.get(name).copied()
    }

    pub fn function_def(&self, id: FunctionId) -> Option<&FunctionDef> {
        self.function_defs.get(&id)
    }

    pub fn contract(&self, id: FunctionId) -> FunctionContract {
        self.contracts.get(&id).cloned().unwrap_or_default()
    }

    /// Merge `other` into `id`'s contract (§4.5 step 5, §4.4 step 3's
    /// back-propagation). Returns whether anything changed, for the host's
    /// fixpoint-termination check (Design Notes §9).
    pub fn merge_contract(&mut self, id: FunctionId, other: &FunctionContract) -> bool {
        let mut contract = self.contract(id);
        let changed = contract.merge_in(other);
        if changed {
            tracing::trace!(function = %id, "function contract grew after merge");
        }
        self.contracts.insert(id, contract);
        changed
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn current_function(&self) -> Option<FunctionId> {
        self.function_stack.last().copied()
    }

    pub(crate) fn all_category_flags() -> crate::flags::FlagSet {
        Category::ALL.into_iter().fold(crate::flags::FlagSet::EMPTY, |acc, c| acc | crate::flags::FlagSet::yes(c))
    }

    /// Applies a parsed `@param-taint $name ...` annotation (§6) to `func`'s
    /// contract: by default locks the slot with `NO_OVERRIDE`, unless the
    /// annotation carried `allow_override`.
    pub fn apply_param_taint_annotation(&mut self, func: FunctionId, line: &str) -> Result<(), sentinel_core::AnalysisError> {
        let (name, parsed) = crate::docblock::parse_param_taint(line)?;
        let index = self.function_def(func).and_then(|d| d.param_index(&name));
        if let Some(index) = index {
            let mut contract = self.contract(func);
            contract.set_param(index, crate::lattice::Taintedness::with_flags(parsed.flags));
            if !parsed.allow_override {
                contract.lock_param(index);
            }
            self.contracts.insert(func, contract);
        }
        Ok(())
    }

    /// Applies a parsed `@return-taint ...` annotation (§6) to `func`'s contract.
    pub fn apply_return_taint_annotation(&mut self, func: FunctionId, line: &str) -> Result<(), sentinel_core::AnalysisError> {
        let parsed = crate::docblock::parse_return_taint(line)?;
        let mut contract = self.contract(func);
        contract.set_overall(crate::lattice::Taintedness::with_flags(parsed.flags));
        if !parsed.allow_override {
            contract.lock_overall();
        }
        self.contracts.insert(func, contract);
        Ok(())
    }
}

/// Resolves a (possibly dynamic) subscript key expression into a literal
/// [`Key`] when it's a constant, mirroring `resolveKey` from §4.3's
/// "Subscript read" and "Array literal" rules.
pub(crate) fn literal_key(expr: &crate::ast::Expr) -> Option<Key> {
    match expr {
        crate::ast::Expr::IntLit(i) => Some(Key::Int(*i)),
        crate::ast::Expr::StrLit(s) => Some(Key::Str(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FlagSet;
    use crate::symbols::ParamDef;
    use sentinel_core::types::identifiers::InternedId;

    #[test]
    fn param_taint_annotation_locks_the_slot_by_default() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let id = analyzer.declare_function(FunctionDef::new(
            FunctionId::from_index(0),
            "db_query",
            vec![ParamDef { name: "q".into(), by_ref: false }],
        ));
        analyzer.apply_param_taint_annotation(id, "@param-taint $q exec_sql, exec_sql_numkey").unwrap();

        let contract = analyzer.contract(id);
        assert!(contract.param(0).flags.has_category_exec(Category::Sql));
        assert!(contract.param(0).flags.has_category_exec(Category::SqlNumkey));

        let mut weaker = FunctionContract::safe_default();
        weaker.set_param(0, crate::lattice::Taintedness::safe());
        analyzer.merge_contract(id, &weaker);
        assert!(analyzer.contract(id).param(0).flags.has_category_exec(Category::Sql));
    }

    #[test]
    fn return_taint_annotation_with_allow_override_stays_mergeable() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let id = analyzer.declare_function(FunctionDef::new(FunctionId::from_index(0), "wrap", vec![]));
        analyzer.apply_return_taint_annotation(id, "@return-taint html, allow_override").unwrap();

        let mut grown = FunctionContract::safe_default();
        grown.set_overall(crate::lattice::Taintedness::with_flags(FlagSet::yes(Category::Sql)));
        analyzer.merge_contract(id, &grown);

        let contract = analyzer.contract(id);
        assert!(contract.overall.flags.has_category_yes(Category::Html));
        assert!(contract.overall.flags.has_category_yes(Category::Sql));
    }
}
