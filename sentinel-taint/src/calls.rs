//! C9 — the call handler (§4.6): resolves the callee's contract, checks
//! each argument position against that contract's sink behavior, flows
//! preserved taint into the return value, writes by-reference outputs back
//! into their arguments (in argument order), and extends the link graph so
//! taint can be traced through chains of callers.

use sentinel_core::types::identifiers::FunctionId;

use crate::analyzer::Analyzer;
use crate::ast::{Argument, Callee};
use crate::builtins::BuiltinSignature;
use crate::contracts::FunctionContract;
use crate::diagnostics::SinkFinding;
use crate::flags::FlagSet;
use crate::lattice::{CausedByLines, MethodLinks, Taintedness};
use crate::symbols::Scope;
use crate::triple::Triple;

impl Analyzer {
    /// `F(a1, …, an)` (§4.6). `callee_line` identifies the call for the
    /// cause-trail; `new_constructor` is `true` when this call models the
    /// constructor half of a `new` expression (§4.3 "New").
    pub fn call(&mut self, scope: &mut Scope, callee: &Callee, args: &[Argument], line: u32) -> Triple {
        let name = match callee {
            Callee::Named(name) => name.clone(),
            Callee::Dynamic(expr) => {
                self.eval_expr(expr, scope);
                return Triple::unknown();
            }
        };

        if let Some(builtin) = self.config.lookup_builtin(&name) {
            return self.call_builtin(scope, &builtin, args, line);
        }

        match self.resolve_function(&name) {
            Some(func_id) => self.call_user_function(scope, func_id, args, line),
            None => Triple::unknown(),
        }
    }

    fn call_builtin(&mut self, scope: &mut Scope, sig: &BuiltinSignature, args: &[Argument], line: u32) -> Triple {
        let mut overall = sig.overall.clone();
        let mut cause = CausedByLines::new();
        let mut links = MethodLinks::none();

        for (i, arg) in args.iter().enumerate() {
            let arg_triple = self.eval_expr(&arg.value, scope);
            let sink_flags = sig.params.get(i).map(Taintedness::collapse).unwrap_or(FlagSet::EMPTY);
            self.sink_protocol(sink_flags, &arg_triple, line);

            let preserved = sig.preserved.get(i).map(Taintedness::collapse).unwrap_or(FlagSet::EMPTY);
            overall.flags |= arg_triple.taint.collapse() & preserved;
            cause = cause.merge(&arg_triple.cause);
            links = links.merge(&arg_triple.links);
        }

        Triple { taint: overall, cause, links }
    }

    fn call_user_function(&mut self, scope: &mut Scope, func_id: FunctionId, args: &[Argument], line: u32) -> Triple {
        let def = self.function_def(func_id).cloned();
        let contract = self.contract(func_id);

        let mut overall = contract.overall.clone();
        let mut cause = CausedByLines::new();
        let mut links = MethodLinks::none();

        for (i, arg) in args.iter().enumerate() {
            let arg_triple = self.eval_expr(&arg.value, scope);

            let sink_flags = contract.param(i).collapse();
            self.sink_protocol(sink_flags, &arg_triple, line);

            let preserved = contract.preserved(i).collapse();
            overall.flags |= arg_triple.taint.collapse() & preserved;

            let is_by_ref = def
                .as_ref()
                .map(|d| d.params.get(i).map(|p| p.by_ref).unwrap_or(false))
                .unwrap_or(false);
            if is_by_ref {
                let written = Triple::with_taint(contract.byref_output(i));
                self.assign(scope, &arg.value, written, None, line);
            }

            cause = cause.merge(&arg_triple.cause);
            links = links.merge(&arg_triple.links);
        }

        Triple { taint: overall, cause, links }
    }

    /// §4.4 — the sink protocol, parameterized over a (possibly multi-
    /// category) `sink_exec` flag set. Shared by direct sinks (echo,
    /// shell-exec, …) and by the per-argument check in the call handler.
    ///
    /// §4.6 step 3 lists "sink check" and "link extension" as separate,
    /// unconditional bullets: link extension must back-propagate `sink_exec`
    /// into every `(function, param)` pair carried by `value`'s links
    /// regardless of whether `value`'s *current* taint already intersects
    /// it. A parameter seeded by `bind_param` carries links but no taint of
    /// its own, so gating link extension on `dangerous` would silently drop
    /// the "callers of callers" chain (`level1` calling `level2` calling
    /// `level3`, where only `level3`'s own parameter is a declared sink).
    pub(crate) fn sink_protocol(&mut self, sink_exec: FlagSet, value: &Triple, line: u32) {
        let dangerous = sink_exec.exec_to_yes() & value.taint.collapse();
        if !dangerous.is_empty() {
            for category in dangerous.iter_yes_categories() {
                let finding = SinkFinding {
                    category,
                    line,
                    cause: value.cause.clone(),
                };
                let suppressed = self.suppress_diagnostics || self.config.is_false_positive(&finding);
                if !suppressed {
                    self.diagnostics.push(crate::diagnostics::Diagnostic::from_finding(&finding, &self.file));
                }
            }
        }

        if sink_exec.is_empty() {
            return;
        }
        for (func, idx, _filter) in value.links.iter_all() {
            let mut update = FunctionContract::safe_default();
            update.set_param(idx, Taintedness::with_flags(sink_exec));
            self.merge_contract(func, &update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::config::Configuration;
    use crate::flags::Category;
    use crate::symbols::{FunctionDef, ParamDef};
    use sentinel_core::types::identifiers::InternedId;

    fn get_q(line: u32) -> Expr {
        Expr::Subscript {
            base: Box::new(Expr::Variable { name: "_GET".into(), line }),
            key: Some(Box::new(Expr::StrLit("q".into()))),
            line,
        }
    }

    #[test]
    fn builtin_sink_reports_diagnostic_on_tainted_argument() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        analyzer.call(&mut scope, &Callee::Named("shell_exec".into()), &[Argument { value: get_q(1), spread: false }], 1);
        assert_eq!(analyzer.diagnostics.len(), 1);
        assert_eq!(analyzer.diagnostics[0].category, Category::Shell);
    }

    #[test]
    fn htmlspecialchars_suppresses_the_diagnostic() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        let wrapped = Expr::Call {
            callee: Callee::Named("htmlspecialchars".into()),
            args: vec![Argument { value: get_q(1), spread: false }],
            line: 1,
        };
        analyzer.call(&mut scope, &Callee::Named("printf".into()), &[Argument { value: wrapped, spread: false }], 2);
        assert!(analyzer.diagnostics.is_empty());
    }

    #[test]
    fn by_ref_write_back_respects_argument_order() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        analyzer.declare_function(FunctionDef {
            id: FunctionId::from_index(0),
            name: "unsafe_write".into(),
            params: vec![ParamDef { name: "v".into(), by_ref: true }],
            variadic: None,
            declared_return_categories: None,
        });
        let id = analyzer.resolve_function("unsafe_write").unwrap();
        let mut contract = analyzer.contract(id);
        contract.set_byref_output(0, Taintedness::with_flags(FlagSet::yes(Category::Html)));
        analyzer.merge_contract(id, &contract);

        let mut scope = Scope::new();
        let target = Expr::Variable { name: "v".into(), line: 1 };
        analyzer.call(&mut scope, &Callee::Named("unsafe_write".into()), &[Argument { value: target.clone(), spread: false }], 1);
        let sym = scope.resolve("v").unwrap();
        assert!(analyzer.symbols.get(sym).taint.flags.has_category_yes(Category::Html));
    }

    #[test]
    fn link_extension_runs_even_when_the_argument_is_not_yet_dangerous() {
        // level2(w) { level3(w); } where level3's own param 0 is already a
        // known HTML sink — calling level3(w) must mark level2's param 0 as
        // an HTML sink too, even though `w` itself carries no taint yet
        // (only links), so "callers of callers" keep propagating (§4.6).
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let level2 = analyzer.declare_function(FunctionDef {
            id: FunctionId::from_index(0),
            name: "level2".into(),
            params: vec![ParamDef { name: "w".into(), by_ref: false }],
            variadic: None,
            declared_return_categories: None,
        });
        let level3 = analyzer.declare_function(FunctionDef {
            id: FunctionId::from_index(0),
            name: "level3".into(),
            params: vec![ParamDef { name: "x".into(), by_ref: false }],
            variadic: None,
            declared_return_categories: None,
        });
        let mut level3_contract = analyzer.contract(level3);
        level3_contract.set_param(0, Taintedness::with_flags(FlagSet::exec(Category::Html)));
        analyzer.merge_contract(level3, &level3_contract);

        // Seed `w` with links back to (level2, 0) but no taint, mirroring
        // how `bind_param` seeds a fresh parameter.
        let mut scope = Scope::new();
        let w_id = analyzer.symbol_for_name(&mut scope, "w");
        analyzer.symbols.set(
            w_id,
            Triple {
                taint: Taintedness::safe(),
                cause: CausedByLines::new(),
                links: MethodLinks::from_param(level2, 0),
            },
        );

        analyzer.call(&mut scope, &Callee::Named("level3".into()), &[Argument { value: Expr::Variable { name: "w".into(), line: 1 }, spread: false }], 1);

        let level2_contract = analyzer.contract(level2);
        assert!(level2_contract.param(0).flags.has_category_exec(Category::Html));
    }
}
