//! C10 — loop-prelude widening and branch-merge (§6's "loop-prelude
//! visitor" and "branch-merge closure").
//!
//! Neither hook re-implements a fixpoint loop: the loop-prelude runs the
//! body once, throwaway, to compute a widened entry state, then the real
//! (diagnostic-emitting) pass walks the body against that widened state.
//! Branch-merge forks the symbol table per branch and OR-merges taint,
//! links, and cause-trails back together — no path-sensitive pruning.

use sentinel_core::types::identifiers::SymbolId;

use crate::analyzer::Analyzer;
use crate::ast::Stmt;
use crate::symbols::{Annotations, Scope};

impl Analyzer {
    /// One-shot widening of loop-carried variables (§4.3, §6) before a
    /// `while`/`for` body's real pass.
    pub fn loop_prelude(&mut self, scope: &mut Scope, body: &[Stmt]) {
        let baseline = self.symbols.snapshot();
        let was_suppressed = self.suppress_diagnostics;
        self.suppress_diagnostics = true;
        for stmt in body {
            self.exec_stmt(stmt, scope);
        }
        self.suppress_diagnostics = was_suppressed;

        let after_one_pass = self.symbols.snapshot();
        let widened = merge_snapshots(&baseline, &after_one_pass);
        self.symbols.restore(widened);
    }

    /// Runs `body` as a loop: widen, then the real pass.
    pub fn exec_loop_body(&mut self, scope: &mut Scope, body: &[Stmt]) {
        self.loop_prelude(scope, body);
        for stmt in body {
            self.exec_stmt(stmt, scope);
        }
    }

    /// Runs each of `branches` from the same starting `scope`/symbol state
    /// and OR-merges the results back together (§6 "branch-merge closure").
    pub fn exec_branches(&mut self, scope: &Scope, branches: &[&[Stmt]]) -> Scope {
        let baseline = self.symbols.snapshot();
        let mut merged_scope: Option<Scope> = None;
        let mut merged_snapshot = baseline.clone();

        for branch in branches {
            self.symbols.restore(baseline.clone());
            let mut branch_scope = scope.clone();
            for stmt in *branch {
                self.exec_stmt(stmt, &mut branch_scope);
            }
            let branch_snapshot = self.symbols.snapshot();
            merged_snapshot = merge_snapshots(&merged_snapshot, &branch_snapshot);
            merged_scope = Some(match merged_scope {
                Some(acc) => acc.merge(&branch_scope),
                None => branch_scope,
            });
        }

        self.symbols.restore(merged_snapshot);
        merged_scope.unwrap_or_else(|| scope.clone())
    }
}

fn merge_snapshots(
    a: &sentinel_core::types::collections::FxHashMap<SymbolId, Annotations>,
    b: &sentinel_core::types::collections::FxHashMap<SymbolId, Annotations>,
) -> sentinel_core::types::collections::FxHashMap<SymbolId, Annotations> {
    let mut result = a.clone();
    for (id, triple) in b {
        result
            .entry(*id)
            .and_modify(|existing| *existing = existing.merge(triple))
            .or_insert_with(|| triple.clone());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::config::Configuration;
    use crate::flags::{Category, FlagSet};
    use crate::lattice::Taintedness;
    use crate::triple::Triple;

    fn assign_stmt(name: &str, taint: FlagSet, line: u32) -> Stmt {
        // A synthetic statement equivalent to `$name = <taint>;` for the
        // branch/loop tests, bypassing the RHS-eval step since we only need
        // to exercise the merge machinery.
        let _ = taint;
        Stmt::Expr(Expr::Assign {
            target: Box::new(Expr::Variable { name: name.into(), line }),
            value: Box::new(Expr::BoolLit(true)),
            augmented_op: None,
            line,
        })
    }

    #[test]
    fn branch_merge_ors_taint_from_both_branches() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        analyzer.assign(&mut scope, &Expr::Variable { name: "v".into(), line: 1 }, Triple::safe(), None, 1);

        let then_branch: Vec<Stmt> = vec![Stmt::Expr(Expr::Assign {
            target: Box::new(Expr::Variable { name: "v".into(), line: 2 }),
            value: Box::new(Expr::Subscript {
                base: Box::new(Expr::Variable { name: "_GET".into(), line: 2 }),
                key: Some(Box::new(Expr::StrLit("q".into()))),
                line: 2,
            }),
            augmented_op: None,
            line: 2,
        })];
        let else_branch: Vec<Stmt> = vec![];

        let merged_scope = analyzer.exec_branches(&scope, &[&then_branch, &else_branch]);
        let id = merged_scope.resolve("v").unwrap();
        assert!(analyzer.symbols.get(id).taint.flags.has_category_yes(Category::Html));
    }

    #[test]
    fn loop_prelude_is_idempotent_when_body_has_no_effect() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        let body: Vec<Stmt> = vec![assign_stmt("v", FlagSet::EMPTY, 1)];
        analyzer.loop_prelude(&mut scope, &body);
        assert!(analyzer.diagnostics.is_empty());
    }
}
