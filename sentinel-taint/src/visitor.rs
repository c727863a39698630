//! C7 — the propagation visitor (§4.3): a post-order walk producing a
//! `(taint, cause-trail, links)` triple for every expression, dispatching on
//! the closed [`crate::ast::Expr`]/[`crate::ast::Stmt`] enums rather than an
//! open visitor-class hierarchy (Design Notes §9).

use sentinel_core::types::identifiers::FunctionId;

use crate::analyzer::{literal_key, Analyzer};
use crate::ast::{BinaryOp, CastKind, Callee, Expr, SinkKind, Stmt, UnaryOp};
use crate::contracts::FunctionContract;
use crate::flags::{Category, FlagSet};
use crate::lattice::{CausedByLines, MethodLinks, Taintedness};
use crate::symbols::{FunctionDef, Scope};
use crate::triple::Triple;

impl Analyzer {
    /// Entry point for a top-level program (no enclosing function, so
    /// `return` never fires and variables live in the global scope).
    pub fn analyze_program(&mut self, body: &[Stmt]) -> Scope {
        let mut scope = Scope::new();
        for stmt in body {
            self.exec_stmt(stmt, &mut scope);
        }
        scope
    }

    /// Analyzes one function body: binds parameters (each seeded with a
    /// [`MethodLinks::from_param`] so the link graph can trace taint back to
    /// this parameter), walks the body, then merges the resulting contract
    /// (§4.5) and captures any by-reference parameter's final state.
    pub fn analyze_function(&mut self, id: FunctionId, body: &[Stmt]) {
        let def = self.function_def(id).cloned();
        let mut scope = Scope::new();

        if let Some(def) = &def {
            for (i, param) in def.params.iter().enumerate() {
                self.bind_param(&mut scope, id, &param.name, i);
            }
            if let Some(variadic) = &def.variadic {
                let idx = def.params.len();
                self.bind_param(&mut scope, id, &variadic.name, idx);
            }
        }

        self.function_stack.push(id);
        for stmt in body {
            self.exec_stmt(stmt, &mut scope);
        }
        self.function_stack.pop();

        self.capture_byref_outputs(id, &def, &scope);
    }

    fn bind_param(&mut self, scope: &mut Scope, func: FunctionId, name: &str, index: usize) {
        let sym_id = self.symbols.intern(&format!("fn:{func}/${name}"));
        self.symbols.set(
            sym_id,
            Triple {
                taint: Taintedness::safe(),
                cause: CausedByLines::new(),
                links: MethodLinks::from_param(func, index),
            },
        );
        scope.bind(name, sym_id);
    }

    fn capture_byref_outputs(&mut self, id: FunctionId, def: &Option<FunctionDef>, scope: &Scope) {
        let Some(def) = def else { return };
        let mut contract = FunctionContract::safe_default();
        let mut any = false;
        for (i, param) in def.params.iter().enumerate() {
            if !param.by_ref {
                continue;
            }
            if let Some(sym_id) = scope.resolve(&param.name) {
                contract.set_byref_output(i, self.symbols.get(sym_id).taint);
                any = true;
            }
        }
        if any {
            self.merge_contract(id, &contract);
        }
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt, scope: &mut Scope) {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr, scope);
            }
            Stmt::Return { value, line } => {
                let ret = match value {
                    Some(v) => self.eval_expr(v, scope),
                    None => Triple::safe(),
                };
                if let Some(func) = self.current_function() {
                    self.handle_return(func, &ret);
                }
                let _ = line;
            }
            Stmt::Global { names, line } => {
                for name in names {
                    self.exec_global(scope, name, *line);
                }
            }
            Stmt::Static { name, init, line } => {
                self.exec_static(scope, name, init.as_ref(), *line);
            }
            Stmt::FunctionDecl { name, body } => {
                self.exec_nested_function_decl(name, body);
            }
            Stmt::If { cond, then_block, else_block } => {
                self.eval_expr(cond, scope);
                let merged = self.exec_branches(scope, &[then_block.as_slice(), else_block.as_slice()]);
                *scope = merged;
            }
            Stmt::While { cond, body } => {
                self.eval_expr(cond, scope);
                self.exec_loop_body(scope, body);
            }
            Stmt::For { body } => {
                self.exec_loop_body(scope, body);
            }
            Stmt::Switch { subject, cases } => {
                self.eval_expr(subject, scope);
                let branches: Vec<&[Stmt]> = cases.iter().map(Vec::as_slice).collect();
                let merged = self.exec_branches(scope, &branches);
                *scope = merged;
            }
            Stmt::Try { body, catches, finally } => {
                let mut branches: Vec<&[Stmt]> = vec![body.as_slice()];
                branches.extend(catches.iter().map(Vec::as_slice));
                let merged = self.exec_branches(scope, &branches);
                *scope = merged;
                for stmt in finally {
                    self.exec_stmt(stmt, scope);
                }
            }
            Stmt::Throw(expr) => {
                self.eval_expr(expr, scope);
            }
            Stmt::Other => {}
        }
    }

    fn exec_global(&mut self, scope: &mut Scope, name: &str, _line: u32) {
        let global_id = self.symbols.intern(&format!("global/${name}"));
        if !self.symbols.has(global_id) {
            self.symbols.set(global_id, Triple::safe());
        }
        let snapshot = self.symbols.get(global_id);
        let local_id = self.symbol_for_name(scope, name);
        self.symbols.set(local_id, snapshot);
    }

    fn exec_static(&mut self, scope: &mut Scope, name: &str, _init: Option<&Expr>, _line: u32) {
        let id = self.symbol_for_name(scope, name);
        self.symbols.set(id, Triple::safe());
    }

    fn exec_nested_function_decl(&mut self, name: &str, body: &[Stmt]) {
        use sentinel_core::types::identifiers::InternedId;
        let id = self.resolve_function(name).unwrap_or_else(|| {
            self.declare_function(FunctionDef {
                id: FunctionId::from_index(0),
                name: name.to_string(),
                params: Vec::new(),
                variadic: None,
                declared_return_categories: None,
            })
        });
        self.analyze_function(id, body);
    }

    /// §4.5 — return handling.
    fn handle_return(&mut self, func: FunctionId, ret: &Triple) {
        let stripped = strip_exec_structural(&ret.taint);
        let def = self.function_def(func).cloned();
        let masked = match def.as_ref().and_then(|d| d.declared_return_categories) {
            Some(mask) => Taintedness::with_flags(stripped.collapse() & mask),
            None => stripped,
        };

        let mut contract = FunctionContract::safe_default();
        contract.set_overall(masked);

        if let Some(def) = &def {
            for (i, _param) in def.params.iter().enumerate() {
                contract.set_preserved(i, ret.links.preserved_taint_for_param(func, i));
                contract.set_error_lines(i, ret.cause.filter_for_param(func, i));
            }
            if def.variadic.is_some() {
                let idx = def.params.len();
                contract.variadic_preserved = Some(ret.links.preserved_taint_for_param(func, idx));
            }
        }

        self.merge_contract(func, &contract);
    }

    pub fn eval_expr(&mut self, expr: &Expr, scope: &mut Scope) -> Triple {
        match expr {
            Expr::IntLit(_) | Expr::StrLit(_) | Expr::BoolLit(_) | Expr::NullLit | Expr::ClassConstant => Triple::safe(),
            Expr::BooleanProbe(inner) => {
                self.eval_expr(inner, scope);
                Triple::safe()
            }

            Expr::Variable { name, line } => self.eval_variable(scope, name, *line),

            Expr::Subscript { base, key, .. } => {
                let base_triple = self.eval_expr(base, scope);
                let (resolved_key, key_cause) = match key {
                    Some(k) => {
                        let kt = self.eval_expr(k, scope);
                        (literal_key(k), Some(kt.cause))
                    }
                    None => (None, None),
                };
                let taint = base_triple.taint.project(resolved_key.as_ref());
                let links = base_triple.links.project(resolved_key.as_ref());
                let mut cause = base_triple.cause;
                if let Some(kc) = key_cause {
                    cause = cause.merge(&kc);
                }
                Triple { taint, cause, links }
            }

            Expr::Property { object, name, dynamic_object, .. } => {
                let obj_triple = self.eval_expr(object, scope);
                let prop_id = self.symbols.intern(&format!("prop:{name}"));
                let mut stored = self.symbols.get(prop_id);
                if *dynamic_object {
                    stored.taint.flags |= obj_triple.taint.collapse();
                }
                stored.cause = stored.cause.merge(&obj_triple.cause);
                stored
            }

            Expr::Binary { op, left, right, .. } => {
                let l = self.eval_expr(left, scope);
                let r = self.eval_expr(right, scope);
                Triple {
                    taint: combine_binary_taint(*op, &l.taint, &r.taint),
                    cause: l.cause.merge(&r.cause),
                    links: l.links.merge(&r.links),
                }
            }

            Expr::Unary { op, operand, .. } => {
                let t = self.eval_expr(operand, scope);
                match op {
                    UnaryOp::Preserving => t,
                    UnaryOp::Coercing => Triple::safe(),
                }
            }

            Expr::Cast { kind, operand, .. } => {
                let t = self.eval_expr(operand, scope);
                match kind {
                    CastKind::Preserving => Triple {
                        taint: Taintedness::with_flags(t.taint.collapse()),
                        cause: t.cause,
                        links: t.links,
                    },
                    CastKind::Coercing => Triple::safe(),
                }
            }

            Expr::IncDec { operand, .. } => self.eval_expr(operand, scope),

            Expr::Conditional { cond, then_branch, else_branch, .. } => {
                let cond_triple = self.eval_expr(cond, scope);
                let then_triple = match then_branch {
                    Some(b) => self.eval_expr(b, scope),
                    None => cond_triple,
                };
                let else_triple = self.eval_expr(else_branch, scope);
                then_triple.merge(&else_triple)
            }

            Expr::Match { arms, .. } => {
                let mut acc: Option<Triple> = None;
                for arm in arms {
                    let t = self.eval_expr(&arm.body, scope);
                    if arm.diverges {
                        continue;
                    }
                    acc = Some(match acc {
                        Some(a) => a.merge(&t),
                        None => t,
                    });
                }
                acc.unwrap_or_default()
            }

            Expr::ArrayLiteral { items, .. } => self.eval_array_literal(items, scope),

            Expr::Interpolation { parts, .. } => {
                let mut flags = FlagSet::EMPTY;
                let mut cause = CausedByLines::new();
                let mut links = MethodLinks::none();
                for part in parts {
                    let t = self.eval_expr(part, scope);
                    flags |= t.taint.collapse();
                    cause = cause.merge(&t.cause);
                    links = links.merge(&t.links);
                }
                Triple { taint: Taintedness::with_flags(flags), cause, links }
            }

            Expr::Clone { operand, .. } => self.eval_expr(operand, scope),

            Expr::Assign { target, value, augmented_op, line } => {
                let value_triple = self.eval_expr(value, scope);
                self.assign(scope, target, value_triple, *augmented_op, *line)
            }

            Expr::Sink { kind, arg, line } => {
                let value_triple = match arg {
                    Some(a) => self.eval_expr(a, scope),
                    None => Triple::safe(),
                };
                let sink_flags = match kind {
                    SinkKind::Echo => FlagSet::exec(Category::Html),
                    SinkKind::ShellExec => FlagSet::exec(Category::Shell),
                    SinkKind::EvalOrInclude => FlagSet::exec(Category::Shell) | FlagSet::exec(Category::Serialize),
                };
                self.sink_protocol(sink_flags, &value_triple, *line);
                Triple::safe()
            }

            Expr::Call { callee, args, line } => self.call(scope, callee, args, *line),

            Expr::New { class, args, to_string_methods, line } => {
                if let Some(class_expr) = class {
                    self.eval_expr(class_expr, scope);
                }
                for arg in args {
                    self.eval_expr(&arg.value, scope);
                }
                let mut acc: Option<Triple> = None;
                for method in to_string_methods {
                    let t = self.call(scope, &Callee::Named(method.clone()), &[], *line);
                    acc = Some(match acc {
                        Some(a) => a.merge(&t),
                        None => t,
                    });
                }
                acc.unwrap_or_default()
            }

            Expr::Other => Triple::inapplicable(),
        }
    }

    /// `[key => value, ...]` (§4.3 "Array literal"): builds a fresh shape
    /// keyed by each element's resolved key, auto-incrementing for bare
    /// values, and applies the same `SQL_NUMKEY` rule the assignment path
    /// applies for an indexed write of a SQL-tainted value.
    fn eval_array_literal(&mut self, items: &[crate::ast::ArrayItem], scope: &mut Scope) -> Triple {
        let mut result_taint = Taintedness::safe();
        let mut result_links = MethodLinks::none();
        let mut cause = CausedByLines::new();
        let mut next_index: i64 = 0;
        let mut numkey_triggered = false;

        for item in items {
            let (resolved_key, key_taint) = match &item.key {
                Some(k) => {
                    let kt = self.eval_expr(k, scope);
                    (literal_key(k), kt.taint.collapse())
                }
                None => {
                    let k = crate::lattice::Key::Int(next_index);
                    next_index += 1;
                    (Some(k), FlagSet::EMPTY)
                }
            };

            let value_triple = self.eval_expr(&item.value, scope);
            result_taint = result_taint.set_at(resolved_key.as_ref(), value_triple.taint.clone(), true);
            result_taint.key_flags |= key_taint;
            result_links = result_links.set_at(resolved_key.as_ref(), value_triple.links.clone(), true);
            cause = cause.merge(&value_triple.cause);

            if matches!(resolved_key, Some(crate::lattice::Key::Int(_)))
                && value_triple.taint.collapse().has_category_yes(Category::Sql)
            {
                numkey_triggered = true;
            }
        }

        if numkey_triggered {
            result_taint.flags |= FlagSet::yes(Category::SqlNumkey);
        }

        Triple { taint: result_taint, cause, links: result_links }
    }

    fn eval_variable(&mut self, scope: &Scope, name: &str, line: u32) -> Triple {
        if let Some(taint) = crate::superglobals::superglobal_taint(name) {
            let mut cause = CausedByLines::new();
            cause.push(crate::lattice::cause::CauseEntry {
                line,
                taint: taint.collapse(),
                links: Default::default(),
                description: format!("${name}"),
            });
            return Triple { taint, cause, links: MethodLinks::none() };
        }

        match scope.resolve(name) {
            Some(id) => self.symbols.get(id),
            None => {
                tracing::warn!(variable = name, line, "read of unbound variable, treating as unknown");
                Triple::unknown()
            }
        }
    }
}

/// The per-operator taint rule shared by a plain `Binary` expression (§4.3)
/// and an augmented assignment's implicit binary op (§4.7): `Concat` unions
/// both operands' flags, `ArrayPlus` takes the left-wins array union, and
/// `Arithmetic`/`Coercing` kill taint entirely.
pub(crate) fn combine_binary_taint(op: BinaryOp, l: &Taintedness, r: &Taintedness) -> Taintedness {
    match op {
        BinaryOp::Concat => Taintedness::with_flags(l.collapse() | r.collapse()),
        BinaryOp::ArrayPlus => l.array_plus(r),
        BinaryOp::Arithmetic | BinaryOp::Coercing => Taintedness::safe(),
    }
}

fn strip_exec_structural(t: &Taintedness) -> Taintedness {
    Taintedness {
        flags: strip_exec_flags(t.flags),
        key_flags: strip_exec_flags(t.key_flags),
        known: t.known.iter().map(|(k, v)| (k.clone(), strip_exec_structural(v))).collect(),
        unknown: t.unknown.as_ref().map(|u| Box::new(strip_exec_structural(u))),
    }
}

fn strip_exec_flags(flags: FlagSet) -> FlagSet {
    let exec_mask = Category::ALL.into_iter().fold(FlagSet::EMPTY, |acc, c| acc | FlagSet::exec(c));
    flags.difference(exec_mask)
}
