//! C8 — the assignment visitor: writes a computed RHS triple into the
//! symbol table through a (possibly nested) LHS, shape-aware.

use sentinel_core::types::identifiers::SymbolId;

use crate::analyzer::{literal_key, Analyzer};
use crate::ast::{BinaryOp, Expr};
use crate::flags::{Category, FlagSet};
use crate::lattice::cause::CauseEntry;
use crate::lattice::Key;
use crate::symbols::Scope;
use crate::triple::Triple;

impl Analyzer {
    /// `target = value` (or `target op= value` when `augmented_op` is set).
    /// Returns the triple now stored at `target`, for chained assignment
    /// expressions (`$a = $b = $c`).
    pub fn assign(&mut self, scope: &mut Scope, target: &Expr, value: Triple, augmented_op: Option<BinaryOp>, line: u32) -> Triple {
        match target {
            Expr::Variable { name, .. } => {
                let id = self.symbol_for_name(scope, name);
                self.write_symbol(id, value, augmented_op, line, &format!("assignment to ${name}"))
            }
            Expr::Property { name, .. } => {
                let id = self.symbols.intern(&format!("prop:{name}"));
                self.write_symbol(id, value, augmented_op, line, &format!("assignment to ->{name}"))
            }
            Expr::Subscript { .. } => self.assign_subscript(scope, target, value, augmented_op, line),
            Expr::ArrayLiteral { items, .. } => {
                // Destructuring: `[$a, $b] = $rhs` (§4.7).
                let mut next_index: i64 = 0;
                for item in items {
                    let key = item
                        .key
                        .as_ref()
                        .and_then(literal_key)
                        .or_else(|| {
                            let k = Key::Int(next_index);
                            next_index += 1;
                            Some(k)
                        });
                    let slot_taint = value.taint.project(key.as_ref());
                    let slot_links = value.links.project(key.as_ref());
                    let slot = Triple {
                        taint: slot_taint,
                        cause: value.cause.clone(),
                        links: slot_links,
                    };
                    self.assign(scope, &item.value, slot, None, line);
                }
                value
            }
            _ => value,
        }
    }

    pub(crate) fn symbol_for_name(&mut self, scope: &mut Scope, name: &str) -> SymbolId {
        if let Some(id) = scope.resolve(name) {
            return id;
        }
        let scope_key = match self.current_function() {
            Some(func) => format!("fn:{func}/${name}"),
            None => format!("global/${name}"),
        };
        let id = self.symbols.intern(&scope_key);
        scope.bind(name, id);
        id
    }

    fn write_symbol(&mut self, id: SymbolId, value: Triple, augmented_op: Option<BinaryOp>, line: u32, description: &str) -> Triple {
        let existing = self.symbols.get(id);
        let new_taint = match augmented_op {
            None => value.taint.clone(),
            // §4.7: an augmented op (`$x += $rhs`) is `$x = $x <op> $rhs` —
            // route through the same per-operator masking a plain binary
            // expression gets, not an unconditional merge (an `Arithmetic`
            // augmented op must kill taint, same as `$x = $x + $rhs` does).
            Some(op) => crate::visitor::combine_binary_taint(op, &existing.taint, &value.taint),
        };
        let new_links = match augmented_op {
            None => value.links.clone(),
            Some(_) => existing.links.merge(&value.links),
        };
        let mut cause = existing.cause.merge(&value.cause);
        cause.push(CauseEntry {
            line,
            taint: new_taint.collapse(),
            links: new_links.collapse(),
            description: description.to_string(),
        });
        let stored = Triple {
            taint: new_taint,
            cause,
            links: new_links,
        };
        self.symbols.set(id, stored.clone());
        stored
    }

    /// Unwinds a (possibly nested) subscript chain down to its root
    /// variable/property, collects the key path and each key's own taint,
    /// and writes through `Taintedness::set_at_path`/`MethodLinks::set_at_path`.
    fn assign_subscript(&mut self, scope: &mut Scope, target: &Expr, value: Triple, augmented_op: Option<BinaryOp>, line: u32) -> Triple {
        let mut path: Vec<(Option<Key>, FlagSet)> = Vec::new();
        let mut cursor = target;
        loop {
            match cursor {
                Expr::Subscript { base, key, .. } => {
                    let (resolved_key, key_taint) = match key {
                        Some(key_expr) => {
                            let key_triple = self.eval_expr(key_expr, scope);
                            (literal_key(key_expr), key_triple.taint.collapse())
                        }
                        None => (None, FlagSet::EMPTY),
                    };
                    path.push((resolved_key, key_taint));
                    cursor = base;
                }
                _ => break,
            }
        }
        path.reverse();

        let (root_id, description) = match cursor {
            Expr::Variable { name, .. } => (self.symbol_for_name(scope, name), format!("${name}")),
            Expr::Property { name, .. } => (self.symbols.intern(&format!("prop:{name}")), format!("->{name}")),
            _ => return value,
        };

        let existing = self.symbols.get(root_id);
        let do_override = augmented_op.is_none();
        let keys: Vec<Option<Key>> = path.iter().map(|(k, _)| k.clone()).collect();
        let key_taints: Vec<FlagSet> = path.iter().map(|(_, t)| *t).collect();

        let mut new_taint = existing.taint.set_at_path(&keys, &key_taints, value.taint.clone(), do_override);
        let new_links = existing.links.set_at_path(&keys, value.links.clone(), do_override);

        // Numkey special case (§4.7 last bullet): an indexed (integer-keyed)
        // write of a SQL-tainted value recomputes `SQL_NUMKEY` on the root,
        // same as the array-literal rule (§4.3).
        if let Some(Some(Key::Int(_))) = keys.last() {
            if value.taint.collapse().has_category_yes(Category::Sql) {
                new_taint.flags |= FlagSet::yes(Category::SqlNumkey);
            }
        }

        let mut cause = existing.cause.merge(&value.cause);
        cause.push(CauseEntry {
            line,
            taint: new_taint.collapse(),
            links: new_links.collapse(),
            description: format!("assignment to {description}[...]"),
        });

        self.symbols.set(
            root_id,
            Triple {
                taint: new_taint,
                cause: cause.clone(),
                links: new_links,
            },
        );

        Triple {
            taint: value.taint,
            cause,
            links: value.links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::flags::{Category, FlagSet};
    use crate::lattice::Taintedness;

    fn html_triple() -> Triple {
        Triple::with_taint(Taintedness::with_flags(FlagSet::yes(Category::Html)))
    }

    #[test]
    fn simple_variable_assignment_round_trips() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        let stored = analyzer.assign(&mut scope, &Expr::Variable { name: "x".into(), line: 1 }, html_triple(), None, 1);
        assert!(stored.taint.flags.has_category_yes(Category::Html));
        let id = scope.resolve("x").unwrap();
        assert_eq!(analyzer.symbols.get(id).taint, stored.taint);
    }

    #[test]
    fn shape_preserving_subscript_assignment_does_not_leak() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        analyzer.assign(
            &mut scope,
            &Expr::Variable { name: "a".into(), line: 1 },
            Triple::safe(),
            None,
            1,
        );
        analyzer.assign(
            &mut scope,
            &Expr::Subscript {
                base: Box::new(Expr::Variable { name: "a".into(), line: 2 }),
                key: Some(Box::new(Expr::StrLit("danger".into()))),
                line: 2,
            },
            html_triple(),
            None,
            2,
        );
        let id = scope.resolve("a").unwrap();
        let stored = analyzer.symbols.get(id);
        let danger = stored.taint.project(Some(&Key::from("danger")));
        let safe = stored.taint.project(Some(&Key::from("safe")));
        assert!(danger.collapse().contains(FlagSet::yes(Category::Html)));
        assert!(safe.collapse().is_empty());
    }

    #[test]
    fn arithmetic_augmented_assignment_kills_taint_like_its_plain_form() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        analyzer.assign(&mut scope, &Expr::Variable { name: "x".into(), line: 1 }, Triple::safe(), None, 1);
        let stored = analyzer.assign(
            &mut scope,
            &Expr::Variable { name: "x".into(), line: 2 },
            html_triple(),
            Some(BinaryOp::Arithmetic),
            2,
        );
        assert!(stored.taint.collapse().is_empty());
    }

    #[test]
    fn concat_augmented_assignment_unions_existing_and_incoming_taint() {
        let mut analyzer = Analyzer::new(Configuration::new(), "t.php");
        let mut scope = Scope::new();
        analyzer.assign(
            &mut scope,
            &Expr::Variable { name: "x".into(), line: 1 },
            Triple::with_taint(Taintedness::with_flags(FlagSet::yes(Category::Sql))),
            None,
            1,
        );
        let stored = analyzer.assign(
            &mut scope,
            &Expr::Variable { name: "x".into(), line: 2 },
            html_triple(),
            Some(BinaryOp::Concat),
            2,
        );
        assert!(stored.taint.collapse().contains(FlagSet::yes(Category::Sql)));
        assert!(stored.taint.collapse().contains(FlagSet::yes(Category::Html)));
    }
}
