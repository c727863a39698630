//! The built-in function-taint table (§6) — escapers, sinks, and
//! passthroughs with hardcoded contracts. Every entry is installed with
//! `NO_OVERRIDE` forced (§6: "`NO_OVERRIDE` is forced for all entries"), so
//! project-level docblocks can never weaken a built-in's known behavior.

use crate::flags::{Category, FlagSet};
use crate::lattice::Taintedness;

/// A built-in's hardcoded shape: sink behavior per parameter, and which
/// parameter categories survive into the return value.
#[derive(Debug, Clone)]
pub struct BuiltinSignature {
    pub overall: Taintedness,
    /// Per-parameter sink ("exec") taint; index beyond `len` means safe.
    pub params: Vec<Taintedness>,
    /// Per-parameter preserved-to-return projection.
    pub preserved: Vec<Taintedness>,
}

impl BuiltinSignature {
    fn new(overall: FlagSet, params: Vec<FlagSet>, preserved: Vec<FlagSet>) -> BuiltinSignature {
        BuiltinSignature {
            overall: Taintedness::with_flags(overall),
            params: params.into_iter().map(Taintedness::with_flags).collect(),
            preserved: preserved.into_iter().map(Taintedness::with_flags).collect(),
        }
    }

    fn sink(param_count: usize, sink_param: usize, sink: FlagSet) -> BuiltinSignature {
        let mut params = vec![FlagSet::EMPTY; param_count];
        params[sink_param] = sink;
        BuiltinSignature::new(FlagSet::EMPTY, params, vec![FlagSet::EMPTY; param_count])
    }

    fn escaper(category: Category) -> BuiltinSignature {
        // Removes `category`, installs `ESCAPED` on the return, and preserves
        // every other category straight through (§6 `escapes_{cat}` token,
        // §GLOSSARY "Escaper"). The parameter's own sink mask is
        // `ESCAPED_EXEC` only, not `{cat}_EXEC`: a raw, not-yet-escaped
        // argument is this function's intended legitimate use and must not
        // itself report a diagnostic — only a value that is *already*
        // `ESCAPED` (i.e. has been through an escaper once) should, which is
        // exactly the double-escape case (§8 scenario 2). The docblock
        // `escapes_{cat}` token (§6) is a stricter, user-facing annotation
        // grammar and intentionally differs from this hardcoded shape.
        let preserved_mask = Category::ALL
            .into_iter()
            .filter(|&c| c != category)
            .fold(FlagSet::EMPTY, |acc, c| acc | FlagSet::yes(c));
        BuiltinSignature {
            overall: Taintedness::with_flags(FlagSet::yes(Category::Escaped)),
            params: vec![Taintedness::with_flags(FlagSet::exec(Category::Escaped))],
            preserved: vec![Taintedness::with_flags(preserved_mask)],
        }
    }

    fn passthrough(param_count: usize) -> BuiltinSignature {
        let all = Category::ALL.into_iter().fold(FlagSet::EMPTY, |acc, c| acc | FlagSet::yes(c));
        BuiltinSignature::new(FlagSet::EMPTY, vec![FlagSet::EMPTY; param_count], vec![all; param_count])
    }
}

/// Looks up `name` (already normalized to the host's fully-qualified callee
/// spelling) in the built-in table.
pub fn lookup(name: &str) -> Option<BuiltinSignature> {
    Some(match name {
        // Escapers.
        "htmlspecialchars" | "htmlentities" => BuiltinSignature::escaper(Category::Html),
        "mysqli_real_escape_string" | "mysql_real_escape_string" | "pg_escape_string" | "addslashes" => {
            BuiltinSignature::escaper(Category::Sql)
        }
        "escapeshellarg" | "escapeshellcmd" => BuiltinSignature::escaper(Category::Shell),

        // Sinks.
        "mysql_query" | "mysqli_query" | "pg_query" => BuiltinSignature::sink(1, 0, FlagSet::exec(Category::Sql)),
        "shell_exec" | "passthru" | "system" | "exec" | "popen" | "proc_open" => {
            BuiltinSignature::sink(1, 0, FlagSet::exec(Category::Shell))
        }
        "eval" => BuiltinSignature::sink(1, 0, FlagSet::exec(Category::Shell) | FlagSet::exec(Category::Serialize)),
        "include" | "include_once" | "require" | "require_once" => {
            BuiltinSignature::sink(1, 0, FlagSet::exec(Category::Shell))
        }
        "file_put_contents" => BuiltinSignature::sink(2, 1, FlagSet::exec(Category::Misc)),
        "printf" | "vprintf" => BuiltinSignature::sink(1, 0, FlagSet::exec(Category::Html)),
        "unserialize" => BuiltinSignature::sink(1, 0, FlagSet::exec(Category::Serialize)),

        // Passthroughs.
        "serialize" => BuiltinSignature::passthrough(1),
        "base64_encode" | "base64_decode" | "trim" | "strtolower" | "strtoupper" | "str_replace" => {
            BuiltinSignature::passthrough(1)
        }

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htmlspecialchars_clears_html_and_sets_escaped() {
        let sig = lookup("htmlspecialchars").unwrap();
        assert!(sig.overall.flags.has_category_yes(Category::Escaped));
        assert!(!sig.overall.flags.has_category_yes(Category::Html));
    }

    #[test]
    fn htmlspecialchars_installs_escaped_exec_sink_only() {
        let sig = lookup("htmlspecialchars").unwrap();
        assert!(sig.params[0].flags.has_category_exec(Category::Escaped));
        assert!(!sig.params[0].flags.has_category_exec(Category::Html));
    }

    #[test]
    fn mysql_query_sinks_first_param_on_sql() {
        let sig = lookup("mysql_query").unwrap();
        assert!(sig.params[0].flags.has_category_exec(Category::Sql));
    }

    #[test]
    fn unknown_name_is_not_a_builtin() {
        assert!(lookup("my_custom_function").is_none());
    }

    #[test]
    fn serialize_preserves_all_categories_to_return() {
        let sig = lookup("serialize").unwrap();
        assert!(sig.preserved[0].flags.has_category_yes(Category::Html));
        assert!(sig.preserved[0].flags.has_category_yes(Category::Sql));
    }
}
