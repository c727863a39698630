//! Docblock annotation parsing (§6) — a pure string-to-flags function.
//!
//! `@param-taint $name token[, token]*` and `@return-taint token[, token]*`,
//! tokens drawn from `{cat}`, `exec_{cat}`, `escapes_{cat}`,
//! `onlysafefor_{cat}`, plus the modifiers `array_ok`, `allow_override`,
//! `raw_param`. Malformed input never aborts analysis (§7): it is reported
//! as a non-fatal [`AnalysisError`] and the caller treats the annotation as
//! absent.

use sentinel_core::AnalysisError;

use crate::flags::{Category, FlagSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAnnotation {
    pub flags: FlagSet,
    /// `allow_override` was present — the contract slot stays mergeable
    /// instead of being locked with `NO_OVERRIDE`.
    pub allow_override: bool,
}

/// Parse `@param-taint $name token[, token]*`, returning the parameter name
/// and its parsed flags.
pub fn parse_param_taint(line: &str) -> Result<(String, ParsedAnnotation), AnalysisError> {
    let rest = strip_tag(line, "@param-taint")?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("@param-taint is missing a parameter name"))?;
    let name = name.trim_start_matches('$').to_string();
    let token_str = parts.next().unwrap_or("");
    let parsed = parse_tokens(token_str)?;
    Ok((name, parsed))
}

/// Parse `@return-taint token[, token]*`.
pub fn parse_return_taint(line: &str) -> Result<ParsedAnnotation, AnalysisError> {
    let rest = strip_tag(line, "@return-taint")?;
    parse_tokens(rest)
}

fn strip_tag<'a>(line: &'a str, tag: &str) -> Result<&'a str, AnalysisError> {
    let trimmed = line.trim().trim_start_matches('*').trim();
    trimmed
        .strip_prefix(tag)
        .map(str::trim)
        .ok_or_else(|| malformed(&format!("expected '{tag}' at the start of '{line}'")))
}

fn parse_tokens(token_str: &str) -> Result<ParsedAnnotation, AnalysisError> {
    let mut result = ParsedAnnotation::default();
    for raw in token_str.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        match token {
            "array_ok" => result.flags |= FlagSet::ARRAY_OK,
            "allow_override" => result.allow_override = true,
            "raw_param" => result.flags |= FlagSet::RAW_PARAM,
            "none" => {}
            "tainted" => result.flags |= crate::superglobals::base_yes_taint(),
            _ => result.flags |= parse_category_token(token)?,
        }
    }
    Ok(result)
}

fn parse_category_token(token: &str) -> Result<FlagSet, AnalysisError> {
    if let Some(cat) = token.strip_prefix("exec_") {
        let category = resolve_category(cat)?;
        return Ok(FlagSet::exec(category));
    }
    if let Some(cat) = token.strip_prefix("escapes_") {
        let category = resolve_category(cat)?;
        // "escapes_html also adds ESCAPED_EXEC" (§6).
        return Ok(FlagSet::exec(category) | FlagSet::exec(Category::Escaped));
    }
    if let Some(cat) = token.strip_prefix("onlysafefor_") {
        let _category = resolve_category(cat)?;
        // "onlysafefor_html adds ESCAPED instead" (§6) — no category-specific bit.
        return Ok(FlagSet::yes(Category::Escaped));
    }
    let category = resolve_category(token)?;
    Ok(FlagSet::yes(category))
}

fn resolve_category(name: &str) -> Result<Category, AnalysisError> {
    // `htmlnoent` is an alias for `html` — the lattice doesn't distinguish
    // entity-encoded from raw HTML escaping, only the category.
    let canonical = if name == "htmlnoent" { "html" } else { name };
    Category::from_name(canonical).ok_or_else(|| malformed(&format!("unknown taint category token '{name}'")))
}

fn malformed(message: &str) -> AnalysisError {
    AnalysisError::MalformedAnnotation {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_param_taint_with_exec_token() {
        let (name, parsed) = parse_param_taint("@param-taint $q exec_sql").unwrap();
        assert_eq!(name, "q");
        assert!(parsed.flags.has_category_exec(Category::Sql));
        assert!(!parsed.allow_override);
    }

    #[test]
    fn parses_multiple_tokens_and_modifiers() {
        let (_, parsed) = parse_param_taint("@param-taint $q exec_sql, exec_sql_numkey, allow_override").unwrap();
        assert!(parsed.flags.has_category_exec(Category::Sql));
        assert!(parsed.flags.has_category_exec(Category::SqlNumkey));
        assert!(parsed.allow_override);
    }

    #[test]
    fn escapes_token_installs_escaped_exec() {
        let parsed = parse_return_taint("@return-taint escapes_html").unwrap();
        assert!(parsed.flags.has_category_exec(Category::Html));
        assert!(parsed.flags.has_category_exec(Category::Escaped));
    }

    #[test]
    fn onlysafefor_token_adds_escaped_not_category() {
        let parsed = parse_return_taint("@return-taint onlysafefor_html").unwrap();
        assert!(!parsed.flags.has_category_yes(Category::Html));
        assert!(parsed.flags.has_category_yes(Category::Escaped));
    }

    #[test]
    fn unknown_category_is_reported_not_fatal() {
        let err = parse_return_taint("@return-taint bogus").unwrap_err();
        assert_eq!(sentinel_core::ErrorCode::error_code(&err), "TAINT_MALFORMED_ANNOTATION");
    }

    #[test]
    fn missing_parameter_name_is_malformed() {
        assert!(parse_param_taint("@param-taint").is_err());
    }
}
