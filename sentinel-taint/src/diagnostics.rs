//! Diagnostics emitted by the sink protocol (§4.4) and rendered per §6:
//! a category, a templated message, the cause-trail rendered as
//! `(file:line) via …`.

use crate::flags::Category;
use crate::lattice::CausedByLines;

/// A candidate security finding, handed to the false-positive hook (§10.4)
/// before it is turned into a [`Diagnostic`].
#[derive(Debug, Clone)]
pub struct SinkFinding {
    pub category: Category,
    pub line: u32,
    pub cause: CausedByLines,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub category: Category,
    pub line: u32,
    pub message: String,
    pub cause_trail: String,
}

impl Diagnostic {
    pub fn from_finding(finding: &SinkFinding, file: &str) -> Diagnostic {
        Diagnostic {
            category: finding.category,
            line: finding.line,
            message: format!(
                "possibly tainted value ({}) reaches a {} sink",
                finding.category.name(),
                finding.category.name()
            ),
            cause_trail: finding.cause.render(file),
        }
    }
}
