//! The `(curTaint, curError, curLinks)` triple (§4.3) the propagation
//! visitor computes for every AST node.

use crate::lattice::{CausedByLines, MethodLinks, Taintedness};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triple {
    pub taint: Taintedness,
    pub cause: CausedByLines,
    pub links: MethodLinks,
}

impl Triple {
    pub fn safe() -> Triple {
        Triple::default()
    }

    pub fn inapplicable() -> Triple {
        Triple {
            taint: Taintedness::inapplicable(),
            ..Default::default()
        }
    }

    pub fn unknown() -> Triple {
        Triple {
            taint: Taintedness::unknown_sentinel(),
            ..Default::default()
        }
    }

    pub fn with_taint(taint: Taintedness) -> Triple {
        Triple {
            taint,
            ..Default::default()
        }
    }

    pub fn merge(&self, other: &Triple) -> Triple {
        Triple {
            taint: self.taint.merge(&other.taint),
            cause: self.cause.merge(&other.cause),
            links: self.links.merge(&other.links),
        }
    }
}
