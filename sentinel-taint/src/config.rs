//! The explicit `Configuration` value threaded through the visitor's
//! constructor (Design Notes §9: "model this as an explicit Configuration
//! value... the singleton form is incidental").

use sentinel_core::AnalysisError;

use crate::builtins::{self, BuiltinSignature};
use crate::diagnostics::SinkFinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomSlot {
    Custom1,
    Custom2,
}

impl CustomSlot {
    fn label(self) -> &'static str {
        match self {
            CustomSlot::Custom1 => "custom1",
            CustomSlot::Custom2 => "custom2",
        }
    }
}

/// Plugin-provided configuration: custom category names, the false-positive
/// hook, and the built-in function table (project-overridable).
pub struct Configuration {
    custom_categories: [Option<String>; 2],
    false_positive_hook: Option<Box<dyn Fn(&SinkFinding) -> bool + Send + Sync>>,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            custom_categories: [None, None],
            false_positive_hook: None,
        }
    }
}

impl Configuration {
    pub fn new() -> Configuration {
        Configuration::default()
    }

    /// Register a name for `CUSTOM1`/`CUSTOM2`. Registering the same name
    /// into the other slot is a configuration error (§7 "User-facing fatal"
    /// is too strong here — this surfaces as `AnalysisError` at setup time,
    /// before any pass runs, per §10.3).
    pub fn with_custom_category(mut self, slot: CustomSlot, name: impl Into<String>) -> Result<Configuration, AnalysisError> {
        let name = name.into();
        let other = match slot {
            CustomSlot::Custom1 => &self.custom_categories[1],
            CustomSlot::Custom2 => &self.custom_categories[0],
        };
        if let Some(existing) = other {
            if *existing == name {
                let other_slot = match slot {
                    CustomSlot::Custom1 => CustomSlot::Custom2,
                    CustomSlot::Custom2 => CustomSlot::Custom1,
                };
                return Err(AnalysisError::DuplicateCustomCategory {
                    name,
                    existing: other_slot.label(),
                });
            }
        }
        let idx = match slot {
            CustomSlot::Custom1 => 0,
            CustomSlot::Custom2 => 1,
        };
        self.custom_categories[idx] = Some(name);
        Ok(self)
    }

    pub fn custom_category_name(&self, slot: CustomSlot) -> Option<&str> {
        let idx = match slot {
            CustomSlot::Custom1 => 0,
            CustomSlot::Custom2 => 1,
        };
        self.custom_categories[idx].as_deref()
    }

    pub fn with_false_positive_hook<F>(mut self, hook: F) -> Configuration
    where
        F: Fn(&SinkFinding) -> bool + Send + Sync + 'static,
    {
        self.false_positive_hook = Some(Box::new(hook));
        self
    }

    /// Runs the plugin's false-positive hook, if any. A panicking hook is
    /// caught at this boundary and treated as "not a false positive" (§10.3):
    /// the analyzer never lets a misbehaving plugin suppress a real finding
    /// silently via a crash, but it also never aborts the host's pass.
    pub fn is_false_positive(&self, finding: &SinkFinding) -> bool {
        let Some(hook) = &self.false_positive_hook else {
            return false;
        };
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hook(finding))).unwrap_or(false)
    }

    pub fn lookup_builtin(&self, name: &str) -> Option<BuiltinSignature> {
        builtins::lookup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Category;
    use crate::lattice::CausedByLines;

    fn finding() -> SinkFinding {
        SinkFinding {
            category: Category::Html,
            line: 1,
            cause: CausedByLines::new(),
        }
    }

    #[test]
    fn duplicate_custom_category_name_is_rejected() {
        let config = Configuration::new().with_custom_category(CustomSlot::Custom1, "tenant_id").unwrap();
        let err = config.with_custom_category(CustomSlot::Custom2, "tenant_id").unwrap_err();
        assert_eq!(sentinel_core::ErrorCode::error_code(&err), "TAINT_DUPLICATE_CUSTOM_CATEGORY");
    }

    #[test]
    fn distinct_custom_category_names_are_accepted() {
        let config = Configuration::new()
            .with_custom_category(CustomSlot::Custom1, "tenant_id")
            .unwrap()
            .with_custom_category(CustomSlot::Custom2, "request_id")
            .unwrap();
        assert_eq!(config.custom_category_name(CustomSlot::Custom1), Some("tenant_id"));
        assert_eq!(config.custom_category_name(CustomSlot::Custom2), Some("request_id"));
    }

    #[test]
    fn no_hook_means_nothing_is_a_false_positive() {
        let config = Configuration::new();
        assert!(!config.is_false_positive(&finding()));
    }

    #[test]
    fn hook_can_mark_a_finding_as_false_positive() {
        let config = Configuration::new().with_false_positive_hook(|f| f.line == 1);
        assert!(config.is_false_positive(&finding()));
    }

    #[test]
    fn panicking_hook_does_not_abort_and_is_not_a_false_positive() {
        let config = Configuration::new().with_false_positive_hook(|_| panic!("boom"));
        assert!(!config.is_false_positive(&finding()));
    }
}
