//! C5 — per-function taint contracts.
//!
//! A contract is the analyzer's summary of a function: how its return value
//! is tainted overall, which parameter positions act as sinks, and which
//! categories of each parameter's taint survive into the return value
//! (`preserved`, used to lazily transfer argument taint to callers — §4.5/§4.6).
//! Contracts only ever grow (§3.5 invariant); [`FunctionContract::merge_in`]
//! returns whether anything changed so the host can decide whether another
//! pass is warranted (Design Notes §9, "monotone fixpoint").

use crate::lattice::{CausedByLines, Taintedness};

/// Alias used where the spec calls out a `PreservedTaintedness` projection
/// distinctly from an ordinary [`Taintedness`] — same shape, different role.
pub type PreservedTaintedness = Taintedness;

#[derive(Debug, Clone, Default)]
pub struct FunctionCausedByLines {
    pub params: Vec<CausedByLines>,
    pub variadic: Option<CausedByLines>,
}

impl FunctionCausedByLines {
    fn ensure_len(&mut self, len: usize) {
        if self.params.len() < len {
            self.params.resize(len, CausedByLines::new());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionContract {
    pub overall: Taintedness,
    /// Per-parameter sink ("exec") behavior: non-zero exec bits here mean
    /// the sink protocol (§4.4) runs on whatever argument lands in that slot.
    pub params: Vec<Taintedness>,
    pub variadic_param: Option<Taintedness>,
    /// Per-parameter projection of which categories reach the return value.
    pub preserved: Vec<PreservedTaintedness>,
    pub variadic_preserved: Option<PreservedTaintedness>,
    pub error_lines: FunctionCausedByLines,
    /// Per-parameter taint the function's body leaves behind in a by-ref
    /// parameter once the body finishes (§4.6 "by-reference parameters").
    /// Not named in §3.5's `FunctionTaintedness` record directly, but
    /// required to make the by-ref write-back in the call handler concrete
    /// rather than a no-op; grows monotonically like every other field.
    pub byref_output: Vec<Taintedness>,

    /// User (`@param-taint`/`@return-taint`) annotation locks (`NO_OVERRIDE`, §6).
    overall_locked: bool,
    params_locked: Vec<bool>,
}

impl FunctionContract {
    pub fn safe_default() -> FunctionContract {
        FunctionContract::default()
    }

    fn ensure_param_len(&mut self, len: usize) {
        if self.params.len() < len {
            self.params.resize(len, Taintedness::safe());
        }
        if self.preserved.len() < len {
            self.preserved.resize(len, Taintedness::safe());
        }
        if self.params_locked.len() < len {
            self.params_locked.resize(len, false);
        }
        if self.byref_output.len() < len {
            self.byref_output.resize(len, Taintedness::safe());
        }
        self.error_lines.ensure_len(len);
    }

    pub fn param(&self, index: usize) -> Taintedness {
        self.params.get(index).cloned().unwrap_or_default()
    }

    pub fn preserved(&self, index: usize) -> PreservedTaintedness {
        self.preserved.get(index).cloned().unwrap_or_default()
    }

    pub fn byref_output(&self, index: usize) -> Taintedness {
        self.byref_output.get(index).cloned().unwrap_or_default()
    }

    pub fn set_byref_output(&mut self, index: usize, taint: Taintedness) {
        self.ensure_param_len(index + 1);
        self.byref_output[index] = taint;
    }

    /// Lock the whole contract (user `@return-taint ... ` without `allow_override`, §6).
    pub fn lock_overall(&mut self) {
        self.overall_locked = true;
    }

    /// Lock a single parameter slot (user `@param-taint` without `allow_override`).
    pub fn lock_param(&mut self, index: usize) {
        self.ensure_param_len(index + 1);
        self.params_locked[index] = true;
    }

    pub fn set_overall(&mut self, taint: Taintedness) {
        self.overall = taint;
    }

    pub fn set_param(&mut self, index: usize, taint: Taintedness) {
        self.ensure_param_len(index + 1);
        self.params[index] = taint;
    }

    pub fn set_preserved(&mut self, index: usize, preserved: PreservedTaintedness) {
        self.ensure_param_len(index + 1);
        self.preserved[index] = preserved;
    }

    pub fn set_error_lines(&mut self, index: usize, lines: CausedByLines) {
        self.ensure_param_len(index + 1);
        self.error_lines.params[index] = lines;
    }

    /// Merge `other` into `self`, bits-only-grow (§3.5 invariant), respecting
    /// `NO_OVERRIDE` locks. Returns `true` if anything actually changed, for
    /// the host's fixpoint-termination check (Design Notes §9).
    pub fn merge_in(&mut self, other: &FunctionContract) -> bool {
        let mut changed = false;

        if !self.overall_locked {
            let merged = self.overall.merge(&other.overall);
            if merged != self.overall {
                self.overall = merged;
                changed = true;
            }
        }

        let max_len = self.params.len().max(other.params.len());
        self.ensure_param_len(max_len);

        for i in 0..max_len {
            if self.params_locked.get(i).copied().unwrap_or(false) {
                continue;
            }
            let other_param = other.param(i);
            let merged = self.params[i].merge(&other_param);
            if merged != self.params[i] {
                self.params[i] = merged;
                changed = true;
            }
            let other_preserved = other.preserved(i);
            let merged_preserved = self.preserved[i].merge(&other_preserved);
            if merged_preserved != self.preserved[i] {
                self.preserved[i] = merged_preserved;
                changed = true;
            }
            let other_byref = other.byref_output(i);
            let merged_byref = self.byref_output[i].merge(&other_byref);
            if merged_byref != self.byref_output[i] {
                self.byref_output[i] = merged_byref;
                changed = true;
            }
        }

        if !self.overall_locked {
            self.variadic_param = merge_option(&self.variadic_param, &other.variadic_param);
            self.variadic_preserved = merge_option(&self.variadic_preserved, &other.variadic_preserved);
        }

        changed
    }
}

fn merge_option(a: &Option<Taintedness>, b: &Option<Taintedness>) -> Option<Taintedness> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (Some(a), Some(b)) => Some(a.merge(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{Category, FlagSet};

    #[test]
    fn merge_in_is_monotone_bits_only_grow() {
        let mut contract = FunctionContract::safe_default();
        contract.set_overall(Taintedness::with_flags(FlagSet::yes(Category::Html)));

        let mut other = FunctionContract::safe_default();
        other.set_overall(Taintedness::with_flags(FlagSet::yes(Category::Sql)));

        let changed = contract.merge_in(&other);
        assert!(changed);
        assert!(contract.overall.flags.contains(FlagSet::yes(Category::Html)));
        assert!(contract.overall.flags.contains(FlagSet::yes(Category::Sql)));

        // Re-merging the same contract changes nothing further.
        let changed_again = contract.merge_in(&other);
        assert!(!changed_again);
    }

    #[test]
    fn locked_overall_ignores_merges() {
        let mut contract = FunctionContract::safe_default();
        contract.lock_overall();
        let mut other = FunctionContract::safe_default();
        other.set_overall(Taintedness::with_flags(FlagSet::yes(Category::Html)));
        let changed = contract.merge_in(&other);
        assert!(!changed);
        assert!(contract.overall.flags.is_empty());
    }

    #[test]
    fn locked_param_ignores_merges_but_others_still_flow() {
        let mut contract = FunctionContract::safe_default();
        contract.set_param(0, Taintedness::safe());
        contract.lock_param(0);
        let mut other = FunctionContract::safe_default();
        other.set_param(0, Taintedness::with_flags(FlagSet::exec(Category::Sql)));
        other.set_param(1, Taintedness::with_flags(FlagSet::exec(Category::Html)));
        contract.merge_in(&other);
        assert!(contract.param(0).flags.is_empty());
        assert!(contract.param(1).flags.contains(FlagSet::exec(Category::Html)));
    }
}
