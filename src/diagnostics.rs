//! Verbose-gated structured diagnostics.
//!
//! A full `Callback` trait invoked by the outer loop at every iteration is
//! overkill here: this crate has one caller (the sweep) and one event worth
//! reporting (a primitive failing at a stage), so it collapses to a small
//! struct gating `eprintln!` rather than an external logging facade.

use crate::{E, Status};

pub struct Diagnostics {
    verbose: bool,
}

impl Diagnostics {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Reports that a set-projection primitive at stage `i` could not
    /// establish feasibility over `[xmin, xmax]`.
    pub fn primitive_failure(
        &self,
        i: usize,
        xmin: E,
        xmax: E,
        init: bool,
        status_up: Status,
        status_down: Status,
    ) {
        if !self.verbose {
            return;
        }
        eprintln!(
            "stage {i}: xmin={xmin:.6} xmax={xmax:.6} init={init} up={status_up:?} down={status_down:?}"
        );
    }

    /// Reports the controllable/reachable interval computed at stage `i`.
    pub fn stage_interval(&self, label: &str, i: usize, lo: E, hi: E) {
        if !self.verbose {
            return;
        }
        eprintln!("{label} stage {i}: [{lo:.6}, {hi:.6}]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_diagnostics_do_not_panic() {
        let d = Diagnostics::new(false);
        d.primitive_failure(0, 0.0, 1.0, true, Status::Optimal, Status::Optimal);
        d.stage_interval("K", 0, 0.0, 1.0);
    }
}
