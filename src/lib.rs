//! Time-Optimal Path Parameterization via Reachability Analysis (TOPP-RA).
//!
//! Given a geometric path discretized into `N+1` grid points and a set of
//! path-dependent constraints, [`sweep::TrajectorySolver`] computes the
//! minimum-time scalar velocity profile `sdot(s)` that respects every
//! constraint, via a backward controllability sweep followed by a forward
//! greedy pass. Each stage reduces to a small dense quadratic program solved
//! by [`qp::DenseQp`].

pub mod assembly;
pub mod config;
pub mod constraint;
pub mod diagnostics;
pub mod grid;
pub mod linalg;
pub mod primitives;
pub mod qp;
pub mod sweep;

#[cfg(test)]
pub mod tests;

/// Scalar element type used throughout the solver.
pub type E = f64;

/// Shared numerical tolerances and box bounds used throughout the solver.
pub const SUPERTINY: E = 1e-10;
pub const TINY: E = 1e-8;
pub const SMALL: E = 1e-5;
pub const INFTY: E = 1e8;
pub const MAXU: E = 100.0;
pub const MAXX: E = 100.0;
/// Number of reserved operational rows at the top of every stage's constraint block.
pub const NOP: usize = 3;
/// Default interior-point iteration budget per QP solve (mirrors qpOASES' `nWSR`).
pub const NWSR_CNST: usize = 1000;

/// Status codes shared by the QP backend and the sweep algorithms.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Status {
    #[default]
    /// The solver is still running.
    InProgress,
    /// An optimal solution was found.
    Optimal,
    /// The problem is infeasible.
    Infeasible,
    /// The problem is unbounded.
    Unbounded,
    /// The status is unknown or not determined.
    Unknown,
    /// The solver stopped due to a time limit.
    TimeLimit,
    /// The solver stopped due to an iteration limit.
    IterationLimit,
}
