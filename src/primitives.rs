//! The five set-projection primitives every sweep is built from.
//!
//! Each primitive poses one or two small LPs over a single stage's
//! `StageAssembly`, using the reserved operational rows to encode whatever
//! extra, call-specific constraint the primitive needs (fixing `x[i]`,
//! bounding `x[i+1]` to a controllable/reachable interval, ...) without
//! touching the constraint set itself, the same way an MPC stage builder
//! builds one QP per time step from a shared static block plus a per-call
//! dynamic row.

use crate::E;
use crate::Status;
use crate::assembly::{Layout, StageAssembly};
use crate::diagnostics::Diagnostics;

/// Row used to fix or bound `x[i]` directly.
const ROW_X: usize = 0;
/// Row used to bound `x[i+1] = x[i] + 2*Ds[i]*u[i]`.
const ROW_X_NEXT: usize = 1;

fn dynamics_row(ds_i: E) -> (E, E) {
    (2.0 * ds_i, 1.0)
}

/// Advances `x[i]` one stage forward under the extremal admissible control:
/// fixes `x[i] = x_i` and maximizes (or minimizes) `x[i+1]`, returning the
/// reached value and the QP's status.
pub fn one_step(
    stage: &mut StageAssembly,
    i: usize,
    ds_i: E,
    x_i: E,
    maximize: bool,
    nwsr: usize,
) -> Result<(E, Status), crate::qp::QpError> {
    stage.reset_operational_rows();
    stage.set_operational_row(ROW_X, 0.0, 1.0, x_i, x_i);

    let (a_next, _) = dynamics_row(ds_i);
    let sign = if maximize { -1.0 } else { 1.0 };
    let mut g = vec![0.0; stage.layout().nz];
    g[Layout::U] = sign * a_next;

    let qp = stage.build(i, g, 0.0)?;
    let (sol, _) = qp.init(nwsr)?;
    let u = sol.primal[Layout::U];
    Ok((x_i + a_next * u, sol.status))
}

/// Forward reachable interval at stage `i+1` given `x[i] in [x_lo, x_hi]`.
pub fn reach(
    stage: &mut StageAssembly,
    i: usize,
    ds_i: E,
    x_lo: E,
    x_hi: E,
    nwsr: usize,
) -> Result<(E, E, Status), crate::qp::QpError> {
    stage.reset_operational_rows();
    stage.set_operational_row(ROW_X, 0.0, 1.0, x_lo, x_hi);
    let (a_next, _) = dynamics_row(ds_i);

    let mut g_hi = vec![0.0; stage.layout().nz];
    g_hi[Layout::U] = -a_next;
    g_hi[Layout::X] = -1.0;
    let qp_hi = stage.build(i, g_hi, 0.0)?;
    let (sol_hi, _) = qp_hi.init(nwsr)?;
    let hi = sol_hi.primal[Layout::X] + a_next * sol_hi.primal[Layout::U];

    let mut g_lo = vec![0.0; stage.layout().nz];
    g_lo[Layout::U] = a_next;
    g_lo[Layout::X] = 1.0;
    let qp_lo = stage.build(i, g_lo, 0.0)?;
    let (sol_lo, _) = qp_lo.init(nwsr)?;
    let lo = sol_lo.primal[Layout::X] + a_next * sol_lo.primal[Layout::U];

    let status = if sol_hi.status == Status::Optimal && sol_lo.status == Status::Optimal {
        Status::Optimal
    } else {
        Status::Infeasible
    };
    Ok((lo, hi, status))
}

/// Intersects `[x_lo, x_hi]` with the set of `x[i]` admissible at stage `i`
/// alone (i.e. for which some `u[i]` satisfies the instantaneous constraints).
pub fn proj_x_admissible(
    stage: &mut StageAssembly,
    i: usize,
    x_lo: E,
    x_hi: E,
    nwsr: usize,
) -> Result<(E, E, Status), crate::qp::QpError> {
    stage.reset_operational_rows();
    stage.set_operational_row(ROW_X, 0.0, 1.0, x_lo, x_hi);

    let mut g_hi = vec![0.0; stage.layout().nz];
    g_hi[Layout::X] = -1.0;
    let qp_hi = stage.build(i, g_hi, 0.0)?;
    let (sol_hi, _) = qp_hi.init(nwsr)?;

    let mut g_lo = vec![0.0; stage.layout().nz];
    g_lo[Layout::X] = 1.0;
    let qp_lo = stage.build(i, g_lo, 0.0)?;
    let (sol_lo, _) = qp_lo.init(nwsr)?;

    let status = if sol_hi.status == Status::Optimal && sol_lo.status == Status::Optimal {
        Status::Optimal
    } else {
        Status::Infeasible
    };
    Ok((sol_lo.primal[Layout::X], sol_hi.primal[Layout::X], status))
}

/// Forward greedy step: from `x[i] = x_i`, picks the most aggressive `u[i]`
/// (maximal `x[i+1]`) that keeps `x[i+1]` inside the controllable interval
/// `[k_lo, k_hi]`, regularizing slack variables by `reg`.
pub fn greedy_step(
    stage: &mut StageAssembly,
    i: usize,
    ds_i: E,
    x_i: E,
    k_lo: E,
    k_hi: E,
    reg: E,
    nwsr: usize,
    diagnostics: &Diagnostics,
) -> Result<(E, Status), crate::qp::QpError> {
    stage.reset_operational_rows();
    stage.set_operational_row(ROW_X, 0.0, 1.0, x_i, x_i);
    let (a_next, _) = dynamics_row(ds_i);
    stage.set_operational_row(ROW_X_NEXT, a_next, 1.0, k_lo, k_hi);

    let mut g = vec![0.0; stage.layout().nz];
    g[Layout::U] = -a_next;

    let qp = stage.build(i, g, reg)?;
    let (sol, _) = qp.init(nwsr)?;
    if sol.status != Status::Optimal {
        diagnostics.primitive_failure(i, x_i, x_i, true, sol.status, sol.status);
    }
    let u = sol.primal[Layout::U];
    Ok((x_i + a_next * u, sol.status))
}

/// Forward least-greedy step: the mirror of [`greedy_step`] that picks the
/// most conservative `u[i]` (minimal `x[i+1]`) still inside `[k_lo, k_hi]`.
/// Used when the greedy choice is infeasible and a slower fallback is tried.
pub fn least_greedy_step(
    stage: &mut StageAssembly,
    i: usize,
    ds_i: E,
    x_i: E,
    k_lo: E,
    k_hi: E,
    reg: E,
    nwsr: usize,
) -> Result<(E, Status), crate::qp::QpError> {
    stage.reset_operational_rows();
    stage.set_operational_row(ROW_X, 0.0, 1.0, x_i, x_i);
    let (a_next, _) = dynamics_row(ds_i);
    stage.set_operational_row(ROW_X_NEXT, a_next, 1.0, k_lo, k_hi);

    let mut g = vec![0.0; stage.layout().nz];
    g[Layout::U] = a_next;

    let qp = stage.build(i, g, reg)?;
    let (sol, _) = qp.init(nwsr)?;
    let u = sol.primal[Layout::U];
    Ok((x_i + a_next * u, sol.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrajectoryOptions;
    use crate::constraint::ConstraintSet;
    use crate::grid::Grid;

    #[test]
    fn one_step_respects_velocity_cap() {
        let grid = Grid::uniform(4, 1.0).unwrap();
        let set = ConstraintSet::new();
        let mut stage = StageAssembly::new(&grid, &set, crate::NOP);
        let (x_next, status) = one_step(&mut stage, 0, grid.ds_at(0), 1.0, true, 200).unwrap();
        assert_eq!(status, Status::Optimal);
        assert!(x_next >= 1.0);
        assert!(x_next <= crate::MAXX);
    }

    #[test]
    fn reach_interval_is_ordered() {
        let grid = Grid::uniform(4, 1.0).unwrap();
        let set = ConstraintSet::new();
        let mut stage = StageAssembly::new(&grid, &set, crate::NOP);
        let (lo, hi, status) = reach(&mut stage, 0, grid.ds_at(0), 0.0, 4.0, 200).unwrap();
        assert_eq!(status, Status::Optimal);
        assert!(lo <= hi);
    }

    #[test]
    fn greedy_step_stays_within_controllable_interval() {
        let grid = Grid::uniform(4, 1.0).unwrap();
        let set = ConstraintSet::new();
        let mut stage = StageAssembly::new(&grid, &set, crate::NOP);
        let opts = TrajectoryOptions::default();
        let diagnostics = Diagnostics::new(opts.verbose);
        let (x_next, status) =
            greedy_step(&mut stage, 0, grid.ds_at(0), 1.0, 0.0, 2.0, 0.0, 200, &diagnostics).unwrap();
        assert_eq!(status, Status::Optimal);
        assert!(x_next <= 2.0 + 1e-6);
        assert!(x_next >= 0.0 - 1e-6);
    }
}
