//! The three sweep algorithms and the [`TrajectorySolver`] façade that
//! composes them: a backward controllable-set sweep, a forward
//! reachable-set sweep, and the forward greedy pass that turns a
//! controllable-set sequence into an actual velocity profile.

use crate::E;
use crate::Status;
use crate::assembly::{Layout, StageAssembly};
use crate::config::{Interval, TrajectoryOptions};
use crate::constraint::ConstraintSet;
use crate::diagnostics::Diagnostics;
use crate::grid::Grid;
use crate::primitives::{greedy_step, least_greedy_step, proj_x_admissible};
use crate::qp::QpError;

/// Closed interval `[lo, hi]` attached to one grid point, as produced by the
/// controllable-set and reachable-set sweeps.
#[derive(Debug, Clone, Copy)]
pub struct Bound {
    pub lo: E,
    pub hi: E,
}

impl Bound {
    fn intersect(self, other: Bound) -> Option<Bound> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo <= hi).then_some(Bound { lo, hi })
    }
}

/// Backward sweep: for each stage `i`, the interval of `x[i] = sdot(s_i)^2`
/// from which the goal interval is reachable while respecting every
/// constraint at every later stage.
pub fn solve_controllable_sets(
    grid: &Grid,
    constraints: &ConstraintSet,
    goal: Interval,
    opts: &TrajectoryOptions,
) -> Result<(Vec<Bound>, Status), QpError> {
    let n = grid.n();
    let mut stage = StageAssembly::new(grid, constraints, crate::NOP);
    let mut k = vec![Bound { lo: 0.0, hi: 0.0 }; n + 1];

    let (lo_n, hi_n, status_n) =
        proj_x_admissible(&mut stage, n, goal.lo, goal.hi, opts.nwsr)?;
    if status_n != Status::Optimal || lo_n > hi_n {
        return Ok((k, Status::Infeasible));
    }
    k[n] = Bound { lo: lo_n, hi: hi_n };

    for i in (0..n).rev() {
        let next = k[i + 1];
        let (lo, hi, status) =
            backward_bound(&mut stage, i, grid.ds_at(i), next, opts.nwsr)?;
        if status != Status::Optimal || lo > hi {
            return Ok((k, Status::Infeasible));
        }
        // Contract by `eps` to keep the forward greedy pass strictly inside
        // the controllable set, so a stage solved at floating-point-exact
        // boundary doesn't get rejected as infeasible one stage later.
        let shrink = opts.eps.max(0.0).min((hi - lo) / 2.0);
        k[i] = Bound {
            lo: lo + shrink,
            hi: hi - shrink,
        };
    }
    Ok((k, Status::Optimal))
}

/// One stage of the backward sweep: the interval of `x[i]` for which some
/// `u[i]` keeps `x[i] + 2*Ds[i]*u[i]` inside `next`.
fn backward_bound(
    stage: &mut StageAssembly,
    i: usize,
    ds_i: E,
    next: Bound,
    nwsr: usize,
) -> Result<(E, E, Status), QpError> {
    stage.reset_operational_rows();
    stage.set_operational_row(1, 2.0 * ds_i, 1.0, next.lo, next.hi);

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

/// Forward sweep: for each stage `i`, the interval of `x[i]` reachable from
/// the start interval while respecting every constraint at every earlier stage.
pub fn solve_reachable_sets(
    grid: &Grid,
    constraints: &ConstraintSet,
    start: Interval,
    opts: &TrajectoryOptions,
) -> Result<(Vec<Bound>, Status), QpError> {
    let n = grid.n();
    let mut stage = StageAssembly::new(grid, constraints, crate::NOP);
    let mut r = vec![Bound { lo: 0.0, hi: 0.0 }; n + 1];

    let (lo0, hi0, status0) = proj_x_admissible(&mut stage, 0, start.lo, start.hi, opts.nwsr)?;
    if status0 != Status::Optimal || lo0 > hi0 {
        return Ok((r, Status::Infeasible));
    }
    r[0] = Bound { lo: lo0, hi: hi0 };

    for i in 0..n {
        let cur = r[i];
        let (lo, hi, status) =
            crate::primitives::reach(&mut stage, i, grid.ds_at(i), cur.lo, cur.hi, opts.nwsr)?;
        let (lo_adm, hi_adm, status_adm) =
            proj_x_admissible(&mut stage, i + 1, lo, hi, opts.nwsr)?;
        if status != Status::Optimal || status_adm != Status::Optimal || lo_adm > hi_adm {
            return Ok((r, Status::Infeasible));
        }
        r[i + 1] = Bound {
            lo: lo_adm,
            hi: hi_adm,
        };
    }
    Ok((r, Status::Optimal))
}

/// A complete minimum-time velocity profile and the per-stage controls that
/// produce it.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub x: Vec<E>,
    pub u: Vec<E>,
    pub status: Status,
}

impl Trajectory {
    /// The scalar path velocity `sdot(s_i) = sqrt(x[i])`.
    pub fn sdot(&self) -> Vec<E> {
        self.x.iter().map(|&x| x.max(0.0).sqrt()).collect()
    }
}

/// Combines the backward controllable-set sweep with a forward greedy pass
/// to produce the minimum-time velocity profile.
pub fn solve_topp(
    grid: &Grid,
    constraints: &ConstraintSet,
    opts: &TrajectoryOptions,
) -> Result<Trajectory, QpError> {
    let diagnostics = Diagnostics::new(opts.verbose);
    let n = grid.n();
    let (k, status) = solve_controllable_sets(grid, constraints, opts.goal_interval(), opts)?;
    if status != Status::Optimal {
        return Ok(Trajectory {
            x: vec![],
            u: vec![],
            status: Status::Infeasible,
        });
    }

    let mut stage = StageAssembly::new(grid, constraints, crate::NOP);
    let mut x = vec![0.0; n + 1];
    let mut u = vec![0.0; n];

    let i0 = opts.start_interval();
    // Seed the forward pass at the tighter of the declared start interval and
    // the controllable set at stage 0, since a start interval wider than what
    // is actually controllable would otherwise commit to an infeasible x[0].
    x[0] = i0.hi.min(k[0].hi).max(k[0].lo);
    diagnostics.stage_interval("K", 0, k[0].lo, k[0].hi);

    for i in 0..n {
        diagnostics.stage_interval("K", i + 1, k[i + 1].lo, k[i + 1].hi);
        let init = i <= 1;
        let nwsr = if init { opts.nwsr } else { opts.nwsr / 4 + 1 };

        let (x_next, step_status) = greedy_step(
            &mut stage,
            i,
            grid.ds_at(i),
            x[i],
            k[i + 1].lo,
            k[i + 1].hi,
            opts.reg,
            nwsr,
            &diagnostics,
        )?;

        let (x_next, final_status) = if step_status == Status::Optimal {
            (x_next, step_status)
        } else {
            let (x_fallback, fallback_status) = least_greedy_step(
                &mut stage,
                i,
                grid.ds_at(i),
                x[i],
                k[i + 1].lo,
                k[i + 1].hi,
                opts.reg,
                nwsr,
            )?;
            diagnostics.primitive_failure(i, k[i + 1].lo, k[i + 1].hi, init, step_status, fallback_status);
            (x_fallback, fallback_status)
        };

        if final_status != Status::Optimal {
            return Ok(Trajectory {
                x: x[..=i].to_vec(),
                u: u[..i].to_vec(),
                status: Status::Infeasible,
            });
        }

        u[i] = (x_next - x[i]) / (2.0 * grid.ds_at(i));
        x[i + 1] = x_next;
    }

    Ok(Trajectory {
        x,
        u,
        status: Status::Optimal,
    })
}

/// Owns a grid, a constraint set, and solver options, and exposes the sweep
/// algorithms as a single entry point.
pub struct TrajectorySolver {
    grid: Grid,
    constraints: ConstraintSet,
    options: TrajectoryOptions,
}

impl TrajectorySolver {
    pub fn new(grid: Grid, constraints: ConstraintSet, options: TrajectoryOptions) -> Self {
        Self {
            grid,
            constraints,
            options,
        }
    }

    pub fn options_mut(&mut self) -> &mut TrajectoryOptions {
        &mut self.options
    }

    pub fn controllable_sets(&self) -> Result<(Vec<Bound>, Status), QpError> {
        solve_controllable_sets(&self.grid, &self.constraints, self.options.goal_interval(), &self.options)
    }

    pub fn reachable_sets(&self) -> Result<(Vec<Bound>, Status), QpError> {
        solve_reachable_sets(&self.grid, &self.constraints, self.options.start_interval(), &self.options)
    }

    pub fn solve(&self) -> Result<Trajectory, QpError> {
        solve_topp(&self.grid, &self.constraints, &self.options)
    }
}
