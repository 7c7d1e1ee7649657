//! Parametrized end-to-end scenarios over `TrajectorySolver::solve`.

use rstest::rstest;

use crate::Status;
use crate::config::TrajectoryOptions;
use crate::constraint::{
    AccelerationConstraint, ConstraintSet, GenericLinearConstraint, VelocityConstraint,
};
use crate::grid::Grid;
use crate::sweep::TrajectorySolver;

#[rstest]
#[case(1.0)]
#[case(2.5)]
#[case(10.0)]
fn velocity_only_profile_never_exceeds_cap(#[case] vmax: f64) {
    let grid = Grid::uniform(8, 2.0).unwrap();
    let set = ConstraintSet::new().with(Box::new(VelocityConstraint::uniform(9, vmax)));
    let solver = TrajectorySolver::new(grid, set, TrajectoryOptions::default());
    let traj = solver.solve().unwrap();
    assert_eq!(traj.status, Status::Optimal);
    for &v in &traj.sdot() {
        assert!(v <= vmax + 1e-3, "{v} exceeds cap {vmax}");
    }
}

#[test]
fn combined_velocity_and_acceleration_limits_produce_a_trapezoid() {
    let grid = Grid::uniform(20, 5.0).unwrap();
    let set = ConstraintSet::new()
        .with(Box::new(VelocityConstraint::uniform(21, 1.0)))
        .with(Box::new(AccelerationConstraint::uniform(21, 0.5)));
    let solver = TrajectorySolver::new(grid, set, TrajectoryOptions::default());
    let traj = solver.solve().unwrap();
    assert_eq!(traj.status, Status::Optimal);
    assert!(traj.u.iter().all(|&u| u.abs() <= 0.5 + 1e-3));
    // The profile should ramp up from and back down to the boundary intervals.
    assert!(traj.x.first().unwrap() < &0.5);
    assert!(traj.x.last().unwrap() < &0.5);
}

#[test]
fn unreachable_goal_interval_is_reported_infeasible() {
    let grid = Grid::uniform(5, 1.0).unwrap();
    let set = ConstraintSet::new().with(Box::new(GenericLinearConstraint {
        a: 0.0,
        b: 1.0,
        c: -0.01, // x <= 0.01 everywhere: far below a goal demanding x >= 4.
    }));
    let mut opts = TrajectoryOptions::default();
    opts.set_goal_interval(crate::config::Interval::new(4.0, 5.0).unwrap());
    let solver = TrajectorySolver::new(grid, set, opts);
    let traj = solver.solve().unwrap();
    assert_eq!(traj.status, Status::Infeasible);
}

#[test]
fn start_interval_wider_than_controllable_set_is_clamped_not_rejected() {
    let grid = Grid::uniform(6, 1.0).unwrap();
    let set = ConstraintSet::new().with(Box::new(VelocityConstraint::uniform(7, 0.2)));
    let mut opts = TrajectoryOptions::default();
    opts.set_start_interval(crate::config::Interval::new(0.0, 50.0).unwrap());
    let solver = TrajectorySolver::new(grid, set, opts);
    let traj = solver.solve().unwrap();
    assert_eq!(traj.status, Status::Optimal);
    assert!(traj.x[0] <= 0.2 * 0.2 + 1e-6);
}

#[test]
fn controllable_and_reachable_sets_overlap_at_every_stage() {
    let grid = Grid::uniform(6, 3.0).unwrap();
    let set = ConstraintSet::new().with(Box::new(VelocityConstraint::uniform(7, 1.5)));
    let solver = TrajectorySolver::new(grid, set, TrajectoryOptions::default());
    let (k, k_status) = solver.controllable_sets().unwrap();
    let (r, r_status) = solver.reachable_sets().unwrap();
    assert_eq!(k_status, Status::Optimal);
    assert_eq!(r_status, Status::Optimal);
    for i in 0..k.len() {
        assert!(k[i].lo <= r[i].hi && r[i].lo <= k[i].hi, "stage {i} sets disjoint");
    }
}

#[test]
fn single_stage_path_solves_trivially() {
    let grid = Grid::uniform(1, 0.5).unwrap();
    let set = ConstraintSet::new().with(Box::new(VelocityConstraint::uniform(2, 3.0)));
    let solver = TrajectorySolver::new(grid, set, TrajectoryOptions::default());
    let traj = solver.solve().unwrap();
    assert_eq!(traj.status, Status::Optimal);
    assert_eq!(traj.x.len(), 2);
    assert_eq!(traj.u.len(), 1);
}
