//! Per-stage QP assembly: turns a [`Grid`] point and a [`ConstraintSet`] into
//! the dense `(H, g, A, lA, hA, l, h)` blocks consumed by [`crate::qp::DenseQp`].
//!
//! Buffers are flat, row-major `Vec<f64>` with precomputed strides rather than
//! `faer` matrices: row filling is scalar, index-heavy bookkeeping (each
//! constraint writes a handful of cells per call), and only the final,
//! fully-assembled block needs `faer`'s dense algebra, so the conversion
//! happens once at the [`DenseQp`] boundary in [`StageAssembly::build`].

use faer::Mat;

use crate::E;
use crate::constraint::ConstraintSet;
use crate::grid::Grid;
use crate::qp::{DenseQp, QpError};

/// Column layout of the per-stage decision vector `z = (u, x, v_1, v_2, ...)`.
pub struct Layout {
    pub nv: usize,
    pub nz: usize,
}

impl Layout {
    pub fn new(nv: usize) -> Self {
        Self { nv, nz: 2 + nv }
    }

    pub const U: usize = 0;
    pub const X: usize = 1;
    pub const V0: usize = 2;
}

/// Precomputed row layout: `nop` reserved operational rows, then the
/// constraint set's canonical, equality, and inequality rows in that order.
pub struct StageAssembly<'a> {
    grid: &'a Grid,
    constraints: &'a ConstraintSet,
    layout: Layout,
    nop: usize,
    nm: usize,
    neq: usize,
    niq: usize,
    /// Operational rows, each `(a, b, lo, hi)` for `lo <= a*u + b*x <= hi`.
    /// Mutated by the set-projection primitives between solves and reset
    /// between calls with [`StageAssembly::reset_operational_rows`].
    op_rows: Vec<(E, E, E, E)>,
}

impl<'a> StageAssembly<'a> {
    pub fn new(grid: &'a Grid, constraints: &'a ConstraintSet, nop: usize) -> Self {
        Self {
            grid,
            constraints,
            layout: Layout::new(constraints.nv()),
            nop,
            nm: constraints.nm(),
            neq: constraints.neq(),
            niq: constraints.niq(),
            op_rows: vec![(0.0, 0.0, -crate::INFTY, crate::INFTY); nop],
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn nc(&self) -> usize {
        self.nop + self.nm + self.neq + self.niq
    }

    /// Clears every operational row back to the always-satisfied `-INFTY<=0<=INFTY` row.
    pub fn reset_operational_rows(&mut self) {
        for row in &mut self.op_rows {
            *row = (0.0, 0.0, -crate::INFTY, crate::INFTY);
        }
    }

    /// Overwrites operational row `k` with `lo <= a*u + b*x <= hi`.
    pub fn set_operational_row(&mut self, k: usize, a: E, b: E, lo: E, hi: E) {
        self.op_rows[k] = (a, b, lo, hi);
    }

    /// Assembles the dense two-sided QP for stage `i` with linear cost `g` and
    /// an optional quadratic slack regularizer `reg` (used by `greedy_step`).
    pub fn build(&self, i: usize, g: Vec<E>, reg: E) -> Result<DenseQp, QpError> {
        let nz = self.layout.nz;
        let nv = self.layout.nv;
        let nc = self.nc();

        let mut h = Mat::zeros(nz, nz);
        if reg != 0.0 {
            for k in 0..nv {
                h[(Layout::V0 + k, Layout::V0 + k)] = reg;
            }
        }

        let mut a = Mat::zeros(nc, nz);
        let mut l_a = vec![0.0; nc];
        let mut h_a = vec![0.0; nc];

        let mut row = 0;
        for &(ca, cb, lo, hi) in &self.op_rows {
            a[(row, Layout::U)] = ca;
            a[(row, Layout::X)] = cb;
            l_a[row] = lo;
            h_a[row] = hi;
            row += 1;
        }

        let mut ca = vec![0.0; self.nm];
        let mut cb = vec![0.0; self.nm];
        let mut cc = vec![0.0; self.nm];
        let mut off = 0;
        for c in self.constraints.iter() {
            let n = c.nm();
            if n > 0 {
                c.fill_canonical(i, &mut ca[off..off + n], &mut cb[off..off + n], &mut cc[off..off + n]);
            }
            off += n;
        }
        for k in 0..self.nm {
            a[(row, Layout::U)] = ca[k];
            a[(row, Layout::X)] = cb[k];
            l_a[row] = -crate::INFTY;
            h_a[row] = -cc[k];
            row += 1;
        }

        let mut v_off = 0;
        for c in self.constraints.iter() {
            let neq = c.neq();
            if neq > 0 {
                let mut abar = vec![0.0; neq];
                let mut bbar = vec![0.0; neq];
                let mut cbar = vec![0.0; neq];
                let mut d = vec![0.0; neq * c.nv()];
                c.fill_equality(i, &mut abar, &mut bbar, &mut cbar, &mut d);
                for k in 0..neq {
                    a[(row, Layout::U)] = abar[k];
                    a[(row, Layout::X)] = bbar[k];
                    for j in 0..c.nv() {
                        a[(row, Layout::V0 + v_off + j)] = d[k * c.nv() + j];
                    }
                    l_a[row] = -cbar[k];
                    h_a[row] = -cbar[k];
                    row += 1;
                }
            }
            let niq = c.niq();
            if niq > 0 {
                let mut gmat = vec![0.0; niq * c.nv()];
                let mut lg = vec![0.0; niq];
                let mut hg = vec![0.0; niq];
                c.fill_inequality(i, &mut gmat, &mut lg, &mut hg);
                for k in 0..niq {
                    for j in 0..c.nv() {
                        a[(row, Layout::V0 + v_off + j)] = gmat[k * c.nv() + j];
                    }
                    l_a[row] = lg[k];
                    h_a[row] = hg[k];
                    row += 1;
                }
            }
            v_off += c.nv();
        }
        debug_assert_eq!(row, nc);

        let mut l = vec![-crate::MAXU, 0.0];
        let mut h_bound = vec![crate::MAXU, crate::MAXX];
        l.resize(nz, -crate::INFTY);
        h_bound.resize(nz, crate::INFTY);
        let mut v_off = 0;
        for c in self.constraints.iter() {
            let nv = c.nv();
            if nv > 0 {
                let mut lv = vec![-crate::INFTY; nv];
                let mut hv = vec![crate::INFTY; nv];
                c.fill_slack_bounds(i, &mut lv, &mut hv);
                l[Layout::V0 + v_off..Layout::V0 + v_off + nv].copy_from_slice(&lv);
                h_bound[Layout::V0 + v_off..Layout::V0 + v_off + nv].copy_from_slice(&hv);
            }
            v_off += nv;
        }

        let _ = self.grid;
        DenseQp::new(h, g, a, l_a, h_a, l, h_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::VelocityConstraint;

    #[test]
    fn row_count_matches_nop_plus_constraint_rows() {
        let grid = Grid::uniform(4, 1.0).unwrap();
        let set = ConstraintSet::new().with(Box::new(VelocityConstraint::uniform(5, 1.0)));
        let assembly = StageAssembly::new(&grid, &set, 3);
        assert_eq!(assembly.nc(), 3 + 1);
    }

    #[test]
    fn operational_rows_reset_to_no_op() {
        let grid = Grid::uniform(4, 1.0).unwrap();
        let set = ConstraintSet::new();
        let mut assembly = StageAssembly::new(&grid, &set, 2);
        assembly.set_operational_row(0, 1.0, 0.0, -crate::INFTY, 5.0);
        assembly.reset_operational_rows();
        let qp = assembly.build(0, vec![0.0, 0.0], 0.0).unwrap();
        let (sol, _) = qp.init(50).unwrap();
        assert_eq!(sol.primal.len(), 2);
    }
}
