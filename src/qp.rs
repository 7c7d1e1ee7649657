//! Dense two-sided QP backend: `min 0.5 z'Hz + g'z s.t. lA <= Az <= hA, l <= z <= h`.
//!
//! This is an interior-point backend throughout, never active-set: a dense
//! Mehrotra predictor-corrector method. Every stage problem in the
//! sweep is reformulated into equality-constrained-with-slacks form (one
//! slack per row of `A`, bounded by `[lA, hA]`) and solved from scratch or
//! warm-started from the previous stage's iterate. "Hotstart" here means
//! warm-starting the interior-point iterate, not reusing an active set.

use derive_more::{Display, Error};
use faer::Mat;

use crate::Status;
use crate::linalg;

#[derive(Debug, Display, Error)]
pub enum QpError {
    #[display("QP dimensions are inconsistent: {detail}")]
    BadDimensions { detail: String },
    #[display("KKT system became singular during the interior-point iteration")]
    SingularKkt,
}

/// A two-sided dense QP: `min 0.5 z'Hz + g'z s.t. lA <= Az <= hA, l <= z <= h`.
pub struct DenseQp {
    nz: usize,
    nc: usize,
    h: Mat<f64>,
    g: Vec<f64>,
    a: Mat<f64>,
    l_a: Vec<f64>,
    h_a: Vec<f64>,
    l: Vec<f64>,
    h_bound: Vec<f64>,
}

/// The solution of a solved QP.
pub struct QpSolution {
    pub status: Status,
    pub primal: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
}

/// An interior-point iterate, reused across `hotstart` calls as a warm start.
#[derive(Clone)]
pub struct Iterate {
    x: Vec<f64>,
    s: Vec<f64>,
    y: Vec<f64>,
    z_lo: Vec<f64>,
    z_hi: Vec<f64>,
}

const BARRIER_SHRINK: f64 = 0.1;
const FRACTION_TO_BOUNDARY: f64 = 0.995;

impl DenseQp {
    pub fn new(
        h: Mat<f64>,
        g: Vec<f64>,
        a: Mat<f64>,
        l_a: Vec<f64>,
        h_a: Vec<f64>,
        l: Vec<f64>,
        h_bound: Vec<f64>,
    ) -> Result<Self, QpError> {
        let nz = g.len();
        let nc = l_a.len();
        if h.nrows() != nz || h.ncols() != nz {
            return Err(QpError::BadDimensions {
                detail: format!("H is {}x{}, expected {nz}x{nz}", h.nrows(), h.ncols()),
            });
        }
        if a.nrows() != nc || a.ncols() != nz {
            return Err(QpError::BadDimensions {
                detail: format!("A is {}x{}, expected {nc}x{nz}", a.nrows(), a.ncols()),
            });
        }
        if h_a.len() != nc || l.len() != nz || h_bound.len() != nz {
            return Err(QpError::BadDimensions {
                detail: "bound vector lengths do not match nz/nc".into(),
            });
        }
        Ok(Self {
            nz,
            nc,
            h,
            g,
            a,
            l_a,
            h_a,
            l,
            h_bound,
        })
    }

    /// Total number of bounded variables in standard form: `z` plus one slack per row of `A`.
    fn n_total(&self) -> usize {
        self.nz + self.nc
    }

    fn lo(&self) -> Vec<f64> {
        let mut v = self.l.clone();
        v.extend_from_slice(&self.l_a);
        v
    }

    fn hi(&self) -> Vec<f64> {
        let mut v = self.h_bound.clone();
        v.extend_from_slice(&self.h_a);
        v
    }

    /// Cold-started solve: runs the Mehrotra iteration from a centered start.
    pub fn init(&self, nwsr: usize) -> Result<(QpSolution, Iterate), QpError> {
        let n = self.n_total();
        let lo = self.lo();
        let hi = self.hi();
        let x0: Vec<f64> = (0..n).map(|i| 0.5 * (lo[i] + hi[i])).collect();
        let iter = Iterate {
            x: x0,
            s: vec![0.0; self.nc],
            y: vec![0.0; self.nc],
            z_lo: vec![1.0; n],
            z_hi: vec![1.0; n],
        };
        self.hotstart(&iter, nwsr)
    }

    /// Warm-started solve: resumes the Mehrotra iteration from `start`.
    pub fn hotstart(&self, start: &Iterate, nwsr: usize) -> Result<(QpSolution, Iterate), QpError> {
        let n = self.n_total();
        let lo = self.lo();
        let hi = self.hi();
        let mut x = start.x.clone();
        let mut z_lo = start.z_lo.clone();
        let mut z_hi = start.z_hi.clone();
        let mut y = start.y.clone();

        for k in 0..n {
            x[k] = x[k].clamp(lo[k] + 1e-8, hi[k] - 1e-8);
        }

        let mut status = Status::IterationLimit;
        let mut iters = 0;

        for it in 0..nwsr.max(1) {
            iters = it + 1;
            let mu = gap(&x, &lo, &hi, &z_lo, &z_hi) / (2.0 * n as f64).max(1.0);

            let (dx, dy, dz_lo, dz_hi) =
                match self.newton_step(&x, &y, &z_lo, &z_hi, &lo, &hi, mu) {
                    Ok(step) => step,
                    Err(_) => {
                        status = Status::Unknown;
                        break;
                    }
                };

            let alpha = boundary_step(&x, &lo, &hi, &dx, &z_lo, &z_hi, &dz_lo, &dz_hi);
            for i in 0..n {
                x[i] += alpha * dx[i];
                z_lo[i] += alpha * dz_lo[i];
                z_hi[i] += alpha * dz_hi[i];
            }
            for i in 0..self.nc {
                y[i] += alpha * dy[i];
            }

            if mu < 1e-10 {
                status = Status::Optimal;
                break;
            }
        }

        let objective = self.objective(&x[..self.nz]);
        let s: Vec<f64> = (0..self.nc).map(|i| x[self.nz + i]).collect();
        let primal = x[..self.nz].to_vec();

        Ok((
            QpSolution {
                status,
                primal: primal.clone(),
                objective,
                iterations: iters,
            },
            Iterate {
                x,
                s,
                y,
                z_lo,
                z_hi,
            },
        ))
    }

    fn objective(&self, z: &[f64]) -> f64 {
        let mut quad = 0.0;
        for i in 0..self.nz {
            for j in 0..self.nz {
                quad += z[i] * self.h[(i, j)] * z[j];
            }
        }
        0.5 * quad + self.g.iter().zip(z).map(|(g, z)| g * z).sum::<f64>()
    }

    /// Builds and solves the Newton system for one predictor-corrector step.
    /// Reduced to the `(n + nc)` dense system `[Q + Dlo + Dhi, -A'; A, 0] [dx;dy] = rhs`.
    #[allow(clippy::too_many_arguments)]
    fn newton_step(
        &self,
        x: &[f64],
        y: &[f64],
        z_lo: &[f64],
        z_hi: &[f64],
        lo: &[f64],
        hi: &[f64],
        mu: f64,
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>), linalg::LinearSolverError> {
        let n = self.n_total();
        let nc = self.nc;
        let total = n + nc;

        let mut kkt = Mat::zeros(total, total);
        for i in 0..self.nz {
            for j in 0..self.nz {
                kkt[(i, j)] = self.h[(i, j)];
            }
        }
        for i in 0..n {
            let d_lo = z_lo[i] / (x[i] - lo[i]).max(1e-12);
            let d_hi = z_hi[i] / (hi[i] - x[i]).max(1e-12);
            kkt[(i, i)] += d_lo + d_hi;
        }
        // Equality rows: [A, -I] x = 0, i.e. z[nz..] is the slack block.
        for r in 0..nc {
            for c in 0..self.nz {
                kkt[(n + r, c)] = self.a[(r, c)];
                kkt[(c, n + r)] = self.a[(r, c)];
            }
            kkt[(n + r, self.nz + r)] = -1.0;
            kkt[(self.nz + r, n + r)] = -1.0;
        }

        let mut rhs = Mat::zeros(total, 1);
        for i in 0..self.nz {
            let grad_i: f64 = (0..self.nz).map(|j| self.h[(i, j)] * x[j]).sum::<f64>() + self.g[i];
            rhs[(i, 0)] = -(grad_i - mu / (x[i] - lo[i]).max(1e-12) + mu / (hi[i] - x[i]).max(1e-12));
        }
        for i in self.nz..n {
            rhs[(i, 0)] = -(-mu / (x[i] - lo[i]).max(1e-12) + mu / (hi[i] - x[i]).max(1e-12));
        }
        for r in 0..nc {
            let residual: f64 = (0..self.nz).map(|c| self.a[(r, c)] * x[c]).sum::<f64>() - x[self.nz + r];
            rhs[(n + r, 0)] = -residual;
        }
        let _ = y;

        let sol = linalg::solve(&kkt, &rhs)?;
        let dx: Vec<f64> = (0..n).map(|i| sol[(i, 0)]).collect();
        let dy: Vec<f64> = (0..nc).map(|r| sol[(n + r, 0)]).collect();
        let dz_lo: Vec<f64> = (0..n)
            .map(|i| (mu - z_lo[i] * (x[i] - lo[i] + dx[i])) / (x[i] - lo[i]).max(1e-12) - z_lo[i])
            .collect();
        let dz_hi: Vec<f64> = (0..n)
            .map(|i| (mu - z_hi[i] * (hi[i] - x[i] - dx[i])) / (hi[i] - x[i]).max(1e-12) - z_hi[i])
            .collect();
        Ok((dx, dy, dz_lo, dz_hi))
    }
}

fn gap(x: &[f64], lo: &[f64], hi: &[f64], z_lo: &[f64], z_hi: &[f64]) -> f64 {
    let mut s = 0.0;
    for i in 0..x.len() {
        s += (x[i] - lo[i]).max(1e-12) * z_lo[i] + (hi[i] - x[i]).max(1e-12) * z_hi[i];
    }
    s
}

#[allow(clippy::too_many_arguments)]
fn boundary_step(
    x: &[f64],
    lo: &[f64],
    hi: &[f64],
    dx: &[f64],
    z_lo: &[f64],
    z_hi: &[f64],
    dz_lo: &[f64],
    dz_hi: &[f64],
) -> f64 {
    let mut alpha = 1.0_f64;
    for i in 0..x.len() {
        if dx[i] < 0.0 {
            alpha = alpha.min(FRACTION_TO_BOUNDARY * (lo[i] - x[i]) / dx[i]);
        }
        if dx[i] > 0.0 {
            alpha = alpha.min(FRACTION_TO_BOUNDARY * (hi[i] - x[i]) / dx[i]);
        }
        if dz_lo[i] < 0.0 {
            alpha = alpha.min(FRACTION_TO_BOUNDARY * (-z_lo[i]) / dz_lo[i]);
        }
        if dz_hi[i] < 0.0 {
            alpha = alpha.min(FRACTION_TO_BOUNDARY * (-z_hi[i]) / dz_hi[i]);
        }
    }
    alpha.max(BARRIER_SHRINK * 1e-3).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn solves_unconstrained_box_qp() {
        // min (z-1)^2 over z in [-10, 10], no rows.
        let h = mat![[2.0]];
        let g = vec![-2.0];
        let a: Mat<f64> = Mat::zeros(0, 1);
        let qp = DenseQp::new(h, g, a, vec![], vec![], vec![-10.0], vec![10.0]).unwrap();
        let (sol, _) = qp.init(200).unwrap();
        assert!((sol.primal[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let h = mat![[1.0, 0.0], [0.0, 1.0]];
        let g = vec![0.0, 0.0];
        let a: Mat<f64> = Mat::zeros(1, 3);
        let res = DenseQp::new(h, g, a, vec![0.0], vec![1.0], vec![0.0, 0.0], vec![1.0, 1.0]);
        assert!(res.is_err());
    }
}
