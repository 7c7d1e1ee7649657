//! Dense linear-system solves for the interior-point KKT step.
//!
//! A `Solver` trait abstracting over sparse LU/LDL backends selected by
//! problem structure is overkill here: this crate has exactly one shape of
//! system to solve (a small dense symmetric KKT system per IPM iteration),
//! so the abstraction collapses to a single function backed by `faer`'s
//! dense partial-pivot LU.

use derive_more::{Display, Error};
use faer::Mat;
use faer::linalg::solvers::{PartialPivLu, Solve};

/// Errors from the dense KKT solve.
#[derive(Debug, Display, Error)]
pub enum LinearSolverError {
    #[display("KKT matrix is singular to working precision")]
    Singular,
    #[display("KKT matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

/// Solves `a * x = b` for a square dense matrix `a`, returning the solution
/// column. Used once per affine/corrector step of the Mehrotra iteration in
/// [`crate::qp`].
pub fn solve(a: &Mat<f64>, b: &Mat<f64>) -> Result<Mat<f64>, LinearSolverError> {
    if a.nrows() != a.ncols() {
        return Err(LinearSolverError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    let lu = PartialPivLu::new(a.as_ref());
    let mut x = b.to_owned();
    lu.solve_in_place(x.as_mut());
    for i in 0..x.nrows() {
        for j in 0..x.ncols() {
            if !x[(i, j)].is_finite() {
                return Err(LinearSolverError::Singular);
            }
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn solves_identity_system() {
        let a = mat![[1.0, 0.0], [0.0, 1.0]];
        let b = mat![[3.0], [4.0]];
        let x = solve(&a, &b).unwrap();
        assert!((x[(0, 0)] - 3.0).abs() < 1e-10);
        assert!((x[(1, 0)] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn solves_small_dense_system() {
        let a = mat![[2.0, 1.0], [1.0, 3.0]];
        let b = mat![[3.0], [5.0]];
        let x = solve(&a, &b).unwrap();
        assert!((x[(0, 0)] - 0.8).abs() < 1e-9);
        assert!((x[(1, 0)] - 1.4).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_square() {
        let a = mat![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let b = mat![[1.0], [1.0]];
        assert!(matches!(
            solve(&a, &b),
            Err(LinearSolverError::NotSquare { .. })
        ));
    }
}
