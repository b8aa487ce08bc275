//! Parameter covariance from a least-squares Jacobian.
//!
//! At the optimum of `minimize Σ r_i(θ)^2` the usual estimate is:
//!
//! ```text
//! cov(θ) = σ² (JᵀJ)⁻¹,   σ² = SSE / (n - p)
//! ```
//!
//! We never form `JᵀJ` explicitly. With the SVD `J = U Σ Vᵀ`,
//! `(JᵀJ)⁻¹ = V Σ⁻² Vᵀ`, which lets us see rank deficiency directly:
//! singular values below `rcond * σ_max` span directions the data cannot
//! resolve. Parameters loading on such a direction get an infinite standard
//! error; the rest use the pseudo-inverse restricted to resolved directions.

use nalgebra::DMatrix;

/// Relative singular-value cutoff below which a direction counts as unresolved.
pub const DEFAULT_RCOND: f64 = 1e-10;

/// Loading on an unresolved direction above which a parameter is undefined.
const NULL_LOADING_TOL: f64 = 1e-6;

/// Covariance estimate at a fitted point.
#[derive(Debug, Clone)]
pub struct CovarianceEstimate {
    /// `p x p`; rows/columns of undefined parameters are `+inf`.
    pub covariance: DMatrix<f64>,
    /// Square roots of the diagonal (`+inf` where undefined).
    pub std_errors: Vec<f64>,
    /// Number of resolved directions.
    pub rank: usize,
    /// Residual variance `SSE / dof` (`+inf` when `dof = 0`).
    pub sigma2: f64,
}

impl CovarianceEstimate {
    fn undefined(p: usize, rank: usize) -> Self {
        Self {
            covariance: DMatrix::from_element(p, p, f64::INFINITY),
            std_errors: vec![f64::INFINITY; p],
            rank,
            sigma2: f64::INFINITY,
        }
    }
}

/// Estimate the parameter covariance from the residual Jacobian (`n x p`) and SSE.
pub fn estimate_covariance(jacobian: &DMatrix<f64>, sse: f64, rcond: f64) -> CovarianceEstimate {
    let n = jacobian.nrows();
    let p = jacobian.ncols();

    // A non-finite Jacobian would stall the SVD iteration; there is nothing to
    // salvage from it anyway.
    if p == 0 || !sse.is_finite() || jacobian.iter().any(|v| !v.is_finite()) {
        return CovarianceEstimate::undefined(p, 0);
    }

    let svd = jacobian.clone().svd(false, true);
    let Some(v_t) = svd.v_t.as_ref() else {
        return CovarianceEstimate::undefined(p, 0);
    };
    let singular = &svd.singular_values;

    let s_max = singular.iter().copied().fold(0.0_f64, f64::max);
    if s_max <= 0.0 {
        return CovarianceEstimate::undefined(p, 0);
    }
    let cutoff = rcond.max(0.0) * s_max;

    let mut pinv = DMatrix::<f64>::zeros(p, p);
    let mut undefined = vec![false; p];
    let mut rank = 0usize;

    for (i, &s) in singular.iter().enumerate() {
        if s > cutoff {
            rank += 1;
            let inv_s2 = 1.0 / (s * s);
            for a in 0..p {
                for b in 0..p {
                    pinv[(a, b)] += v_t[(i, a)] * v_t[(i, b)] * inv_s2;
                }
            }
        } else {
            for (j, flag) in undefined.iter_mut().enumerate() {
                if v_t[(i, j)].abs() > NULL_LOADING_TOL {
                    *flag = true;
                }
            }
        }
    }

    // Fewer rows than columns: the missing directions are unresolved too.
    if singular.len() < p {
        undefined.iter_mut().for_each(|f| *f = true);
    }

    if n <= p {
        return CovarianceEstimate::undefined(p, rank);
    }
    let sigma2 = sse / (n - p) as f64;

    let mut covariance = pinv * sigma2;
    for j in 0..p {
        if undefined[j] {
            for k in 0..p {
                covariance[(j, k)] = f64::INFINITY;
                covariance[(k, j)] = f64::INFINITY;
            }
        }
    }

    let std_errors = (0..p)
        .map(|j| {
            if undefined[j] {
                f64::INFINITY
            } else {
                covariance[(j, j)].max(0.0).sqrt()
            }
        })
        .collect();

    CovarianceEstimate {
        covariance,
        std_errors,
        rank,
        sigma2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_regression_standard_errors() {
        // y = a + b x on x = [0, 1, 2, 3]; residual variance chosen so σ² = 1.
        let j = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let est = estimate_covariance(&j, 2.0, DEFAULT_RCOND);
        assert_eq!(est.rank, 2);
        assert!((est.sigma2 - 1.0).abs() < 1e-12);

        // (XᵀX)⁻¹ = [[0.7, -0.3], [-0.3, 0.2]]
        assert!((est.covariance[(0, 0)] - 0.7).abs() < 1e-12);
        assert!((est.covariance[(0, 1)] + 0.3).abs() < 1e-12);
        assert!((est.covariance[(1, 1)] - 0.2).abs() < 1e-12);
        assert!((est.std_errors[1] - 0.2_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn singular_jacobian_marks_only_affected_parameters() {
        // Columns 1 and 2 are identical; column 0 is orthogonal to both.
        let j = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 1.0, 1.0, -1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0, -1.0],
        );
        let est = estimate_covariance(&j, 1.0, DEFAULT_RCOND);
        assert_eq!(est.rank, 2);
        assert!(est.std_errors[0].is_finite());
        assert!(est.std_errors[1].is_infinite());
        assert!(est.std_errors[2].is_infinite());
    }

    #[test]
    fn zero_degrees_of_freedom_is_undefined() {
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let est = estimate_covariance(&j, 0.0, DEFAULT_RCOND);
        assert_eq!(est.rank, 2);
        assert!(est.std_errors.iter().all(|s| s.is_infinite()));
    }

    #[test]
    fn non_finite_jacobian_is_undefined_not_a_panic() {
        let j = DMatrix::from_row_slice(3, 1, &[1.0, f64::NAN, 2.0]);
        let est = estimate_covariance(&j, 1.0, DEFAULT_RCOND);
        assert_eq!(est.rank, 0);
        assert!(est.std_errors[0].is_infinite());
    }
}
