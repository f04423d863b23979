//! Size correction for comparing embeddings of graphs with different node
//! counts.
//!
//! Under a random dot product graph, rows of an adjacency spectral embedding
//! are approximately normal around the true latent positions with a variance
//! that shrinks with the number of nodes. When `N > M` the larger sample is
//! less spread out; adding `N(0, Σ(x)·(N−M)/(N·M))` to each of its rows
//! matches the spread of the smaller sample.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::Rng;

use crate::error::LdtError;
use crate::random::standard_normal;

/// Plug-in estimator of the asymptotic covariance of an ASE row.
#[derive(Debug, Clone)]
pub struct PlugInVariance {
    support: DMatrix<f64>,
    delta_inverse: DMatrix<f64>,
}

impl PlugInVariance {
    /// Fit `Δ = XᵀX / n` on the rows of `x`.
    pub fn fit(x: &DMatrix<f64>) -> Result<Self, LdtError> {
        let n = x.nrows();
        if n == 0 {
            return Err(LdtError::invalid_value("embedding", "has no rows"));
        }
        let delta = x.tr_mul(x) / n as f64;
        let delta_inverse = delta.try_inverse().ok_or_else(|| LdtError::Numerical {
            stage: "size correction",
            reason: "second moment matrix of the embedding is singular".to_string(),
        })?;
        Ok(Self {
            support: x.clone(),
            delta_inverse,
        })
    }

    /// `Σ(x) = Δ⁻¹ [ (1/n) Σ_j (x·X_j − (x·X_j)²) X_j X_jᵀ ] Δ⁻¹`.
    pub fn covariance(&self, point: &DVector<f64>) -> DMatrix<f64> {
        let n = self.support.nrows();
        let d = self.support.ncols();
        let mut middle = DMatrix::zeros(d, d);
        for row in self.support.row_iter() {
            let row = row.transpose();
            let p = point.dot(&row);
            middle += (&row * row.transpose()) * (p - p * p);
        }
        middle /= n as f64;
        &self.delta_inverse * middle * &self.delta_inverse
    }
}

/// Lower factor `L` with `L Lᵀ = Σ`, negative eigenvalues clamped to zero.
fn covariance_factor(sigma: &DMatrix<f64>) -> (DMatrix<f64>, bool) {
    let sym = (sigma + sigma.transpose()) * 0.5;
    let eig = SymmetricEigen::new(sym);
    let clamped = eig.eigenvalues.iter().any(|&l| l < 0.0);
    let roots = eig.eigenvalues.map(|l| l.max(0.0).sqrt());
    (eig.eigenvectors * DMatrix::from_diagonal(&roots), clamped)
}

/// Add size-correction noise to the larger of the two samples.
///
/// Samples come back in the order they were given. Equal sizes are returned
/// unchanged.
pub fn sample_modified_ase<R: Rng + ?Sized>(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    pooled: bool,
    rng: &mut R,
) -> Result<(DMatrix<f64>, DMatrix<f64>), LdtError> {
    let (n, m) = (x.nrows(), y.nrows());
    if n == m {
        return Ok((x.clone(), y.clone()));
    }
    if n < m {
        let (y_new, x_new) = sample_modified_ase(y, x, pooled, rng)?;
        return Ok((x_new, y_new));
    }

    let estimator = if pooled {
        let mut both = DMatrix::<f64>::zeros(n + m, x.ncols());
        both.rows_mut(0, n).copy_from(x);
        both.rows_mut(n, m).copy_from(y);
        PlugInVariance::fit(&both)?
    } else {
        PlugInVariance::fit(x)?
    };
    let scale = (n - m) as f64 / (n * m) as f64;

    let d = x.ncols();
    let mut clamped_rows = 0usize;
    let mut sampled = x.clone();
    for i in 0..n {
        let point = x.row(i).transpose();
        let sigma = estimator.covariance(&point) * scale;
        let (factor, clamped) = covariance_factor(&sigma);
        if clamped {
            clamped_rows += 1;
        }
        let z = DVector::from_fn(d, |_, _| standard_normal(&mut *rng));
        let noise = factor * z;
        for (k, v) in noise.iter().enumerate() {
            sampled[(i, k)] += v;
        }
    }
    if clamped_rows > 0 {
        log::warn!(
            "size correction: {clamped_rows} of {n} covariance estimates were not positive semi-definite; negative eigenvalues clamped to zero"
        );
    }
    log::debug!("size correction: added noise to {n} rows (scale {scale:.3e}, pooled = {pooled})");
    Ok((sampled, y.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_from_seed;

    fn constant_embedding(n: usize, value: f64) -> DMatrix<f64> {
        DMatrix::from_element(n, 1, value)
    }

    #[test]
    fn test_covariance_of_constant_positions() {
        // One-dimensional positions c with p = c²: Σ = 1 − p.
        let x = constant_embedding(10, 0.5_f64.sqrt());
        let est = PlugInVariance::fit(&x).unwrap();
        let sigma = est.covariance(&DVector::from_element(1, 0.5_f64.sqrt()));
        assert!((sigma[(0, 0)] - 0.5).abs() < 1e-12, "{}", sigma[(0, 0)]);
    }

    #[test]
    fn test_equal_sizes_unchanged() {
        let x = constant_embedding(5, 0.3);
        let y = constant_embedding(5, 0.4);
        let mut rng = rng_from_seed(Some(1));
        let (a, b) = sample_modified_ase(&x, &y, false, &mut rng).unwrap();
        assert_eq!(a, x);
        assert_eq!(b, y);
    }

    #[test]
    fn test_only_larger_sample_changes_and_order_kept() {
        let small = constant_embedding(20, 0.7);
        let large = constant_embedding(200, 0.7);
        let mut rng = rng_from_seed(Some(2));

        let (a, b) = sample_modified_ase(&small, &large, false, &mut rng).unwrap();
        assert_eq!(a, small);
        assert_eq!(b.nrows(), 200);
        assert!(b != large);

        let (c, d) = sample_modified_ase(&large, &small, true, &mut rng).unwrap();
        assert_eq!(c.nrows(), 200);
        assert_eq!(d, small);
    }

    #[test]
    fn test_noise_variance_matches_scale() {
        let p = 0.8_f64.sqrt();
        let small = constant_embedding(100, p);
        let large = constant_embedding(1000, p);
        let mut rng = rng_from_seed(Some(3));
        let (_, noisy) = sample_modified_ase(&small, &large, false, &mut rng).unwrap();
        // Σ = 1 − p² = 0.2, scaled by (N − M)/(N M) = 0.009.
        let expected = 0.2 * 900.0 / 100_000.0;
        let mean = noisy.mean();
        let var = noisy.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 1000.0;
        assert!((var - expected).abs() / expected < 0.15, "var {var} vs {expected}");
    }

    #[test]
    fn test_singular_delta_is_value_error() {
        let x = DMatrix::zeros(10, 2);
        let y = DMatrix::zeros(5, 2);
        let mut rng = rng_from_seed(Some(4));
        let err = sample_modified_ase(&x, &y, false, &mut rng).unwrap_err();
        assert!(matches!(err, LdtError::Numerical { .. }));
        assert!(err.is_value_error());
    }
}
