//! Adjacency spectral embedding (ASE) and dimension selection.
//!
//! Truncated SVDs use a randomized range finder (Halko et al.) when the
//! requested rank leaves room for oversampling, and a dense SVD otherwise.
//! Dimension selection follows Zhu & Ghodsi's profile likelihood.

use nalgebra::DMatrix;
use rand::Rng;
use statrs::distribution::{Continuous, Normal};

use crate::error::LdtError;
use crate::input::Adjacency;
use crate::random::standard_normal;

/// Extra random directions for the randomized range finder.
const N_OVERSAMPLES: usize = 10;
/// Power iterations for the randomized range finder.
const N_POWER_ITER: usize = 5;

/// Rank-`k` singular value decomposition `A ≈ U diag(s) Vᵀ`.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// `n × k` left singular vectors.
    pub u: DMatrix<f64>,
    /// Singular values, descending.
    pub s: Vec<f64>,
    /// `m × k` right singular vectors.
    pub v: DMatrix<f64>,
}

/// Replace the diagonal with the average of in- and out-degree over `n − 1`.
pub fn augment_diagonal(a: &DMatrix<f64>) -> DMatrix<f64> {
    let n = a.nrows();
    let mut out = a.clone();
    out.fill_diagonal(0.0);
    if n < 2 {
        return out;
    }
    let divisor = (n - 1) as f64;
    let out_degree: Vec<f64> = out.row_iter().map(|r| r.sum()).collect();
    let in_degree: Vec<f64> = out.column_iter().map(|c| c.sum()).collect();
    for i in 0..n {
        out[(i, i)] = (out_degree[i] + in_degree[i]) / 2.0 / divisor;
    }
    out
}

/// Top-`k` singular triplets of `a`.
pub fn select_svd<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    k: usize,
    rng: &mut R,
) -> Result<TruncatedSvd, LdtError> {
    let min_dim = a.nrows().min(a.ncols());
    if k == 0 || k > min_dim {
        return Err(LdtError::invalid_value(
            "n_components",
            format!("must be between 1 and {min_dim} for a {}x{} matrix", a.nrows(), a.ncols()),
        ));
    }

    let (u, s, v) = if k + N_OVERSAMPLES < min_dim {
        let q = randomized_range_finder(a, k + N_OVERSAMPLES, N_POWER_ITER, rng);
        let b = q.transpose() * a;
        let (u_hat, s, v) = dense_svd(&b)?;
        (q * u_hat, s, v)
    } else {
        dense_svd(a)?
    };

    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&i, &j| s[j].total_cmp(&s[i]));
    order.truncate(k);

    let mut u_k = u.select_columns(order.iter());
    let mut v_k = v.select_columns(order.iter());
    let s_k: Vec<f64> = order.iter().map(|&i| s[i]).collect();

    // Deterministic signs: the largest-magnitude entry of each U column is positive.
    for j in 0..k {
        let col = u_k.column(j);
        let pivot = col.iter().copied().fold(0.0_f64, |best, x| {
            if x.abs() > best.abs() { x } else { best }
        });
        if pivot < 0.0 {
            u_k.column_mut(j).neg_mut();
            v_k.column_mut(j).neg_mut();
        }
    }

    Ok(TruncatedSvd {
        u: u_k,
        s: s_k,
        v: v_k,
    })
}

fn dense_svd(a: &DMatrix<f64>) -> Result<(DMatrix<f64>, Vec<f64>, DMatrix<f64>), LdtError> {
    let svd = a.clone().svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(LdtError::Numerical {
            stage: "svd",
            reason: "singular vectors were not computed".to_string(),
        });
    };
    Ok((u, svd.singular_values.iter().copied().collect(), v_t.transpose()))
}

fn randomized_range_finder<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    size: usize,
    n_iter: usize,
    rng: &mut R,
) -> DMatrix<f64> {
    let mut q = DMatrix::from_fn(a.ncols(), size, |_, _| standard_normal(&mut *rng));
    for _ in 0..n_iter {
        q = (a * &q).qr().q();
        q = (a.transpose() * &q).qr().q();
    }
    (a * &q).qr().q()
}

/// Profile log-likelihood of splitting sorted values after each position.
fn profile_likelihood(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut likelihoods = vec![f64::NEG_INFINITY; n];
    for idx in 1..=n {
        let (s1, s2) = values.split_at(idx);
        if s1.len() == 1 && s2.len() == 1 {
            continue;
        }
        let mu1 = s1.iter().sum::<f64>() / s1.len() as f64;
        let mu2 = if s2.is_empty() {
            0.0
        } else {
            s2.iter().sum::<f64>() / s2.len() as f64
        };
        let ss: f64 = s1.iter().map(|x| (x - mu1).powi(2)).sum::<f64>()
            + s2.iter().map(|x| (x - mu2).powi(2)).sum::<f64>();
        let dof = n as f64 - 1.0 - if idx < n { 1.0 } else { 0.0 };
        let std = (ss / dof).sqrt();
        let (Ok(d1), Ok(d2)) = (Normal::new(mu1, std), Normal::new(mu2, std)) else {
            continue;
        };
        likelihoods[idx - 1] = s1.iter().map(|&x| d1.ln_pdf(x)).sum::<f64>()
            + s2.iter().map(|&x| d2.ln_pdf(x)).sum::<f64>();
    }
    likelihoods
}

/// Zhu–Ghodsi elbows of a descending sequence of singular values.
///
/// Returns up to `n_elbows` cumulative elbow positions (1-based dimension
/// counts); the second elbow is searched after the first, and so on.
pub fn select_dimension(singular_values: &[f64], n_elbows: usize) -> Vec<usize> {
    let mut elbows = Vec::with_capacity(n_elbows);
    let mut idx = 0;
    for _ in 0..n_elbows {
        let rest = &singular_values[idx..];
        if rest.len() <= 1 {
            break;
        }
        let likelihoods = profile_likelihood(rest);
        let mut best = 0;
        for (i, &l) in likelihoods.iter().enumerate() {
            if l > likelihoods[best] {
                best = i;
            }
        }
        idx += best + 1;
        elbows.push(idx);
    }
    elbows
}

/// Number of latent dimensions of a graph: the last of `n_elbows` elbows over
/// its top `ceil(log2(n))` singular values.
pub fn estimate_dimension<R: Rng + ?Sized>(
    a: &DMatrix<f64>,
    n_elbows: usize,
    rng: &mut R,
) -> Result<usize, LdtError> {
    let n = a.nrows().min(a.ncols());
    if n == 0 {
        return Err(LdtError::invalid_value("graph", "graph has no nodes"));
    }
    let k = ((n as f64).log2().ceil() as usize).clamp(1, n);
    let svd = select_svd(a, k, rng)?;
    let elbows = select_dimension(&svd.s, n_elbows);
    Ok(elbows.last().copied().unwrap_or(1))
}

/// Latent positions produced by ASE.
#[derive(Debug, Clone)]
pub struct SpectralEmbedding {
    /// `U √S`.
    pub left: DMatrix<f64>,
    /// `V √S`, only for directed graphs.
    pub right: Option<DMatrix<f64>>,
    pub singular_values: Vec<f64>,
}

impl SpectralEmbedding {
    /// Left and right positions side by side (`n × 2d` for directed graphs).
    pub fn concatenated(&self) -> DMatrix<f64> {
        match &self.right {
            None => self.left.clone(),
            Some(right) => {
                let n = self.left.nrows();
                let d = self.left.ncols();
                let mut out = DMatrix::zeros(n, 2 * d);
                out.columns_mut(0, d).copy_from(&self.left);
                out.columns_mut(d, d).copy_from(right);
                out
            }
        }
    }
}

/// Adjacency spectral embedding.
#[derive(Debug, Clone)]
pub struct AdjacencySpectralEmbed {
    /// Embedding dimension; chosen by [`select_dimension`] when `None`.
    pub n_components: Option<usize>,
    pub n_elbows: usize,
    /// Fill the diagonal with scaled degrees before decomposing.
    pub diag_aug: bool,
}

impl Default for AdjacencySpectralEmbed {
    fn default() -> Self {
        Self {
            n_components: None,
            n_elbows: 2,
            diag_aug: true,
        }
    }
}

impl AdjacencySpectralEmbed {
    pub fn new(n_components: Option<usize>) -> Self {
        Self {
            n_components,
            ..Self::default()
        }
    }

    pub fn fit_transform<R: Rng + ?Sized>(
        &self,
        graph: &Adjacency,
        rng: &mut R,
    ) -> Result<SpectralEmbedding, LdtError> {
        let a = if self.diag_aug {
            augment_diagonal(&graph.matrix)
        } else {
            graph.matrix.clone()
        };
        let k = match self.n_components {
            Some(k) => k,
            None => estimate_dimension(&a, self.n_elbows, rng)?,
        };
        let svd = select_svd(&a, k, rng)?;
        let sqrt_s: Vec<f64> = svd.s.iter().map(|s| s.max(0.0).sqrt()).collect();
        let scale = |m: &DMatrix<f64>| {
            let mut out = m.clone();
            for (j, mut col) in out.column_iter_mut().enumerate() {
                col *= sqrt_s[j];
            }
            out
        };
        let left = scale(&svd.u);
        let right = graph.directed.then(|| scale(&svd.v));
        log::debug!(
            "ASE: n={}, k={k}, directed={}, top singular value {:.3}",
            graph.n_nodes(),
            graph.directed,
            svd.s[0]
        );
        Ok(SpectralEmbedding {
            left,
            right,
            singular_values: svd.s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::resolve_graph;
    use crate::simulations::{GraphOptions, er_np, sbm};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_augment_diagonal() {
        let a = DMatrix::from_row_slice(3, 3, &[5.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let aug = augment_diagonal(&a);
        assert!((aug[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((aug[(1, 1)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_select_svd_matches_dense() {
        let mut rng = StdRng::seed_from_u64(4);
        let a = er_np(80, 0.4, GraphOptions::undirected(), &mut rng).unwrap();
        let fast = select_svd(&a, 3, &mut rng).unwrap();
        let (_, dense, _) = dense_svd(&a).unwrap();
        let mut dense = dense;
        dense.sort_by(|x, y| y.total_cmp(x));
        assert!(
            (fast.s[0] - dense[0]).abs() / dense[0] < 1e-4,
            "{} vs {}",
            fast.s[0],
            dense[0]
        );
        assert_eq!(fast.u.shape(), (80, 3));
        assert_eq!(fast.v.shape(), (80, 3));
        assert!(fast.s.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_select_svd_rank_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let a = DMatrix::identity(4, 4);
        assert!(select_svd(&a, 5, &mut rng).unwrap_err().is_value_error());
        assert!(select_svd(&a, 0, &mut rng).is_err());
    }

    #[test]
    fn test_select_dimension_finds_gap() {
        let values = [10.0, 9.5, 9.0, 1.0, 0.9, 0.8, 0.7, 0.6];
        let elbows = select_dimension(&values, 2);
        assert_eq!(elbows[0], 3);
        assert!(elbows.len() == 2 && elbows[1] > 3);
    }

    #[test]
    fn test_select_dimension_short_input() {
        assert!(select_dimension(&[3.0], 2).is_empty());
        assert_eq!(select_dimension(&[3.0, 1.0], 2), vec![2]);
    }

    #[test]
    fn test_undirected_embedding_shape() {
        let mut rng = StdRng::seed_from_u64(123);
        let a = er_np(20, 0.8, GraphOptions::undirected(), &mut rng).unwrap();
        let g = resolve_graph(&a.into(), "graph").unwrap();
        let emb = AdjacencySpectralEmbed::new(Some(2))
            .fit_transform(&g, &mut rng)
            .unwrap();
        assert_eq!(emb.left.shape(), (20, 2));
        assert!(emb.right.is_none());
        // First latent coordinate of a dense ER graph is close to sqrt(p).
        let mean = emb.left.column(0).mean();
        assert!((mean - 0.8_f64.sqrt()).abs() < 0.15, "mean {mean}");
    }

    #[test]
    fn test_directed_embedding_concatenates() {
        let mut rng = StdRng::seed_from_u64(2);
        let a = er_np(40, 0.3, GraphOptions::directed(), &mut rng).unwrap();
        let g = resolve_graph(&a.into(), "graph").unwrap();
        let emb = AdjacencySpectralEmbed::new(Some(2))
            .fit_transform(&g, &mut rng)
            .unwrap();
        assert_eq!(emb.concatenated().shape(), (40, 4));
    }

    #[test]
    fn test_estimate_dimension_sbm() {
        let mut rng = StdRng::seed_from_u64(12345678);
        let probs = DMatrix::from_row_slice(2, 2, &[0.8, 0.1, 0.1, 0.8]);
        let a = sbm(&[100, 100], &probs, GraphOptions::undirected(), &mut rng).unwrap();
        let d = estimate_dimension(&a, 2, &mut rng).unwrap();
        assert!(d >= 2, "selected {d} dimensions");
    }
}
