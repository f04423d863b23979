//! Pairwise distance and kernel matrices.
//!
//! Every metric maps an `n × d` sample matrix to a symmetric `n × n` matrix.
//! Distances are zero on the diagonal; kernels use sklearn's default
//! parameters (`gamma = 1/d`, `coef0 = 1`, `degree = 3`) so results line up
//! with the reference implementations the statistics were validated against.

use nalgebra::DMatrix;
use statrs::statistics::{Data, Median};

use crate::StatsError;

/// Whether a metric measures dissimilarity or similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Distance,
    Kernel,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Distance => write!(f, "distance"),
            Self::Kernel => write!(f, "kernel"),
        }
    }
}

/// Anything that can turn a sample matrix into a pairwise matrix.
///
/// Implemented by the built-in [`Metric`] names; callers may plug in their own
/// metric (the result must be a symmetric `n × n` matrix).
pub trait PairwiseMetric: Send + Sync {
    /// Display name, used in logs and results.
    fn name(&self) -> &str;

    /// Distance or kernel. `None` for metrics that do not declare one, which
    /// suppresses pairing advice.
    fn kind(&self) -> Option<MetricKind> {
        None
    }

    /// Compute the pairwise matrix of the rows of `x`.
    fn pairwise(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, StatsError>;
}

/// Built-in distances and kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// `‖x − y‖₂` (aliases: `l2`).
    Euclidean,
    /// `‖x − y‖₁` (aliases: `l1`, `cityblock`).
    Manhattan,
    /// `1 − cos(x, y)`.
    Cosine,
    /// RBF kernel with the median-heuristic bandwidth on L1 distances.
    Gaussian,
    /// `exp(−γ‖x − y‖²)`.
    Rbf,
    /// `exp(−γ‖x − y‖₁)`.
    Laplacian,
    /// `⟨x, y⟩`.
    Linear,
    /// `(γ⟨x, y⟩ + 1)³` (aliases: `poly`).
    Polynomial,
    /// `tanh(γ⟨x, y⟩ + 1)`.
    Sigmoid,
    /// `exp(−Σ (x − y)² / (x + y))`.
    Chi2,
    /// `−Σ (x − y)² / (x + y)`.
    AdditiveChi2,
}

/// Names accepted for distance metrics.
pub const DISTANCE_NAMES: &[&str] = &["cityblock", "cosine", "euclidean", "l1", "l2", "manhattan"];

/// Names accepted for kernel metrics.
pub const KERNEL_NAMES: &[&str] = &[
    "additive_chi2",
    "chi2",
    "gaussian",
    "laplacian",
    "linear",
    "poly",
    "polynomial",
    "rbf",
    "sigmoid",
];

impl Metric {
    pub fn kind(self) -> MetricKind {
        match self {
            Self::Euclidean | Self::Manhattan | Self::Cosine => MetricKind::Distance,
            _ => MetricKind::Kernel,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
            Self::Cosine => "cosine",
            Self::Gaussian => "gaussian",
            Self::Rbf => "rbf",
            Self::Laplacian => "laplacian",
            Self::Linear => "linear",
            Self::Polynomial => "polynomial",
            Self::Sigmoid => "sigmoid",
            Self::Chi2 => "chi2",
            Self::AdditiveChi2 => "additive_chi2",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "manhattan" | "l1" | "cityblock" => Ok(Self::Manhattan),
            "cosine" => Ok(Self::Cosine),
            "gaussian" => Ok(Self::Gaussian),
            "rbf" => Ok(Self::Rbf),
            "laplacian" => Ok(Self::Laplacian),
            "linear" => Ok(Self::Linear),
            "poly" | "polynomial" => Ok(Self::Polynomial),
            "sigmoid" => Ok(Self::Sigmoid),
            "chi2" => Ok(Self::Chi2),
            "additive_chi2" => Ok(Self::AdditiveChi2),
            _ => Err(StatsError::UnknownMetric {
                name: s.to_string(),
                expected: [DISTANCE_NAMES, KERNEL_NAMES].concat().join(", "),
            }),
        }
    }
}

impl PairwiseMetric for Metric {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn kind(&self) -> Option<MetricKind> {
        Some(Metric::kind(*self))
    }

    fn pairwise(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, StatsError> {
        let d = x.ncols().max(1) as f64;
        let gamma = 1.0 / d;
        let out = match self {
            Self::Euclidean => symmetric_fill(x, 0.0, |a, b| squared_euclidean(a, b).sqrt()),
            Self::Manhattan => symmetric_fill(x, 0.0, manhattan),
            Self::Cosine => {
                let norms: Vec<f64> = x.row_iter().map(|r| r.norm()).collect();
                let mut out = DMatrix::zeros(x.nrows(), x.nrows());
                for i in 0..x.nrows() {
                    for j in (i + 1)..x.nrows() {
                        let denom = norms[i] * norms[j];
                        // Zero vectors have no direction: similarity 0.
                        let sim = if denom > 0.0 { dot(x, i, j) / denom } else { 0.0 };
                        let dist = (1.0 - sim).max(0.0);
                        out[(i, j)] = dist;
                        out[(j, i)] = dist;
                    }
                }
                out
            }
            Self::Gaussian => gaussian_kernel(x),
            Self::Rbf => symmetric_fill(x, 1.0, |a, b| (-gamma * squared_euclidean(a, b)).exp()),
            Self::Laplacian => symmetric_fill(x, 1.0, |a, b| (-gamma * manhattan(a, b)).exp()),
            Self::Linear => x * x.transpose(),
            Self::Polynomial => (x * x.transpose()).map(|v| (gamma * v + 1.0).powi(3)),
            Self::Sigmoid => (x * x.transpose()).map(|v| (gamma * v + 1.0).tanh()),
            Self::Chi2 => {
                reject_negative(x, "chi2")?;
                symmetric_fill(x, 1.0, |a, b| (-chi2_sum(a, b)).exp())
            }
            Self::AdditiveChi2 => {
                reject_negative(x, "additive_chi2")?;
                symmetric_fill(x, 0.0, |a, b| -chi2_sum(a, b))
            }
        };
        Ok(out)
    }
}

/// RBF kernel with `gamma = 1 / (2·median²)`, the median taken over the
/// off-diagonal L1 distances. A zero median (e.g. on label vectors) falls
/// back to 1.
pub fn gaussian_kernel(x: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let l1 = symmetric_fill(x, 0.0, manhattan);
    let mut off_diagonal = Vec::with_capacity(n * n.saturating_sub(1));
    for j in 0..n {
        for i in 0..n {
            if i != j {
                off_diagonal.push(l1[(i, j)]);
            }
        }
    }
    let med = if off_diagonal.is_empty() {
        0.0
    } else {
        Data::new(off_diagonal).median()
    };
    let med = if med > 0.0 && med.is_finite() { med } else { 1.0 };
    let gamma = 1.0 / (2.0 * med * med);
    symmetric_fill(x, 1.0, |a, b| (-gamma * squared_euclidean(a, b)).exp())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fill a symmetric matrix from a row-pair function; the diagonal is `diag`.
fn symmetric_fill<F>(x: &DMatrix<f64>, diag: f64, f: F) -> DMatrix<f64>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let n = x.nrows();
    let rows: Vec<Vec<f64>> = x.row_iter().map(|r| r.iter().copied().collect()).collect();
    let mut out = DMatrix::from_element(n, n, diag);
    for i in 0..n {
        for j in (i + 1)..n {
            let v = f(&rows[i], &rows[j]);
            out[(i, j)] = v;
            out[(j, i)] = v;
        }
    }
    out
}

fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

fn chi2_sum(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let s = x + y;
            if s > 0.0 { (x - y) * (x - y) / s } else { 0.0 }
        })
        .sum()
}

fn dot(x: &DMatrix<f64>, i: usize, j: usize) -> f64 {
    x.row(i).dot(&x.row(j))
}

fn reject_negative(x: &DMatrix<f64>, metric: &'static str) -> Result<(), StatsError> {
    if x.iter().any(|&v| v < 0.0) {
        return Err(StatsError::NegativeFeatures { metric });
    }
    Ok(())
}
