//! Independence and two-sample statistics with permutation nulls.
//!
//! Provides four statistics for testing whether two samples come from the same
//! distribution: unbiased distance correlation (`dcorr`), the Hilbert-Schmidt
//! independence criterion (`hsic`), the RV coefficient (`rv`) and a canonical
//! correlation trace (`cca`). A two-sample problem is reduced to an independence
//! problem by stacking the samples and pairing them with one-hot group labels
//! ([`k_sample_transform`]); the null distribution comes from permuting the
//! labels ([`PermutationTest`]).

pub mod pairwise;

pub use pairwise::{DISTANCE_NAMES, KERNEL_NAMES, Metric, MetricKind, PairwiseMetric};

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors raised while computing statistics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("unknown test {name:?}; expected one of: {expected}")]
    UnknownTest { name: String, expected: String },

    #[error("unknown metric {name:?}; expected one of: {expected}")]
    UnknownMetric { name: String, expected: String },

    #[error("{test} needs at least {needed} samples, got {got}")]
    InsufficientSamples {
        test: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("samples have different numbers of columns: {left} vs {right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("{metric} is only defined for non-negative features")]
    NegativeFeatures { metric: &'static str },

    #[error("metric {metric} returned a {rows}x{cols} matrix for {expected} samples")]
    BadPairwiseShape {
        metric: String,
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("at least one permutation is required")]
    NoReplicates,
}

/// Independence statistic used by the two-sample test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndependenceTest {
    /// Canonical correlation trace `tr(Sxx⁺ Sxy Syy⁺ Syx)`.
    Cca,
    /// Unbiased distance correlation.
    Dcorr,
    /// Hilbert-Schmidt independence criterion.
    Hsic,
    /// RV coefficient.
    Rv,
}

impl IndependenceTest {
    pub const ALL: [IndependenceTest; 4] = [Self::Cca, Self::Dcorr, Self::Hsic, Self::Rv];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cca => "cca",
            Self::Dcorr => "dcorr",
            Self::Hsic => "hsic",
            Self::Rv => "rv",
        }
    }

    /// The metric kind this test expects, or `None` when the test works on
    /// raw coordinates and ignores the metric.
    pub fn preferred_metric(self) -> Option<MetricKind> {
        match self {
            Self::Dcorr => Some(MetricKind::Distance),
            Self::Hsic => Some(MetricKind::Kernel),
            Self::Cca | Self::Rv => None,
        }
    }

    /// Minimum number of pooled samples the statistic is defined for.
    pub fn min_samples(self) -> usize {
        match self {
            // The unbiased centering divides by n(n-3).
            Self::Dcorr | Self::Hsic => 4,
            Self::Cca | Self::Rv => 2,
        }
    }
}

impl std::fmt::Display for IndependenceTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IndependenceTest {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cca" => Ok(Self::Cca),
            "dcorr" => Ok(Self::Dcorr),
            "hsic" => Ok(Self::Hsic),
            "rv" => Ok(Self::Rv),
            _ => Err(StatsError::UnknownTest {
                name: s.to_string(),
                expected: Self::ALL.map(|t| t.as_str()).join(", "),
            }),
        }
    }
}

/// Observed statistic, permutation p-value and the null distribution.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub null_distribution: Vec<f64>,
}

impl TestOutcome {
    /// Upper-tail permutation p-value: `(1 + #{null ≥ stat}) / (1 + reps)`.
    pub fn p_from_null(statistic: f64, null: &[f64]) -> f64 {
        let exceed = null.iter().filter(|&&v| v >= statistic).count();
        (1 + exceed) as f64 / (1 + null.len()) as f64
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// K-sample transform
// ═══════════════════════════════════════════════════════════════════════════════

/// Stack `x` over `y` and build one-hot group labels.
///
/// Returns `(u, v)` where `u` is `(n + m) × d` and `v` is `(n + m) × 2`.
pub fn k_sample_transform(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
) -> Result<(DMatrix<f64>, DMatrix<f64>), StatsError> {
    if x.ncols() != y.ncols() {
        return Err(StatsError::ShapeMismatch {
            left: x.ncols(),
            right: y.ncols(),
        });
    }
    let (n, m, d) = (x.nrows(), y.nrows(), x.ncols());
    let mut u = DMatrix::zeros(n + m, d);
    u.rows_mut(0, n).copy_from(x);
    u.rows_mut(n, m).copy_from(y);
    let mut v = DMatrix::zeros(n + m, 2);
    for i in 0..n {
        v[(i, 0)] = 1.0;
    }
    for i in n..n + m {
        v[(i, 1)] = 1.0;
    }
    Ok((u, v))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Unbiased (U-)centering of a distance matrix; the diagonal is zeroed.
pub fn center_distance_matrix(d: &DMatrix<f64>) -> DMatrix<f64> {
    let n = d.nrows();
    let nf = n as f64;
    let col_sums: Vec<f64> = d.column_iter().map(|c| c.sum()).collect();
    let row_sums: Vec<f64> = d.row_iter().map(|r| r.sum()).collect();
    let total: f64 = col_sums.iter().sum();
    let mut out = DMatrix::zeros(n, n);
    for j in 0..n {
        for i in 0..n {
            if i == j {
                continue;
            }
            out[(i, j)] = d[(i, j)] - col_sums[j] / (nf - 2.0) - row_sums[i] / (nf - 2.0)
                + total / ((nf - 1.0) * (nf - 2.0));
        }
    }
    out
}

fn u_statistic(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    let n = a.nrows() as f64;
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f64>() / (n * (n - 3.0))
}

/// Unbiased distance covariance between two distance matrices.
pub fn dcov(distx: &DMatrix<f64>, disty: &DMatrix<f64>) -> Result<f64, StatsError> {
    check_samples("dcov", distx.nrows(), 4)?;
    Ok(u_statistic(
        &center_distance_matrix(distx),
        &center_distance_matrix(disty),
    ))
}

/// Unbiased distance correlation between two distance matrices.
///
/// Returns 0 when either variance term is non-positive.
pub fn dcorr(distx: &DMatrix<f64>, disty: &DMatrix<f64>) -> Result<f64, StatsError> {
    check_samples("dcorr", distx.nrows(), 4)?;
    let a = center_distance_matrix(distx);
    let b = center_distance_matrix(disty);
    let varx = u_statistic(&a, &a);
    let vary = u_statistic(&b, &b);
    if varx <= 0.0 || vary <= 0.0 {
        return Ok(0.0);
    }
    Ok(u_statistic(&a, &b) / (varx * vary).sqrt())
}

/// Convert a kernel (similarity) matrix into a distance: `1 − K / max(K)`.
pub fn kernel_to_distance(k: &DMatrix<f64>) -> DMatrix<f64> {
    let max = k.max();
    if max == 0.0 || !max.is_finite() {
        return k.map(|v| 1.0 - v);
    }
    k.map(|v| 1.0 - v / max)
}

/// HSIC between two kernel matrices, computed through its distance
/// correlation equivalent.
pub fn hsic(kernx: &DMatrix<f64>, kerny: &DMatrix<f64>) -> Result<f64, StatsError> {
    check_samples("hsic", kernx.nrows(), 4)?;
    dcorr(&kernel_to_distance(kernx), &kernel_to_distance(kerny))
}

fn center_columns(x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = x.clone();
    for mut col in out.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }
    out
}

/// RV coefficient: `‖Sxy‖²_F / (‖Sxx‖_F ‖Syy‖_F)` on centered data.
pub fn rv(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<f64, StatsError> {
    check_samples("rv", x.nrows(), 2)?;
    let prepared = LinearPrepared::new(x, y, LinearKind::Rv);
    Ok(prepared.statistic(&prepared.cy))
}

/// Canonical correlation trace `tr(Sxx⁺ Sxy Syy⁺ Syx)` on centered data.
pub fn cca(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<f64, StatsError> {
    check_samples("cca", x.nrows(), 2)?;
    let prepared = LinearPrepared::new(x, y, LinearKind::Cca);
    Ok(prepared.statistic(&prepared.cy))
}

fn check_samples(test: &'static str, got: usize, needed: usize) -> Result<(), StatsError> {
    if got < needed {
        return Err(StatsError::InsufficientSamples { test, needed, got });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permutation test
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinearKind {
    Cca,
    Rv,
}

/// Centered inputs and cached normalisers for the linear statistics.
struct LinearPrepared {
    kind: LinearKind,
    cx: DMatrix<f64>,
    cy: DMatrix<f64>,
    /// `Sxx⁺` for CCA, unused for RV.
    sxx_pinv: DMatrix<f64>,
    /// `Syy⁺` for CCA, unused for RV.
    syy_pinv: DMatrix<f64>,
    /// `‖Sxx‖_F ‖Syy‖_F` for RV, unused for CCA.
    rv_denominator: f64,
}

impl LinearPrepared {
    fn new(x: &DMatrix<f64>, y: &DMatrix<f64>, kind: LinearKind) -> Self {
        let cx = center_columns(x);
        let cy = center_columns(y);
        let sxx = cx.transpose() * &cx;
        let syy = cy.transpose() * &cy;
        let rv_denominator = sxx.norm() * syy.norm();
        let (sxx_pinv, syy_pinv) = match kind {
            LinearKind::Cca => (pinv(&sxx), pinv(&syy)),
            LinearKind::Rv => (DMatrix::zeros(0, 0), DMatrix::zeros(0, 0)),
        };
        Self {
            kind,
            cx,
            cy,
            sxx_pinv,
            syy_pinv,
            rv_denominator,
        }
    }

    fn statistic(&self, cy: &DMatrix<f64>) -> f64 {
        let sxy = self.cx.transpose() * cy;
        match self.kind {
            LinearKind::Rv => {
                if self.rv_denominator <= 0.0 {
                    return 0.0;
                }
                sxy.norm_squared() / self.rv_denominator
            }
            LinearKind::Cca => (&self.sxx_pinv * &sxy * &self.syy_pinv * sxy.transpose()).trace(),
        }
    }

    fn permuted(&self, perm: &[usize]) -> f64 {
        let cy = DMatrix::from_fn(self.cy.nrows(), self.cy.ncols(), |i, j| {
            self.cy[(perm[i], j)]
        });
        self.statistic(&cy)
    }
}

fn pinv(m: &DMatrix<f64>) -> DMatrix<f64> {
    m.clone()
        .pseudo_inverse(1e-10)
        .unwrap_or_else(|_| DMatrix::zeros(m.ncols(), m.nrows()))
}

/// Centered distance matrices and the permutation-invariant normaliser.
struct DistancePrepared {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    denominator: f64,
}

impl DistancePrepared {
    fn new(distx: &DMatrix<f64>, disty: &DMatrix<f64>) -> Self {
        let a = center_distance_matrix(distx);
        let b = center_distance_matrix(disty);
        let varx = u_statistic(&a, &a);
        let vary = u_statistic(&b, &b);
        let denominator = if varx <= 0.0 || vary <= 0.0 {
            0.0
        } else {
            (varx * vary).sqrt()
        };
        Self { a, b, denominator }
    }

    fn scale(&self) -> f64 {
        let n = self.a.nrows() as f64;
        n * (n - 3.0) * self.denominator
    }

    fn observed(&self) -> f64 {
        if self.denominator == 0.0 {
            return 0.0;
        }
        let raw: f64 = self.a.iter().zip(self.b.iter()).map(|(x, y)| x * y).sum();
        raw / self.scale()
    }

    /// Permuting labels permutes rows and columns of the centered label
    /// matrix, and centering commutes with that, so `b` is reused.
    fn permuted(&self, perm: &[usize]) -> f64 {
        if self.denominator == 0.0 {
            return 0.0;
        }
        let n = self.a.nrows();
        // Both matrices are symmetric, so column-major slices read as rows.
        let a = self.a.as_slice();
        let b = self.b.as_slice();
        let mut raw = 0.0;
        for i in 0..n {
            let row_a = &a[i * n..(i + 1) * n];
            let row_b = &b[perm[i] * n..(perm[i] + 1) * n];
            for j in 0..n {
                raw += row_a[j] * row_b[perm[j]];
            }
        }
        raw / self.scale()
    }
}

enum Prepared {
    Distance(DistancePrepared),
    Linear(LinearPrepared),
}

impl Prepared {
    fn observed(&self) -> f64 {
        match self {
            Self::Distance(p) => p.observed(),
            Self::Linear(p) => p.statistic(&p.cy),
        }
    }

    fn permuted_with_seed(&self, n: usize, seed: u64) -> f64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(&mut rng);
        match self {
            Self::Distance(p) => p.permuted(&perm),
            Self::Linear(p) => p.permuted(&perm),
        }
    }
}

/// Permutation test of independence between the rows of `x` and `y`.
#[derive(Debug, Clone)]
pub struct PermutationTest {
    pub test: IndependenceTest,
    /// Number of label permutations.
    pub reps: usize,
    /// Worker threads for the permutations (at least 1).
    pub workers: usize,
    /// Seed for reproducible permutations; OS entropy when `None`.
    pub seed: Option<u64>,
}

impl PermutationTest {
    pub fn new(test: IndependenceTest, reps: usize) -> Self {
        Self {
            test,
            reps,
            workers: 1,
            seed: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Run the test. `metric` is applied to both `x` and `y` for the
    /// distance/kernel statistics and ignored by `cca` and `rv`.
    pub fn run(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        metric: &dyn PairwiseMetric,
    ) -> Result<TestOutcome, StatsError> {
        if self.reps == 0 {
            return Err(StatsError::NoReplicates);
        }
        let n = x.nrows();
        check_samples(self.test.as_str(), n.min(y.nrows()), self.test.min_samples())?;

        let prepared = match self.test {
            IndependenceTest::Dcorr => {
                let dx = checked_pairwise(metric, x)?;
                let dy = checked_pairwise(metric, y)?;
                Prepared::Distance(DistancePrepared::new(&dx, &dy))
            }
            IndependenceTest::Hsic => {
                let kx = checked_pairwise(metric, x)?;
                let ky = checked_pairwise(metric, y)?;
                Prepared::Distance(DistancePrepared::new(
                    &kernel_to_distance(&kx),
                    &kernel_to_distance(&ky),
                ))
            }
            IndependenceTest::Cca => Prepared::Linear(LinearPrepared::new(x, y, LinearKind::Cca)),
            IndependenceTest::Rv => Prepared::Linear(LinearPrepared::new(x, y, LinearKind::Rv)),
        };

        let statistic = prepared.observed();

        // Seeds are drawn up front so the null does not depend on `workers`.
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let seeds: Vec<u64> = (0..self.reps).map(|_| rng.random()).collect();
        let mut null = vec![0.0; self.reps];

        let workers = self.workers.clamp(1, self.reps);
        if workers == 1 {
            for (slot, &seed) in null.iter_mut().zip(&seeds) {
                *slot = prepared.permuted_with_seed(n, seed);
            }
        } else {
            let chunk = self.reps.div_ceil(workers);
            let prepared = &prepared;
            std::thread::scope(|s| {
                for (out, seeds) in null.chunks_mut(chunk).zip(seeds.chunks(chunk)) {
                    s.spawn(move || {
                        for (slot, &seed) in out.iter_mut().zip(seeds) {
                            *slot = prepared.permuted_with_seed(n, seed);
                        }
                    });
                }
            });
        }

        log::debug!(
            "{} permutation test: n={n}, reps={}, workers={workers}, stat={statistic:.6}",
            self.test,
            self.reps
        );

        let p_value = TestOutcome::p_from_null(statistic, &null);
        Ok(TestOutcome {
            statistic,
            p_value,
            null_distribution: null,
        })
    }
}

fn checked_pairwise(
    metric: &dyn PairwiseMetric,
    x: &DMatrix<f64>,
) -> Result<DMatrix<f64>, StatsError> {
    let out = metric.pairwise(x)?;
    if out.nrows() != x.nrows() || out.ncols() != x.nrows() {
        return Err(StatsError::BadPairwiseShape {
            metric: metric.name().to_string(),
            rows: out.nrows(),
            cols: out.ncols(),
            expected: x.nrows(),
        });
    }
    Ok(out)
}

/// Two-sample test: are the rows of `x` and `y` drawn from the same
/// distribution?
pub fn two_sample_test(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    metric: &dyn PairwiseMetric,
    config: &PermutationTest,
) -> Result<TestOutcome, StatsError> {
    let (u, v) = k_sample_transform(x, y)?;
    config.run(&u, &v, metric)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gaussian sample via Box-Muller on a seeded RNG.
    fn normal_sample(rng: &mut StdRng, n: usize, d: usize, shift: f64) -> DMatrix<f64> {
        DMatrix::from_fn(n, d, |_, _| {
            let u1 = rng.random::<f64>().clamp(f64::MIN_POSITIVE, 1.0);
            let u2 = rng.random::<f64>();
            shift + (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
        })
    }

    #[test]
    fn test_parse_tests() {
        assert_eq!("DCORR".parse::<IndependenceTest>().unwrap(), IndependenceTest::Dcorr);
        assert_eq!("hsic".parse::<IndependenceTest>().unwrap(), IndependenceTest::Hsic);
        let err = "foo".parse::<IndependenceTest>().unwrap_err();
        assert!(err.to_string().contains("dcorr"));
    }

    #[test]
    fn test_p_from_null() {
        let null = [0.1, 0.2, 0.3, 0.4];
        assert!((TestOutcome::p_from_null(0.25, &null) - 3.0 / 5.0).abs() < 1e-12);
        assert!((TestOutcome::p_from_null(1.0, &null) - 1.0 / 5.0).abs() < 1e-12);
        assert!((TestOutcome::p_from_null(0.0, &null) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_sample_transform() {
        let x = DMatrix::from_element(2, 3, 1.0);
        let y = DMatrix::from_element(3, 3, 2.0);
        let (u, v) = k_sample_transform(&x, &y).unwrap();
        assert_eq!(u.shape(), (5, 3));
        assert_eq!(v.shape(), (5, 2));
        assert_eq!(u[(4, 2)], 2.0);
        assert_eq!(v[(0, 0)], 1.0);
        assert_eq!(v[(4, 1)], 1.0);
        assert_eq!(v.sum(), 5.0);

        let bad = DMatrix::zeros(2, 2);
        assert_eq!(
            k_sample_transform(&x, &bad).unwrap_err(),
            StatsError::ShapeMismatch { left: 3, right: 2 }
        );
    }

    #[test]
    fn test_centered_matrix_rows_sum_to_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let x = normal_sample(&mut rng, 10, 2, 0.0);
        let d = Metric::Euclidean.pairwise(&x).unwrap();
        let c = center_distance_matrix(&d);
        for i in 0..10 {
            assert!(c.row(i).sum().abs() < 1e-9, "row {i} sum {}", c.row(i).sum());
            assert_eq!(c[(i, i)], 0.0);
        }
    }

    #[test]
    fn test_dcorr_self_is_one() {
        let mut rng = StdRng::seed_from_u64(11);
        let x = normal_sample(&mut rng, 30, 2, 0.0);
        let d = Metric::Euclidean.pairwise(&x).unwrap();
        let r = dcorr(&d, &d).unwrap();
        assert!((r - 1.0).abs() < 1e-9, "dcorr(x, x) = {r}");
    }

    #[test]
    fn test_dcorr_needs_four_samples() {
        let d = DMatrix::zeros(3, 3);
        assert!(matches!(
            dcorr(&d, &d),
            Err(StatsError::InsufficientSamples { needed: 4, .. })
        ));
    }

    #[test]
    fn test_rv_self_is_one() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = normal_sample(&mut rng, 25, 3, 0.0);
        let r = rv(&x, &x).unwrap();
        assert!((r - 1.0).abs() < 1e-9, "rv(x, x) = {r}");
    }

    #[test]
    fn test_cca_self_is_rank() {
        let mut rng = StdRng::seed_from_u64(5);
        let x = normal_sample(&mut rng, 40, 2, 0.0);
        let r = cca(&x, &x).unwrap();
        assert!((r - 2.0).abs() < 1e-6, "cca(x, x) = {r}");
    }

    #[test]
    fn test_null_length_and_p_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let x = normal_sample(&mut rng, 20, 2, 0.0);
        let y = normal_sample(&mut rng, 25, 2, 0.0);
        for test in IndependenceTest::ALL {
            let cfg = PermutationTest::new(test, 37).with_seed(Some(1));
            let out = two_sample_test(&x, &y, &Metric::Euclidean, &cfg).unwrap();
            assert_eq!(out.null_distribution.len(), 37, "{test}");
            assert!((0.0..=1.0).contains(&out.p_value), "{test} p={}", out.p_value);
            assert!(out.statistic.is_finite(), "{test}");
        }
    }

    #[test]
    fn test_shifted_samples_rejected() {
        let mut rng = StdRng::seed_from_u64(2024);
        let x = normal_sample(&mut rng, 60, 2, 0.0);
        let y = normal_sample(&mut rng, 60, 2, 2.0);
        let cfg = PermutationTest::new(IndependenceTest::Dcorr, 200).with_seed(Some(9));
        let out = two_sample_test(&x, &y, &Metric::Euclidean, &cfg).unwrap();
        assert!(out.p_value <= 0.05, "p={}", out.p_value);

        let cfg = PermutationTest::new(IndependenceTest::Hsic, 200).with_seed(Some(9));
        let out = two_sample_test(&x, &y, &Metric::Gaussian, &cfg).unwrap();
        assert!(out.p_value <= 0.05, "p={}", out.p_value);
    }

    #[test]
    fn test_workers_do_not_change_null() {
        let mut rng = StdRng::seed_from_u64(77);
        let x = normal_sample(&mut rng, 15, 2, 0.0);
        let y = normal_sample(&mut rng, 15, 2, 0.5);
        let serial = PermutationTest::new(IndependenceTest::Dcorr, 50).with_seed(Some(3));
        let parallel = serial.clone().with_workers(4);
        let a = two_sample_test(&x, &y, &Metric::Euclidean, &serial).unwrap();
        let b = two_sample_test(&x, &y, &Metric::Euclidean, &parallel).unwrap();
        assert_eq!(a.null_distribution, b.null_distribution);
        assert_eq!(a.p_value, b.p_value);
    }

    #[test]
    fn test_zero_reps_rejected() {
        let x = DMatrix::zeros(5, 1);
        let cfg = PermutationTest::new(IndependenceTest::Dcorr, 0);
        assert_eq!(
            cfg.run(&x, &x, &Metric::Euclidean).unwrap_err(),
            StatsError::NoReplicates
        );
    }

    #[test]
    fn test_permuted_identity_matches_observed() {
        let mut rng = StdRng::seed_from_u64(8);
        let x = normal_sample(&mut rng, 12, 2, 0.0);
        let y = normal_sample(&mut rng, 12, 1, 0.0);
        let dx = Metric::Euclidean.pairwise(&x).unwrap();
        let dy = Metric::Euclidean.pairwise(&y).unwrap();
        let prepared = DistancePrepared::new(&dx, &dy);
        let identity: Vec<usize> = (0..12).collect();
        assert!((prepared.permuted(&identity) - prepared.observed()).abs() < 1e-12);
        assert!((prepared.observed() - dcorr(&dx, &dy).unwrap()).abs() < 1e-12);
    }
}
