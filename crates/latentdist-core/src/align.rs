//! Alignment of one embedding onto another.
//!
//! Spectral embeddings are only identified up to an orthogonal transform, so
//! before comparing two of them the first is rotated onto the second. Every
//! aligner learns a `d × d` orthogonal matrix `Q` and maps `X ↦ X Q`.

use nalgebra::DMatrix;

use crate::error::LdtError;

/// Widest embedding the exhaustive `2d` seedless start accepts.
pub const MAX_TWO_D_COLUMNS: usize = 20;

/// Statistic used by [`SignFlips`] to decide each column's orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignCriterion {
    #[default]
    Median,
    /// Entry with the largest magnitude.
    Max,
}

impl std::str::FromStr for SignCriterion {
    type Err = LdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "median" => Ok(Self::Median),
            "max" => Ok(Self::Max),
            other => Err(LdtError::invalid_value(
                "criterion",
                format!("{other:?} is not one of: median, max"),
            )),
        }
    }
}

/// Initialisation strategy for [`SeedlessProcrustes`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SeedlessInit {
    /// Try all `2^d` sign-flip matrices and keep the best.
    #[default]
    TwoD,
    /// Start from the [`SignFlips`] solution.
    SignFlips,
    /// Start from `initial_q`, else from Procrustes on `initial_p`, else identity.
    Custom,
}

impl std::str::FromStr for SeedlessInit {
    type Err = LdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2d" => Ok(Self::TwoD),
            "sign_flips" => Ok(Self::SignFlips),
            "custom" => Ok(Self::Custom),
            other => Err(LdtError::invalid_value(
                "init",
                format!("{other:?} is not one of: 2d, sign_flips, custom"),
            )),
        }
    }
}

fn check_same_dims(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<(), LdtError> {
    if x.ncols() != y.ncols() {
        return Err(LdtError::DimensionMismatch {
            left: x.ncols(),
            right: y.ncols(),
        });
    }
    Ok(())
}

fn column_median(col: impl Iterator<Item = f64>) -> f64 {
    let mut v: Vec<f64> = col.collect();
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

// ---------------------------------------------------------------------------
// Orthogonal Procrustes
// ---------------------------------------------------------------------------

/// Orthogonal `Q` minimising `‖X Q − Y‖_F` for paired rows.
#[derive(Debug, Clone, Default)]
pub struct OrthogonalProcrustes;

impl OrthogonalProcrustes {
    pub fn fit(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<DMatrix<f64>, LdtError> {
        check_same_dims(x, y)?;
        if x.nrows() != y.nrows() {
            return Err(LdtError::invalid_value(
                "procrustes",
                format!(
                    "paired alignment needs equal row counts, got {} and {}",
                    x.nrows(),
                    y.nrows()
                ),
            ));
        }
        let svd = (x.transpose() * y).svd(true, true);
        match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => Ok(u * v_t),
            _ => Err(LdtError::Numerical {
                stage: "procrustes",
                reason: "SVD did not converge".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Sign flips
// ---------------------------------------------------------------------------

/// Flip the columns of `X` whose criterion sign disagrees with `Y`'s.
#[derive(Debug, Clone, Default)]
pub struct SignFlips {
    pub criterion: SignCriterion,
}

impl SignFlips {
    fn criterion_values(&self, x: &DMatrix<f64>) -> Vec<f64> {
        x.column_iter()
            .map(|col| match self.criterion {
                SignCriterion::Median => column_median(col.iter().copied()),
                SignCriterion::Max => col.iter().copied().fold(0.0_f64, |best, v| {
                    if v.abs() > best.abs() { v } else { best }
                }),
            })
            .collect()
    }

    /// Diagonal `±1` matrix.
    pub fn fit(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<DMatrix<f64>, LdtError> {
        check_same_dims(x, y)?;
        let cx = self.criterion_values(x);
        let cy = self.criterion_values(y);
        let signs: Vec<f64> = cx
            .iter()
            .zip(&cy)
            .map(|(a, b)| if a * b >= 0.0 { 1.0 } else { -1.0 })
            .collect();
        Ok(DMatrix::from_diagonal(&nalgebra::DVector::from_vec(signs)))
    }

    pub fn fit_transform(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, LdtError> {
        Ok(x * self.fit(x, y)?)
    }
}

/// Diagonal sign matrix from the binary digits of `value` (MSB first;
/// `0 → +1`, `1 → −1`).
pub fn sign_flip_matrix_from_int(value: usize, d: usize) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(d, d);
    for i in 0..d {
        let bit = (value >> (d - 1 - i)) & 1;
        m[(i, i)] = if bit == 1 { -1.0 } else { 1.0 };
    }
    m
}

// ---------------------------------------------------------------------------
// Seedless Procrustes
// ---------------------------------------------------------------------------

/// Entropy-regularised optimal transport (Sinkhorn–Knopp) with uniform
/// marginals. Returns the `n × m` transport plan.
pub fn sinkhorn(
    cost: &DMatrix<f64>,
    reg: f64,
    max_iter: usize,
    stop_threshold: f64,
) -> DMatrix<f64> {
    let (n, m) = cost.shape();
    let a = 1.0 / n as f64;
    let b = 1.0 / m as f64;
    let k = cost.map(|c| (-c / reg).exp());
    let mut u = nalgebra::DVector::from_element(n, a);
    let mut v = nalgebra::DVector::from_element(m, b);

    for iter in 0..max_iter {
        let (u_prev, v_prev) = (u.clone(), v.clone());
        let kt_u = k.tr_mul(&u);
        let next_v = kt_u.map(|s| b / s);
        let k_v = &k * &next_v;
        let next_u = k_v.map(|s| 1.0 / (s / a));
        let degenerate = kt_u.iter().any(|&s| s == 0.0)
            || next_u.iter().chain(next_v.iter()).any(|s| !s.is_finite());
        if degenerate {
            log::warn!("sinkhorn: numerical errors at iteration {iter}, keeping previous scaling");
            u = u_prev;
            v = v_prev;
            break;
        }
        u = next_u;
        v = next_v;
        if iter % 10 == 0 {
            // Violation of the column marginals.
            let col_marginals = k.tr_mul(&u).component_mul(&v);
            let err = col_marginals.add_scalar(-b).norm();
            if err < stop_threshold {
                break;
            }
        }
    }

    let mut plan = k;
    for i in 0..n {
        for j in 0..m {
            plan[(i, j)] *= u[i] * v[j];
        }
    }
    plan
}

/// Alignment of unpaired point clouds by alternating optimal transport
/// (which point goes where) and orthogonal Procrustes (how to rotate).
#[derive(Debug, Clone)]
pub struct SeedlessProcrustes {
    pub optimal_transport_lambda: f64,
    pub optimal_transport_eps: f64,
    pub optimal_transport_num_reps: usize,
    pub iterative_num_reps: usize,
    pub init: SeedlessInit,
    pub initial_q: Option<DMatrix<f64>>,
    pub initial_p: Option<DMatrix<f64>>,
}

impl Default for SeedlessProcrustes {
    fn default() -> Self {
        Self {
            optimal_transport_lambda: 0.1,
            optimal_transport_eps: 0.01,
            optimal_transport_num_reps: 1000,
            iterative_num_reps: 100,
            init: SeedlessInit::TwoD,
            initial_q: None,
            initial_p: None,
        }
    }
}

/// Result of [`SeedlessProcrustes::fit`].
#[derive(Debug, Clone)]
pub struct SeedlessFit {
    pub q: DMatrix<f64>,
    pub p: DMatrix<f64>,
    pub selected_initial_q: DMatrix<f64>,
    pub objective: f64,
}

impl SeedlessProcrustes {
    pub fn validate(&self) -> Result<(), LdtError> {
        if !(self.optimal_transport_lambda > 0.0) {
            return Err(LdtError::invalid_value(
                "optimal_transport_lambda",
                "must be positive",
            ));
        }
        if !(self.optimal_transport_eps > 0.0) {
            return Err(LdtError::invalid_value(
                "optimal_transport_eps",
                "must be positive",
            ));
        }
        if self.optimal_transport_num_reps == 0 {
            return Err(LdtError::invalid_value(
                "optimal_transport_num_reps",
                "must be positive",
            ));
        }
        Ok(())
    }

    fn optimal_transport(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        q: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let xq = x * q;
        let cost = DMatrix::from_fn(x.nrows(), y.nrows(), |i, j| {
            (xq.row(i) - y.row(j)).norm_squared()
        });
        sinkhorn(
            &cost,
            self.optimal_transport_lambda,
            self.optimal_transport_num_reps,
            self.optimal_transport_eps,
        )
    }

    fn procrustes(
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        p: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, LdtError> {
        OrthogonalProcrustes.fit(x, &(p * y))
    }

    fn iterate(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        mut q: DMatrix<f64>,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>), LdtError> {
        let (n, m) = (x.nrows(), y.nrows());
        let mut p = DMatrix::from_element(n, m, 1.0 / (n * m) as f64);
        for _ in 0..self.iterative_num_reps {
            p = self.optimal_transport(x, y, &q);
            q = Self::procrustes(x, y, &p)?;
        }
        Ok((p, q))
    }

    fn objective(x: &DMatrix<f64>, y: &DMatrix<f64>, q: &DMatrix<f64>, p: &DMatrix<f64>) -> f64 {
        (x * q - p * y).norm()
    }

    pub fn fit(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<SeedlessFit, LdtError> {
        check_same_dims(x, y)?;
        self.validate()?;
        let d = x.ncols();

        let (selected_initial_q, p, q) = match self.init {
            SeedlessInit::TwoD => {
                let starts = 1usize
                    .checked_shl(d as u32)
                    .filter(|_| d <= MAX_TWO_D_COLUMNS)
                    .ok_or_else(|| {
                        LdtError::invalid_value(
                            "init",
                            format!(
                                "\"2d\" supports at most {MAX_TWO_D_COLUMNS} columns, got {d}; \
                                 use \"sign_flips\" or \"custom\""
                            ),
                        )
                    })?;
                let mut best: Option<(f64, DMatrix<f64>, DMatrix<f64>, DMatrix<f64>)> = None;
                for i in 0..starts {
                    let initial = sign_flip_matrix_from_int(i, d);
                    let (p, q) = self.iterate(x, y, initial.clone())?;
                    let obj = Self::objective(x, y, &q, &p);
                    if best.as_ref().is_none_or(|(b, ..)| obj < *b) {
                        best = Some((obj, initial, p, q));
                    }
                }
                let Some((_, initial, p, q)) = best else {
                    return Err(LdtError::invalid_value("embedding", "has no columns"));
                };
                (initial, p, q)
            }
            SeedlessInit::SignFlips => {
                let initial = SignFlips::default().fit(x, y)?;
                let (p, q) = self.iterate(x, y, initial.clone())?;
                (initial, p, q)
            }
            SeedlessInit::Custom => {
                let initial = match (&self.initial_q, &self.initial_p) {
                    (Some(q), _) => {
                        if q.shape() != (d, d) {
                            return Err(LdtError::invalid_value(
                                "initial_Q",
                                format!("must be {d}x{d}, got {}x{}", q.nrows(), q.ncols()),
                            ));
                        }
                        q.clone()
                    }
                    (None, Some(p)) => {
                        if p.shape() != (x.nrows(), y.nrows()) {
                            return Err(LdtError::invalid_value(
                                "initial_P",
                                format!(
                                    "must be {}x{}, got {}x{}",
                                    x.nrows(),
                                    y.nrows(),
                                    p.nrows(),
                                    p.ncols()
                                ),
                            ));
                        }
                        Self::procrustes(x, y, p)?
                    }
                    (None, None) => DMatrix::identity(d, d),
                };
                let (p, q) = self.iterate(x, y, initial.clone())?;
                (initial, p, q)
            }
        };

        let objective = Self::objective(x, y, &q, &p);
        Ok(SeedlessFit {
            q,
            p,
            selected_initial_q,
            objective,
        })
    }

    pub fn fit_transform(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, LdtError> {
        Ok(x * self.fit(x, y)?.q)
    }
}
