//! Random graph simulators: Erdős–Rényi and stochastic block models.
//!
//! All simulators return dense adjacency matrices. Undirected graphs are
//! symmetric; without `loops` the diagonal is zero.

use nalgebra::DMatrix;
use rand::Rng;
use rand::seq::index;

use crate::error::LdtError;

/// Directedness and self-loop options shared by the simulators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphOptions {
    pub directed: bool,
    pub loops: bool,
}

impl GraphOptions {
    pub fn undirected() -> Self {
        Self::default()
    }

    pub fn directed() -> Self {
        Self {
            directed: true,
            loops: false,
        }
    }
}

/// Candidate `(i, j)` positions for an edge under `opts`.
fn candidate_pairs(n: usize, opts: GraphOptions) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..n {
        let start = if opts.directed { 0 } else { i };
        for j in start..n {
            if i == j && !opts.loops {
                continue;
            }
            pairs.push((i, j));
        }
    }
    pairs
}

fn set_edge(a: &mut DMatrix<f64>, i: usize, j: usize, directed: bool) {
    a[(i, j)] = 1.0;
    if !directed {
        a[(j, i)] = 1.0;
    }
}

fn check_probability(param: &str, p: f64) -> Result<(), LdtError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(LdtError::invalid_value(
            param,
            format!("probability must be in [0, 1], got {p}"),
        ));
    }
    Ok(())
}

/// G(n, p): every candidate edge is present independently with probability `p`.
pub fn er_np<R: Rng + ?Sized>(
    n: usize,
    p: f64,
    opts: GraphOptions,
    rng: &mut R,
) -> Result<DMatrix<f64>, LdtError> {
    check_probability("p", p)?;
    let mut a = DMatrix::zeros(n, n);
    for (i, j) in candidate_pairs(n, opts) {
        if rng.random::<f64>() < p {
            set_edge(&mut a, i, j, opts.directed);
        }
    }
    Ok(a)
}

/// G(n, m): exactly `m` edges chosen uniformly among the candidates.
pub fn er_nm<R: Rng + ?Sized>(
    n: usize,
    m: usize,
    opts: GraphOptions,
    rng: &mut R,
) -> Result<DMatrix<f64>, LdtError> {
    let pairs = candidate_pairs(n, opts);
    if m > pairs.len() {
        return Err(LdtError::invalid_value(
            "m",
            format!("{m} edges requested but only {} are possible", pairs.len()),
        ));
    }
    let mut a = DMatrix::zeros(n, n);
    for k in index::sample(rng, pairs.len(), m) {
        let (i, j) = pairs[k];
        set_edge(&mut a, i, j, opts.directed);
    }
    Ok(a)
}

/// Stochastic block model with `block_sizes[k]` nodes in block `k` and edge
/// probability `block_probs[(k, l)]` between blocks `k` and `l`.
///
/// Undirected graphs require a symmetric probability matrix.
pub fn sbm<R: Rng + ?Sized>(
    block_sizes: &[usize],
    block_probs: &DMatrix<f64>,
    opts: GraphOptions,
    rng: &mut R,
) -> Result<DMatrix<f64>, LdtError> {
    let k = block_sizes.len();
    if block_probs.nrows() != k || block_probs.ncols() != k {
        return Err(LdtError::invalid_value(
            "block_probs",
            format!(
                "expected a {k}x{k} matrix, got {}x{}",
                block_probs.nrows(),
                block_probs.ncols()
            ),
        ));
    }
    for &p in block_probs.iter() {
        check_probability("block_probs", p)?;
    }
    if !opts.directed && !crate::input::is_symmetric(block_probs) {
        return Err(LdtError::invalid_value(
            "block_probs",
            "undirected block models need a symmetric probability matrix",
        ));
    }

    let labels: Vec<usize> = block_sizes
        .iter()
        .enumerate()
        .flat_map(|(b, &size)| std::iter::repeat_n(b, size))
        .collect();
    let n = labels.len();
    let mut a = DMatrix::zeros(n, n);
    for (i, j) in candidate_pairs(n, opts) {
        if rng.random::<f64>() < block_probs[(labels[i], labels[j])] {
            set_edge(&mut a, i, j, opts.directed);
        }
    }
    Ok(a)
}
