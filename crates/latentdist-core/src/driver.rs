//! The latent distribution test.
//!
//! Two graphs (or two embeddings) are compared by embedding both into a common
//! latent space, aligning the first embedding onto the second, optionally
//! correcting for different node counts, and running a nonparametric
//! two-sample test on the rows.

use latentdist_stats::{PermutationTest, two_sample_test};
use nalgebra::DMatrix;
use rand::Rng;
use serde::Serialize;

use crate::config::{Aligner, LdtConfig};
use crate::correction::sample_modified_ase;
use crate::embed::{AdjacencySpectralEmbed, estimate_dimension};
use crate::error::LdtError;
use crate::input::{LatentInput, resolve_embedding, resolve_graph};
use crate::random::rng_from_seed;

/// Elbows used when selecting the embedding dimension.
const N_ELBOWS: usize = 2;

/// Outcome of a latent distribution test.
#[derive(Debug, Clone, Serialize)]
pub struct LdtResult {
    pub p_value: f64,
    pub statistic: f64,
    pub null_distribution: Vec<f64>,
    /// Embedding dimension per side (directed graphs embed to twice as many
    /// columns).
    pub n_components: usize,
    pub test: String,
    pub metric: String,
    /// Advisory messages, also emitted through `log::warn!`.
    pub warnings: Vec<String>,
}

/// A validated test, reusable across input pairs.
#[derive(Debug, Clone)]
pub struct LatentDistributionTest {
    config: LdtConfig,
    aligner: Option<Aligner>,
    workers: usize,
}

impl LatentDistributionTest {
    pub fn new(config: LdtConfig) -> Result<Self, LdtError> {
        config.validate()?;
        let aligner = config.aligner()?;
        let workers = config.workers.resolve();
        Ok(Self {
            config,
            aligner,
            workers,
        })
    }

    pub fn config(&self) -> &LdtConfig {
        &self.config
    }

    pub fn run(&self, first: &LatentInput, second: &LatentInput) -> Result<LdtResult, LdtError> {
        let config = &self.config;
        let mut warnings = Vec::new();
        if let Some(w) = config.pairing_warning() {
            log::warn!("{w}");
            warnings.push(w);
        }
        if config.align_type.is_none() && !config.align_kws.is_empty() {
            let w = "align_kws given without align_type; ignoring them".to_string();
            log::warn!("{w}");
            warnings.push(w);
        }

        let mut rng = rng_from_seed(config.random_state);

        let (x1, x2, n_components) = if config.input_graph {
            self.embed_graphs(first, second, &mut rng)?
        } else {
            let x1 = resolve_embedding(first, "first")?;
            let x2 = resolve_embedding(second, "second")?;
            let d = x1.ncols();
            (x1, x2, d)
        };
        if x1.ncols() != x2.ncols() {
            return Err(LdtError::DimensionMismatch {
                left: x1.ncols(),
                right: x2.ncols(),
            });
        }

        let x1 = match &self.aligner {
            Some(aligner) => aligner.fit_transform(&x1, &x2)?,
            None => x1,
        };

        let (x1, x2) = if config.size_correction {
            sample_modified_ase(&x1, &x2, config.pooled, &mut rng)?
        } else {
            (x1, x2)
        };

        let permutation = PermutationTest::new(config.test, config.n_bootstraps)
            .with_workers(self.workers)
            .with_seed(Some(rng.random()));
        let outcome = two_sample_test(&x1, &x2, config.metric.as_metric(), &permutation)?;
        log::debug!(
            "latent distribution test: {} / {}, statistic {:.6}, p = {:.4}",
            config.test,
            config.metric.name(),
            outcome.statistic,
            outcome.p_value
        );

        Ok(LdtResult {
            p_value: outcome.p_value,
            statistic: outcome.statistic,
            null_distribution: outcome.null_distribution,
            n_components,
            test: config.test.to_string(),
            metric: config.metric.name().to_string(),
            warnings,
        })
    }

    fn embed_graphs<R: Rng + ?Sized>(
        &self,
        first: &LatentInput,
        second: &LatentInput,
        rng: &mut R,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>, usize), LdtError> {
        let a1 = resolve_graph(first, "first")?;
        let a2 = resolve_graph(second, "second")?;
        if a1.directed != a2.directed {
            return Err(LdtError::DirectednessMismatch);
        }

        let n_components = match self.config.n_components {
            Some(k) => k,
            None => {
                let d1 = estimate_dimension(&a1.matrix, N_ELBOWS, rng)?;
                let d2 = estimate_dimension(&a2.matrix, N_ELBOWS, rng)?;
                log::debug!("selected dimensions {d1} and {d2}; using {}", d1.max(d2));
                d1.max(d2)
            }
        };

        let ase = AdjacencySpectralEmbed::new(Some(n_components));
        let x1 = ase.fit_transform(&a1, rng)?.concatenated();
        let x2 = ase.fit_transform(&a2, rng)?.concatenated();
        Ok((x1, x2, n_components))
    }
}

/// One-shot form of [`LatentDistributionTest`].
pub fn latent_distribution_test(
    first: &LatentInput,
    second: &LatentInput,
    config: &LdtConfig,
) -> Result<LdtResult, LdtError> {
    LatentDistributionTest::new(config.clone())?.run(first, second)
}
