//! # latentdist-core
//!
//! **Are two graphs drawn from the same latent position distribution?**
//!
//! `latentdist-core` implements the latent distribution test: both graphs are
//! embedded with adjacency spectral embedding, the first embedding is aligned
//! onto the second, the larger sample is optionally noised to match the
//! smaller one, and a nonparametric two-sample test (from
//! [`latentdist_stats`]) decides whether the two point clouds differ.
//!
//! ## Quick Start
//!
//! ```no_run
//! use latentdist_core::simulations::{GraphOptions, er_np};
//! use latentdist_core::{LdtConfig, latent_distribution_test};
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let a1 = er_np(100, 0.3, GraphOptions::undirected(), &mut rng).unwrap();
//! let a2 = er_np(100, 0.3, GraphOptions::undirected(), &mut rng).unwrap();
//!
//! let config = LdtConfig::new().with_random_state(Some(7));
//! let result = latent_distribution_test(&a1.into(), &a2.into(), &config).unwrap();
//! println!("p = {:.3}", result.p_value);
//! ```
//!
//! ## Architecture
//!
//! Inputs → Embed (ASE) → Align → Size correction → Two-sample test
//!
//! Inputs are loosely typed ([`LatentInput`]) and options can come from a JSON
//! mapping ([`LdtConfig::from_kwargs`]) so that wrong-typed arguments surface
//! as [`ErrorKind::Type`] and bad values as [`ErrorKind::Value`].

pub mod align;
pub mod config;
pub mod correction;
pub mod driver;
pub mod embed;
pub mod error;
pub mod input;
pub mod random;
pub mod simulations;

pub use align::{OrthogonalProcrustes, SeedlessInit, SeedlessProcrustes, SignCriterion, SignFlips};
pub use config::{AlignType, Aligner, LdtConfig, MetricChoice, Workers, pairing_warning};
pub use driver::{LatentDistributionTest, LdtResult, latent_distribution_test};
pub use embed::{AdjacencySpectralEmbed, SpectralEmbedding, select_dimension};
pub use error::{ErrorKind, LdtError};
pub use input::{Adjacency, EdgeListGraph, LatentInput, NdArray};
pub use latentdist_stats::{IndependenceTest, Metric, MetricKind, PairwiseMetric};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
