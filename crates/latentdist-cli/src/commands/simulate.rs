use clap::Args;
use latentdist_core::random::rng_from_seed;
use latentdist_core::simulations::{GraphOptions, er_nm, er_np, sbm};
use nalgebra::DMatrix;

#[derive(Args)]
pub struct CommonArgs {
    /// Directed graph
    #[arg(long)]
    pub directed: bool,

    /// Allow self-loops
    #[arg(long)]
    pub loops: bool,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the adjacency matrix as JSON
    #[arg(long)]
    pub output: Option<String>,
}

pub enum Model {
    ErNp { n: usize, p: f64 },
    ErNm { n: usize, m: usize },
    Sbm { sizes: Vec<usize>, probs: String },
}

/// Parse "0.5,0.2;0.2,0.5" into a square matrix.
fn parse_probs(text: &str) -> Result<DMatrix<f64>, String> {
    let rows: Vec<Vec<f64>> = text
        .split(';')
        .map(|row| {
            row.split(',')
                .map(|v| {
                    v.trim()
                        .parse::<f64>()
                        .map_err(|e| format!("bad probability {v:?}: {e}"))
                })
                .collect()
        })
        .collect::<Result<_, _>>()?;
    let k = rows.len();
    if rows.iter().any(|r| r.len() != k) {
        return Err(format!("block probabilities must form a {k}x{k} matrix"));
    }
    Ok(DMatrix::from_fn(k, k, |i, j| rows[i][j]))
}

pub fn run(model: Model, common: &CommonArgs) {
    let opts = GraphOptions {
        directed: common.directed,
        loops: common.loops,
    };
    let mut rng = rng_from_seed(common.seed);
    let graph = match model {
        Model::ErNp { n, p } => er_np(n, p, opts, &mut rng),
        Model::ErNm { n, m } => er_nm(n, m, opts, &mut rng),
        Model::Sbm { sizes, probs } => {
            let probs = parse_probs(&probs).unwrap_or_else(|e| super::fail(e));
            sbm(&sizes, &probs, opts, &mut rng)
        }
    }
    .unwrap_or_else(|e| super::fail_ldt(&e));

    super::emit_json(&super::matrix_to_json(&graph), common.output.as_deref(), "Graph");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probs() {
        let m = parse_probs("0.5,0.2;0.2,0.5").unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m[(0, 1)], 0.2);
        assert!(parse_probs("0.5,0.2;0.2").is_err());
        assert!(parse_probs("a,b;c,d").is_err());
    }
}
