//! CLI for latentdist: are two graphs drawn from the same latent distribution?

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "latentdist")]
#[command(about = "latentdist: two-sample testing of random graphs in latent space")]
#[command(version = latentdist_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the latent distribution test on two graphs (or two embeddings).
    /// Inputs are JSON files holding a numeric matrix or an edge-list graph
    /// object ({"nodes": n, "directed": false, "edges": [[u, v], [u, v, w]]}).
    Test {
        /// First graph or embedding
        first: String,

        /// Second graph or embedding
        second: String,

        /// JSON file of options ({"test": "hsic", "n_bootstraps": 200, ...}); flags override it
        #[arg(long)]
        config: Option<String>,

        /// Test statistic: cca, dcorr, hsic, rv
        #[arg(long)]
        test: Option<String>,

        /// Distance or kernel: euclidean, cosine, gaussian, rbf, ...
        #[arg(long)]
        metric: Option<String>,

        /// Embedding dimension (selected automatically when omitted)
        #[arg(long)]
        n_components: Option<i64>,

        /// Number of permutations for the null distribution
        #[arg(long)]
        n_bootstraps: Option<i64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads for the permutations; -1 for all cores
        #[arg(long, allow_hyphen_values = true)]
        workers: Option<i64>,

        /// Skip the noise correction for different node counts
        #[arg(long)]
        no_size_correction: bool,

        /// Fit the size-correction variance on both samples
        #[arg(long)]
        pooled: bool,

        /// Alignment: sign_flips, seedless_procrustes, or none
        #[arg(long)]
        align_type: Option<String>,

        /// Inputs are embeddings rather than graphs
        #[arg(long)]
        embeddings: bool,

        /// Write the result as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Sample a random graph and write its adjacency matrix as JSON
    Simulate {
        #[command(subcommand)]
        model: SimulateModel,
    },

    /// Adjacency spectral embedding of a graph
    Embed {
        /// Graph JSON file
        graph: String,

        /// Embedding dimension (selected automatically when omitted)
        #[arg(long)]
        n_components: Option<usize>,

        /// Keep the diagonal as given instead of filling it with scaled degrees
        #[arg(long)]
        no_diag_aug: bool,

        /// Random seed for the randomized SVD
        #[arg(long)]
        seed: Option<u64>,

        /// Write the embedding as JSON
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
enum SimulateModel {
    /// Erdős–Rényi G(n, p)
    Er {
        #[arg(long)]
        n: usize,

        #[arg(long)]
        p: f64,

        #[command(flatten)]
        common: commands::simulate::CommonArgs,
    },

    /// Erdős–Rényi G(n, m) with exactly m edges
    ErNm {
        #[arg(long)]
        n: usize,

        #[arg(long)]
        m: usize,

        #[command(flatten)]
        common: commands::simulate::CommonArgs,
    },

    /// Stochastic block model
    Sbm {
        /// Comma-separated block sizes, e.g. 50,50
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<usize>,

        /// Block probabilities, rows separated by ';', e.g. "0.5,0.2;0.2,0.5"
        #[arg(long)]
        probs: String,

        #[command(flatten)]
        common: commands::simulate::CommonArgs,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Test {
            first,
            second,
            config,
            test,
            metric,
            n_components,
            n_bootstraps,
            seed,
            workers,
            no_size_correction,
            pooled,
            align_type,
            embeddings,
            output,
        } => commands::test::run(commands::test::TestCommandConfig {
            first: &first,
            second: &second,
            config_path: config.as_deref(),
            test: test.as_deref(),
            metric: metric.as_deref(),
            n_components,
            n_bootstraps,
            seed,
            workers,
            no_size_correction,
            pooled,
            align_type: align_type.as_deref(),
            embeddings,
            output_path: output.as_deref(),
        }),
        Commands::Simulate { model } => match model {
            SimulateModel::Er { n, p, common } => {
                commands::simulate::run(commands::simulate::Model::ErNp { n, p }, &common)
            }
            SimulateModel::ErNm { n, m, common } => {
                commands::simulate::run(commands::simulate::Model::ErNm { n, m }, &common)
            }
            SimulateModel::Sbm {
                sizes,
                probs,
                common,
            } => commands::simulate::run(commands::simulate::Model::Sbm { sizes, probs }, &common),
        },
        Commands::Embed {
            graph,
            n_components,
            no_diag_aug,
            seed,
            output,
        } => commands::embed::run(commands::embed::EmbedCommandConfig {
            graph_path: &graph,
            n_components,
            diag_aug: !no_diag_aug,
            seed,
            output_path: output.as_deref(),
        }),
    }
}
