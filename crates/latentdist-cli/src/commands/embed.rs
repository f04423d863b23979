use latentdist_core::AdjacencySpectralEmbed;
use latentdist_core::input::resolve_graph;
use latentdist_core::random::rng_from_seed;
use serde_json::json;

pub struct EmbedCommandConfig<'a> {
    pub graph_path: &'a str,
    pub n_components: Option<usize>,
    pub diag_aug: bool,
    pub seed: Option<u64>,
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: EmbedCommandConfig<'_>) {
    if cfg.n_components == Some(0) {
        super::fail("n_components must be positive");
    }
    let input = super::read_input(cfg.graph_path);
    let graph = resolve_graph(&input, "graph").unwrap_or_else(|e| super::fail_ldt(&e));

    let ase = AdjacencySpectralEmbed {
        diag_aug: cfg.diag_aug,
        ..AdjacencySpectralEmbed::new(cfg.n_components)
    };
    let mut rng = rng_from_seed(cfg.seed);
    let embedding = ase
        .fit_transform(&graph, &mut rng)
        .unwrap_or_else(|e| super::fail_ldt(&e));

    let report = json!({
        "n_nodes": graph.n_nodes(),
        "directed": graph.directed,
        "n_components": embedding.left.ncols(),
        "singular_values": embedding.singular_values,
        "embedding": super::matrix_to_json(&embedding.concatenated()),
    });
    super::emit_json(&report, cfg.output_path, "Embedding");
}
