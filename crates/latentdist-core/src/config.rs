//! Test configuration.
//!
//! [`LdtConfig`] can be built two ways: with typed builder setters, or from a
//! loosely-typed JSON mapping of keyword options ([`LdtConfig::from_kwargs`]),
//! which is where wrong-typed options become [`ErrorKind::Type`] errors and
//! out-of-range ones [`ErrorKind::Value`] errors.
//!
//! [`ErrorKind::Type`]: crate::ErrorKind::Type
//! [`ErrorKind::Value`]: crate::ErrorKind::Value

use std::sync::Arc;

use latentdist_stats::{IndependenceTest, Metric, MetricKind, PairwiseMetric};
use nalgebra::DMatrix;
use serde_json::{Map, Value};

use crate::align::{SeedlessProcrustes, SignFlips};
use crate::error::{LdtError, describe_json};

/// Option names accepted by [`LdtConfig::from_kwargs`].
pub const OPTION_NAMES: &[&str] = &[
    "test",
    "metric",
    "n_components",
    "n_bootstraps",
    "random_state",
    "workers",
    "size_correction",
    "pooled",
    "align_type",
    "align_kws",
    "input_graph",
];

const SIGN_FLIPS_KWS: &[&str] = &["criterion"];
const SEEDLESS_KWS: &[&str] = &[
    "optimal_transport_lambda",
    "optimal_transport_eps",
    "optimal_transport_num_reps",
    "iterative_num_reps",
    "init",
    "initial_Q",
    "initial_P",
];

// ---------------------------------------------------------------------------
// Option types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignType {
    SignFlips,
    SeedlessProcrustes,
}

impl AlignType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignFlips => "sign_flips",
            Self::SeedlessProcrustes => "seedless_procrustes",
        }
    }

    fn accepted_kws(self) -> &'static [&'static str] {
        match self {
            Self::SignFlips => SIGN_FLIPS_KWS,
            Self::SeedlessProcrustes => SEEDLESS_KWS,
        }
    }
}

impl std::fmt::Display for AlignType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlignType {
    type Err = LdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign_flips" => Ok(Self::SignFlips),
            "seedless_procrustes" => Ok(Self::SeedlessProcrustes),
            other => Err(LdtError::invalid_value(
                "align_type",
                format!("{other:?} is not one of: sign_flips, seedless_procrustes"),
            )),
        }
    }
}

/// Worker threads for the permutation null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workers {
    /// Every available core (`-1`).
    All,
    Threads(usize),
}

impl Default for Workers {
    fn default() -> Self {
        Self::Threads(1)
    }
}

impl Workers {
    /// Concrete thread count, at least 1.
    pub fn resolve(self) -> usize {
        match self {
            Self::All => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Threads(n) => n.max(1),
        }
    }

    fn from_int(n: i64) -> Result<Self, LdtError> {
        match n {
            -1 => Ok(Self::All),
            n if n > 0 => Ok(Self::Threads(n as usize)),
            n => Err(LdtError::invalid_value(
                "workers",
                format!("must be -1 or a positive integer, got {n}"),
            )),
        }
    }
}

/// A built-in metric name or a caller-supplied pairwise metric.
#[derive(Clone)]
pub enum MetricChoice {
    Builtin(Metric),
    Custom(Arc<dyn PairwiseMetric>),
}

impl MetricChoice {
    pub fn as_metric(&self) -> &dyn PairwiseMetric {
        match self {
            Self::Builtin(m) => m,
            Self::Custom(m) => m.as_ref(),
        }
    }

    pub fn name(&self) -> &str {
        self.as_metric().name()
    }
}

impl std::fmt::Debug for MetricChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(m) => write!(f, "Builtin({m})"),
            Self::Custom(m) => write!(f, "Custom({})", m.name()),
        }
    }
}

impl From<Metric> for MetricChoice {
    fn from(m: Metric) -> Self {
        Self::Builtin(m)
    }
}

/// Advice when the metric does not suit the test: a kernel test with a
/// distance, or a distance test with a kernel. Custom metrics without a
/// declared kind and the linear tests never warn.
pub fn pairing_warning(test: IndependenceTest, metric: &MetricChoice) -> Option<String> {
    let expected = test.preferred_metric()?;
    let actual = metric.as_metric().kind()?;
    if expected == actual {
        return None;
    }
    let hint = match expected {
        MetricKind::Kernel => "a kernel such as gaussian or rbf",
        MetricKind::Distance => "a distance such as euclidean",
    };
    Some(format!(
        "{test} is a {expected}-based test but metric {name:?} is a {actual}; consider {hint}",
        name = metric.name()
    ))
}

// ---------------------------------------------------------------------------
// Aligner
// ---------------------------------------------------------------------------

/// An aligner ready to map the first embedding onto the second.
#[derive(Debug, Clone)]
pub enum Aligner {
    SignFlips(SignFlips),
    SeedlessProcrustes(SeedlessProcrustes),
}

impl Aligner {
    /// Build from an alignment type and its keyword options. Unknown keys are
    /// type errors, like unexpected keyword arguments.
    pub fn from_kws(align_type: AlignType, kws: &Map<String, Value>) -> Result<Self, LdtError> {
        let accepted = align_type.accepted_kws();
        if let Some(key) = kws.keys().find(|k| !accepted.contains(&k.as_str())) {
            return Err(LdtError::invalid_type(
                "align_kws",
                format!("only the keys {} for {align_type}", accepted.join(", ")),
                format!("unexpected key {key:?}"),
            ));
        }
        match align_type {
            AlignType::SignFlips => {
                let mut aligner = SignFlips::default();
                if let Some(v) = kws.get("criterion") {
                    aligner.criterion = expect_str("criterion", v)?.parse()?;
                }
                Ok(Self::SignFlips(aligner))
            }
            AlignType::SeedlessProcrustes => {
                let mut aligner = SeedlessProcrustes::default();
                for (key, v) in kws {
                    match key.as_str() {
                        "optimal_transport_lambda" => {
                            aligner.optimal_transport_lambda = expect_positive_f64(key, v)?;
                        }
                        "optimal_transport_eps" => {
                            aligner.optimal_transport_eps = expect_positive_f64(key, v)?;
                        }
                        "optimal_transport_num_reps" => {
                            aligner.optimal_transport_num_reps = expect_positive_int(key, v)?;
                        }
                        "iterative_num_reps" => {
                            aligner.iterative_num_reps = expect_positive_int(key, v)?;
                        }
                        "init" => aligner.init = expect_str(key, v)?.parse()?,
                        "initial_Q" => aligner.initial_q = Some(expect_matrix(key, v)?),
                        "initial_P" => aligner.initial_p = Some(expect_matrix(key, v)?),
                        _ => {}
                    }
                }
                Ok(Self::SeedlessProcrustes(aligner))
            }
        }
    }

    pub fn fit_transform(
        &self,
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, LdtError> {
        match self {
            Self::SignFlips(a) => a.fit_transform(x, y),
            Self::SeedlessProcrustes(a) => a.fit_transform(x, y),
        }
    }
}

// ---------------------------------------------------------------------------
// LdtConfig
// ---------------------------------------------------------------------------

/// Options of the latent distribution test.
#[derive(Debug, Clone)]
pub struct LdtConfig {
    pub test: IndependenceTest,
    pub metric: MetricChoice,
    /// Embedding dimension; selected from the spectra when `None`.
    pub n_components: Option<usize>,
    pub n_bootstraps: usize,
    pub random_state: Option<u64>,
    pub workers: Workers,
    pub size_correction: bool,
    /// Fit the size-correction variance on both samples.
    pub pooled: bool,
    pub align_type: Option<AlignType>,
    pub align_kws: Map<String, Value>,
    /// Inputs are graphs (`true`) or embeddings (`false`).
    pub input_graph: bool,
}

impl Default for LdtConfig {
    fn default() -> Self {
        Self {
            test: IndependenceTest::Dcorr,
            metric: MetricChoice::Builtin(Metric::Euclidean),
            n_components: None,
            n_bootstraps: 500,
            random_state: None,
            workers: Workers::default(),
            size_correction: true,
            pooled: false,
            align_type: Some(AlignType::SignFlips),
            align_kws: Map::new(),
            input_graph: true,
        }
    }
}

impl LdtConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test(mut self, test: IndependenceTest) -> Self {
        self.test = test;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = MetricChoice::Builtin(metric);
        self
    }

    pub fn with_custom_metric(mut self, metric: Arc<dyn PairwiseMetric>) -> Self {
        self.metric = MetricChoice::Custom(metric);
        self
    }

    pub fn with_n_components(mut self, n_components: Option<usize>) -> Self {
        self.n_components = n_components;
        self
    }

    pub fn with_n_bootstraps(mut self, n_bootstraps: usize) -> Self {
        self.n_bootstraps = n_bootstraps;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_workers(mut self, workers: Workers) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_size_correction(mut self, size_correction: bool) -> Self {
        self.size_correction = size_correction;
        self
    }

    pub fn with_pooled(mut self, pooled: bool) -> Self {
        self.pooled = pooled;
        self
    }

    pub fn with_align_type(mut self, align_type: Option<AlignType>) -> Self {
        self.align_type = align_type;
        self
    }

    pub fn with_align_kws(mut self, align_kws: Map<String, Value>) -> Self {
        self.align_kws = align_kws;
        self
    }

    pub fn with_input_graph(mut self, input_graph: bool) -> Self {
        self.input_graph = input_graph;
        self
    }

    /// Defaults overridden by a mapping of keyword options.
    pub fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self, LdtError> {
        let mut config = Self::default();
        config.apply_kwargs(kwargs)?;
        Ok(config)
    }

    pub fn apply_kwargs(&mut self, kwargs: &Map<String, Value>) -> Result<(), LdtError> {
        for (key, value) in kwargs {
            self.apply(key, value)?;
        }
        Ok(())
    }

    /// Set one option from a JSON value.
    pub fn apply(&mut self, key: &str, value: &Value) -> Result<(), LdtError> {
        match key {
            "test" => {
                let name = expect_str(key, value)?;
                self.test = name.parse().map_err(LdtError::Stats)?;
            }
            "metric" => {
                let name = expect_str(key, value)?;
                self.metric = MetricChoice::Builtin(name.parse().map_err(LdtError::Stats)?);
            }
            "n_components" => {
                self.n_components = match value {
                    Value::Null => None,
                    v => Some(expect_positive_int(key, v)?),
                };
            }
            "n_bootstraps" => self.n_bootstraps = expect_positive_int(key, value)?,
            "random_state" => {
                self.random_state = match value {
                    Value::Null => None,
                    v => Some(expect_seed(key, v)?),
                };
            }
            "workers" => self.workers = Workers::from_int(expect_int(key, value)?)?,
            "size_correction" => self.size_correction = expect_bool(key, value)?,
            "pooled" => self.pooled = expect_bool(key, value)?,
            "align_type" => {
                self.align_type = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.parse()?),
                    other => {
                        return Err(LdtError::invalid_type(
                            key,
                            "a string or null",
                            describe_json(other),
                        ));
                    }
                };
            }
            "align_kws" => match value {
                Value::Object(map) => self.align_kws = map.clone(),
                other => {
                    return Err(LdtError::invalid_type(key, "a mapping", describe_json(other)));
                }
            },
            "input_graph" => self.input_graph = expect_bool(key, value)?,
            other => {
                return Err(LdtError::invalid_type(
                    "keyword",
                    format!("one of {}", OPTION_NAMES.join(", ")),
                    format!("unexpected keyword {other:?}"),
                ));
            }
        }
        Ok(())
    }

    /// Range checks for options set through the typed setters, and the
    /// alignment options against the chosen aligner.
    pub fn validate(&self) -> Result<(), LdtError> {
        if self.n_components == Some(0) {
            return Err(LdtError::invalid_value("n_components", "must be positive"));
        }
        if self.n_bootstraps == 0 {
            return Err(LdtError::invalid_value("n_bootstraps", "must be positive"));
        }
        if self.workers == Workers::Threads(0) {
            return Err(LdtError::invalid_value(
                "workers",
                "must be -1 or a positive integer",
            ));
        }
        self.aligner()?;
        Ok(())
    }

    /// The configured aligner, if any. Options given without an alignment
    /// type are ignored.
    pub fn aligner(&self) -> Result<Option<Aligner>, LdtError> {
        match self.align_type {
            Some(t) => Aligner::from_kws(t, &self.align_kws).map(Some),
            None => Ok(None),
        }
    }

    pub fn pairing_warning(&self) -> Option<String> {
        pairing_warning(self.test, &self.metric)
    }
}

// ---------------------------------------------------------------------------
// JSON value classification
// ---------------------------------------------------------------------------

fn expect_str<'a>(param: &str, value: &'a Value) -> Result<&'a str, LdtError> {
    value
        .as_str()
        .ok_or_else(|| LdtError::invalid_type(param, "a string", describe_json(value)))
}

fn expect_bool(param: &str, value: &Value) -> Result<bool, LdtError> {
    value
        .as_bool()
        .ok_or_else(|| LdtError::invalid_type(param, "a bool", describe_json(value)))
}

fn expect_int(param: &str, value: &Value) -> Result<i64, LdtError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.is_u64() {
                Err(LdtError::invalid_value(param, format!("{n} is too large")))
            } else {
                Err(LdtError::invalid_type(param, "an int", describe_json(value)))
            }
        }
        other => Err(LdtError::invalid_type(param, "an int", describe_json(other))),
    }
}

fn expect_positive_int(param: &str, value: &Value) -> Result<usize, LdtError> {
    let n = expect_int(param, value)?;
    if n < 1 {
        return Err(LdtError::invalid_value(
            param,
            format!("must be a positive integer, got {n}"),
        ));
    }
    Ok(n as usize)
}

fn expect_seed(param: &str, value: &Value) -> Result<u64, LdtError> {
    if let Some(seed) = value.as_u64() {
        return Ok(seed);
    }
    let n = expect_int(param, value)?;
    Err(LdtError::invalid_value(
        param,
        format!("must be a non-negative integer, got {n}"),
    ))
}

fn expect_positive_f64(param: &str, value: &Value) -> Result<f64, LdtError> {
    let v = value
        .as_f64()
        .ok_or_else(|| LdtError::invalid_type(param, "a number", describe_json(value)))?;
    if !(v > 0.0) || !v.is_finite() {
        return Err(LdtError::invalid_value(
            param,
            format!("must be a positive number, got {v}"),
        ));
    }
    Ok(v)
}

fn expect_matrix(param: &str, value: &Value) -> Result<DMatrix<f64>, LdtError> {
    let bad = || LdtError::invalid_type(param, "a 2-D numeric array", describe_json(value));
    let rows = value.as_array().ok_or_else(bad)?;
    let ncols = rows.first().and_then(Value::as_array).map_or(0, Vec::len);
    let mut values = Vec::with_capacity(rows.len() * ncols);
    for row in rows {
        let row = row.as_array().filter(|r| r.len() == ncols).ok_or_else(bad)?;
        for v in row {
            values.push(v.as_f64().ok_or_else(bad)?);
        }
    }
    Ok(DMatrix::from_row_slice(rows.len(), ncols, &values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn kind_of(key: &str, value: Value) -> ErrorKind {
        let mut kwargs = Map::new();
        kwargs.insert(key.to_string(), value);
        LdtConfig::from_kwargs(&kwargs)
            .and_then(|c| c.validate())
            .expect_err(&format!("{key} should be rejected"))
            .kind()
    }

    #[test]
    fn test_defaults() {
        let c = LdtConfig::default();
        assert_eq!(c.test, IndependenceTest::Dcorr);
        assert_eq!(c.metric.name(), "euclidean");
        assert_eq!(c.n_bootstraps, 500);
        assert_eq!(c.workers, Workers::Threads(1));
        assert!(c.size_correction && !c.pooled && c.input_graph);
        assert_eq!(c.align_type, Some(AlignType::SignFlips));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_bad_kwargs_classification() {
        assert_eq!(kind_of("test", json!(0)), ErrorKind::Type);
        assert_eq!(kind_of("test", json!("foo")), ErrorKind::Value);
        assert_eq!(kind_of("metric", json!(0)), ErrorKind::Type);
        assert_eq!(kind_of("metric", json!("some_kind_of_kernel")), ErrorKind::Value);
        assert_eq!(kind_of("n_components", json!(0.5)), ErrorKind::Type);
        assert_eq!(kind_of("n_components", json!(-100)), ErrorKind::Value);
        assert_eq!(kind_of("n_bootstraps", json!(0.5)), ErrorKind::Type);
        assert_eq!(kind_of("n_bootstraps", json!(-100)), ErrorKind::Value);
        assert_eq!(kind_of("workers", json!(0.5)), ErrorKind::Type);
        assert_eq!(kind_of("workers", json!(0)), ErrorKind::Value);
        assert_eq!(kind_of("size_correction", json!(0)), ErrorKind::Type);
        assert_eq!(kind_of("pooled", json!(0)), ErrorKind::Type);
        assert_eq!(kind_of("align_type", json!("foo")), ErrorKind::Value);
        assert_eq!(kind_of("align_type", json!({"not a": "string"})), ErrorKind::Type);
        assert_eq!(kind_of("align_kws", json!("foo")), ErrorKind::Type);
        assert_eq!(kind_of("align_kws", Value::Null), ErrorKind::Type);
        assert_eq!(kind_of("input_graph", json!("hello")), ErrorKind::Type);
        assert_eq!(kind_of("random_state", json!(-1)), ErrorKind::Value);
        assert_eq!(kind_of("random_state", json!("seed")), ErrorKind::Type);
        assert_eq!(kind_of("no_such_option", json!(1)), ErrorKind::Type);
    }

    #[test]
    fn test_kwargs_applied() {
        let kwargs = json!({
            "test": "HSIC",
            "metric": "rbf",
            "n_components": 3,
            "n_bootstraps": 123,
            "random_state": 7,
            "workers": -1,
            "align_type": null,
        });
        let c = LdtConfig::from_kwargs(kwargs.as_object().unwrap()).unwrap();
        assert_eq!(c.test, IndependenceTest::Hsic);
        assert_eq!(c.metric.name(), "rbf");
        assert_eq!(c.n_components, Some(3));
        assert_eq!(c.n_bootstraps, 123);
        assert_eq!(c.random_state, Some(7));
        assert_eq!(c.workers, Workers::All);
        assert!(c.workers.resolve() >= 1);
        assert_eq!(c.align_type, None);
    }

    #[test]
    fn test_align_kws_checked_against_aligner() {
        let c = LdtConfig::new()
            .with_align_type(Some(AlignType::SeedlessProcrustes))
            .with_align_kws(json!({"init": "sign_flips"}).as_object().unwrap().clone());
        let Some(Aligner::SeedlessProcrustes(a)) = c.aligner().unwrap() else {
            panic!("expected seedless procrustes");
        };
        assert_eq!(a.init, crate::align::SeedlessInit::SignFlips);

        let c = c.with_align_type(Some(AlignType::SignFlips));
        assert_eq!(c.validate().unwrap_err().kind(), ErrorKind::Type);

        let c = LdtConfig::new()
            .with_align_type(Some(AlignType::SeedlessProcrustes))
            .with_align_kws(json!({"optimal_transport_lambda": -1.0}).as_object().unwrap().clone());
        assert_eq!(c.validate().unwrap_err().kind(), ErrorKind::Value);

        let c = LdtConfig::new()
            .with_align_type(Some(AlignType::SeedlessProcrustes))
            .with_align_kws(json!({"initial_Q": [[1, 0], [0]]}).as_object().unwrap().clone());
        assert_eq!(c.validate().unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn test_pairing_warnings() {
        let warn = |test, metric| pairing_warning(test, &MetricChoice::Builtin(metric));
        assert!(warn(IndependenceTest::Hsic, Metric::Euclidean).is_some());
        assert!(warn(IndependenceTest::Dcorr, Metric::Gaussian).is_some());
        assert!(warn(IndependenceTest::Dcorr, Metric::Rbf).is_some());
        assert!(warn(IndependenceTest::Hsic, Metric::Cosine).is_some());
        assert!(warn(IndependenceTest::Hsic, Metric::Rbf).is_none());
        assert!(warn(IndependenceTest::Dcorr, Metric::Cosine).is_none());
        assert!(warn(IndependenceTest::Rv, Metric::Gaussian).is_none());
        assert!(warn(IndependenceTest::Cca, Metric::Euclidean).is_none());
    }

    #[test]
    fn test_typed_setters_validated() {
        assert!(LdtConfig::new().with_n_bootstraps(0).validate().unwrap_err().is_value_error());
        assert!(
            LdtConfig::new()
                .with_n_components(Some(0))
                .validate()
                .unwrap_err()
                .is_value_error()
        );
        assert!(
            LdtConfig::new()
                .with_workers(Workers::Threads(0))
                .validate()
                .unwrap_err()
                .is_value_error()
        );
    }
}
