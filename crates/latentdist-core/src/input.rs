//! Inputs to the latent distribution test: adjacency matrices, edge-list
//! graphs and embeddings.
//!
//! [`LatentInput`] holds whatever a caller hands over: a dense array of any
//! dimensionality, a graph object, or something unsupported such as a string.
//! The driver rejects bad inputs with the matching [`ErrorKind`](crate::ErrorKind).

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LdtError, describe_json};

/// Tolerance for the symmetric check that decides directedness.
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Dense numeric array of arbitrary dimensionality, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl NdArray {
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self, LdtError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(LdtError::invalid_value(
                "array",
                format!(
                    "shape {shape:?} needs {expected} values, got {}",
                    values.len()
                ),
            ));
        }
        Ok(Self { shape, values })
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// View a 2-D array as a matrix.
    pub fn to_matrix(&self) -> Option<DMatrix<f64>> {
        match self.shape.as_slice() {
            &[rows, cols] => Some(DMatrix::from_row_slice(rows, cols, &self.values)),
            _ => None,
        }
    }

    /// Same values, new shape (like `reshape`). `None` if the sizes differ.
    pub fn reshape(&self, shape: Vec<usize>) -> Option<Self> {
        (shape.iter().product::<usize>() == self.values.len()).then(|| Self {
            shape,
            values: self.values.clone(),
        })
    }
}

impl From<&DMatrix<f64>> for NdArray {
    fn from(m: &DMatrix<f64>) -> Self {
        let values = m.transpose().as_slice().to_vec();
        Self {
            shape: vec![m.nrows(), m.ncols()],
            values,
        }
    }
}

/// A graph given as an edge list, the analogue of a graph-library object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeListGraph {
    pub nodes: usize,
    #[serde(default)]
    pub directed: bool,
    /// `(source, target, weight)`; weight defaults to 1 in JSON (`[u, v]`).
    #[serde(deserialize_with = "deserialize_edges")]
    pub edges: Vec<(usize, usize, f64)>,
}

fn deserialize_edges<'de, D>(de: D) -> Result<Vec<(usize, usize, f64)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Edge {
        Weighted(usize, usize, f64),
        Plain(usize, usize),
    }
    let edges = Vec::<Edge>::deserialize(de)?;
    Ok(edges
        .into_iter()
        .map(|e| match e {
            Edge::Weighted(u, v, w) => (u, v, w),
            Edge::Plain(u, v) => (u, v, 1.0),
        })
        .collect())
}

impl EdgeListGraph {
    /// Build a graph from an adjacency matrix; directed when asymmetric.
    pub fn from_adjacency(a: &DMatrix<f64>) -> Self {
        let directed = !is_symmetric(a);
        let mut edges = Vec::new();
        for i in 0..a.nrows() {
            let start = if directed { 0 } else { i };
            for j in start..a.ncols() {
                if a[(i, j)] != 0.0 {
                    edges.push((i, j, a[(i, j)]));
                }
            }
        }
        Self {
            nodes: a.nrows(),
            directed,
            edges,
        }
    }

    pub fn to_adjacency(&self) -> Result<DMatrix<f64>, LdtError> {
        let mut a = DMatrix::zeros(self.nodes, self.nodes);
        for &(u, v, w) in &self.edges {
            if u >= self.nodes || v >= self.nodes {
                return Err(LdtError::invalid_value(
                    "graph",
                    format!("edge ({u}, {v}) refers to a node outside 0..{}", self.nodes),
                ));
            }
            a[(u, v)] = w;
            if !self.directed {
                a[(v, u)] = w;
            }
        }
        Ok(a)
    }
}

/// Anything handed to the test as one of its two samples.
#[derive(Debug, Clone, PartialEq)]
pub enum LatentInput {
    /// Dense numeric array (adjacency matrix or embedding).
    Array(NdArray),
    /// Edge-list graph object.
    Graph(EdgeListGraph),
    /// A value that is neither; carries a description for error messages.
    Unsupported(String),
}

impl From<DMatrix<f64>> for LatentInput {
    fn from(m: DMatrix<f64>) -> Self {
        Self::Array(NdArray::from(&m))
    }
}

impl From<&DMatrix<f64>> for LatentInput {
    fn from(m: &DMatrix<f64>) -> Self {
        Self::Array(NdArray::from(m))
    }
}

impl From<NdArray> for LatentInput {
    fn from(a: NdArray) -> Self {
        Self::Array(a)
    }
}

impl From<EdgeListGraph> for LatentInput {
    fn from(g: EdgeListGraph) -> Self {
        Self::Graph(g)
    }
}

impl From<&str> for LatentInput {
    fn from(s: &str) -> Self {
        Self::Unsupported(format!("string ({s:?})"))
    }
}

impl LatentInput {
    /// Interpret a JSON value.
    ///
    /// Nested numeric arrays become [`LatentInput::Array`]; objects with an
    /// `edges` key become [`LatentInput::Graph`]. Everything else (strings,
    /// scalars, other mappings, ragged or non-numeric arrays) is
    /// [`LatentInput::Unsupported`], rejected later as a type error.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(_) => match json_array(value) {
                Some(array) => Self::Array(array),
                None => Self::Unsupported("ragged or non-numeric array".to_string()),
            },
            Value::Object(map) if map.contains_key("edges") => {
                match serde_json::from_value::<EdgeListGraph>(value.clone()) {
                    Ok(g) => Self::Graph(g),
                    Err(e) => Self::Unsupported(format!("malformed graph object ({e})")),
                }
            }
            other => Self::Unsupported(describe_json(other)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Array(a) => format!("array of shape {:?}", a.shape),
            Self::Graph(g) => format!("graph object with {} nodes", g.nodes),
            Self::Unsupported(what) => what.clone(),
        }
    }
}

/// Flatten nested JSON arrays into a rectangular [`NdArray`].
fn json_array(value: &Value) -> Option<NdArray> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let Value::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }
    let mut values = Vec::with_capacity(shape.iter().product());
    collect_json(value, &shape, &mut values)?;
    Some(NdArray { shape, values })
}

fn collect_json(value: &Value, shape: &[usize], out: &mut Vec<f64>) -> Option<()> {
    match (value, shape.split_first()) {
        (Value::Array(items), Some((&len, rest))) if items.len() == len => {
            for item in items {
                collect_json(item, rest, out)?;
            }
            Some(())
        }
        (Value::Number(n), None) => {
            out.push(n.as_f64()?);
            Some(())
        }
        (Value::Bool(b), None) => {
            out.push(if *b { 1.0 } else { 0.0 });
            Some(())
        }
        _ => None,
    }
}

/// Symmetric within [`SYMMETRY_TOLERANCE`].
pub fn is_symmetric(a: &DMatrix<f64>) -> bool {
    if !a.is_square() {
        return false;
    }
    let n = a.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (a[(i, j)] - a[(j, i)]).abs() > SYMMETRY_TOLERANCE {
                return false;
            }
        }
    }
    true
}

/// A validated adjacency matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjacency {
    pub matrix: DMatrix<f64>,
    pub directed: bool,
}

impl Adjacency {
    pub fn n_nodes(&self) -> usize {
        self.matrix.nrows()
    }
}

/// Resolve an input as a graph: a square 2-D array or a graph object.
pub fn resolve_graph(input: &LatentInput, which: &'static str) -> Result<Adjacency, LdtError> {
    let matrix = match input {
        LatentInput::Array(array) => match array.to_matrix() {
            Some(m) if m.is_square() && m.nrows() > 0 => m,
            _ => {
                return Err(LdtError::invalid_type(
                    which,
                    "a square adjacency matrix or a graph object",
                    input.describe(),
                ));
            }
        },
        LatentInput::Graph(g) => g.to_adjacency()?,
        LatentInput::Unsupported(_) => {
            return Err(LdtError::invalid_type(
                which,
                "a square adjacency matrix or a graph object",
                input.describe(),
            ));
        }
    };
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(LdtError::NonFinite { input: which });
    }
    let directed = !is_symmetric(&matrix);
    Ok(Adjacency { matrix, directed })
}

/// Resolve an input as an `n × d` embedding.
pub fn resolve_embedding(
    input: &LatentInput,
    which: &'static str,
) -> Result<DMatrix<f64>, LdtError> {
    let array = match input {
        LatentInput::Array(array) => array,
        other => {
            return Err(LdtError::invalid_type(
                which,
                "a numeric array (embedding)",
                other.describe(),
            ));
        }
    };
    let Some(matrix) = array.to_matrix() else {
        return Err(LdtError::NotTwoDimensional {
            input: which,
            ndim: array.ndim(),
        });
    };
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(LdtError::invalid_value(
            which,
            format!("embedding of shape {:?} is empty", array.shape),
        ));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(LdtError::NonFinite { input: which });
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_json_matrix() {
        let input = LatentInput::from_json(&json!([[0, 1], [1, 0]]));
        let LatentInput::Array(a) = input else {
            panic!("expected array");
        };
        assert_eq!(a.shape, vec![2, 2]);
        assert_eq!(a.values, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_json_rejects_ragged_and_strings() {
        assert!(matches!(
            LatentInput::from_json(&json!([[0, 1], [1]])),
            LatentInput::Unsupported(_)
        ));
        assert!(matches!(
            LatentInput::from_json(&json!("hello there")),
            LatentInput::Unsupported(_)
        ));
        assert!(matches!(
            LatentInput::from_json(&json!({"hello": "there"})),
            LatentInput::Unsupported(_)
        ));
    }

    #[test]
    fn test_json_graph_object() {
        let input = LatentInput::from_json(&json!({
            "nodes": 3,
            "edges": [[0, 1], [1, 2, 0.5]]
        }));
        let LatentInput::Graph(g) = input else {
            panic!("expected graph");
        };
        let a = g.to_adjacency().unwrap();
        assert_eq!(a[(1, 0)], 1.0);
        assert_eq!(a[(2, 1)], 0.5);
        assert!(is_symmetric(&a));
    }

    #[test]
    fn test_matrix_roundtrip_is_row_major() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let a = NdArray::from(&m);
        assert_eq!(a.values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(a.to_matrix().unwrap(), m);
        assert_eq!(a.reshape(vec![6, 1, 1]).unwrap().ndim(), 3);
        assert!(a.reshape(vec![4]).is_none());
    }

    #[test]
    fn test_resolve_graph_rejects_non_square() {
        let input = LatentInput::from_json(&json!([[1, 2]]));
        let err = resolve_graph(&input, "first").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_resolve_graph_directedness() {
        let sym = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let asym = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        assert!(!resolve_graph(&sym.into(), "first").unwrap().directed);
        assert!(resolve_graph(&asym.into(), "first").unwrap().directed);
    }

    #[test]
    fn test_resolve_embedding_errors() {
        let m = DMatrix::from_element(4, 2, 0.5);
        let three_d = NdArray::from(&m).reshape(vec![8, 1, 1]).unwrap();
        let err = resolve_embedding(&three_d.into(), "first").unwrap_err();
        assert!(matches!(err, LdtError::NotTwoDimensional { ndim: 3, .. }));

        let graph = EdgeListGraph::from_adjacency(&DMatrix::identity(3, 3));
        let err = resolve_embedding(&graph.into(), "second").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);

        let mut inf = m.clone();
        inf[(1, 1)] = f64::INFINITY;
        let err = resolve_embedding(&inf.into(), "first").unwrap_err();
        assert_eq!(err, LdtError::NonFinite { input: "first" });
    }

    #[test]
    fn test_edge_out_of_range() {
        let g = EdgeListGraph {
            nodes: 2,
            directed: false,
            edges: vec![(0, 5, 1.0)],
        };
        assert!(g.to_adjacency().unwrap_err().is_value_error());
    }
}
