pub mod embed;
pub mod simulate;

use latentdist_core::{LatentInput, LdtError};
use nalgebra::DMatrix;
use serde::Serialize;
use serde_json::Value;

/// Print an error and exit non-zero.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

pub fn fail_ldt(err: &LdtError) -> ! {
    fail(format_args!("{} ({})", err, err.kind()))
}

pub fn read_json(path: &str) -> Value {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => fail(format_args!("cannot read {path}: {e}")),
    };
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => fail(format_args!("{path} is not valid JSON: {e}")),
    }
}

pub fn read_input(path: &str) -> LatentInput {
    LatentInput::from_json(&read_json(path))
}

/// Row-major nested arrays.
pub fn matrix_to_json(m: &DMatrix<f64>) -> Value {
    Value::Array(
        m.row_iter()
            .map(|row| row.iter().copied().map(Value::from).collect())
            .collect(),
    )
}

/// Write pretty JSON to `path`, or print it when no path is given.
pub fn emit_json<T: Serialize>(value: &T, path: Option<&str>, label: &str) {
    let text = match serde_json::to_string_pretty(value) {
        Ok(text) => text,
        Err(e) => fail(format_args!("cannot serialize {label}: {e}")),
    };
    match path {
        Some(path) => match std::fs::write(path, text) {
            Ok(()) => println!("{label} written to {path}"),
            Err(e) => fail(format_args!("cannot write {path}: {e}")),
        },
        None => println!("{text}"),
    }
}
