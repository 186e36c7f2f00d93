//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the achievement API to a file, or with
//! `--check` verifies that a committed copy still matches the handlers.
//!
//! Usage: `openapi [--check] [path]`, path defaulting to `openapi.json`.

use std::process::ExitCode;

use api_lib::web::ApiDoc;
use serde_json::Value;
use utoipa::OpenApi;

const DEFAULT_PATH: &str = "openapi.json";

/// True when `existing` describes a different API than `generated`.
/// Formatting and key order are ignored.
fn is_stale(existing: &str, generated: &str) -> Result<bool, serde_json::Error> {
    let existing: Value = serde_json::from_str(existing)?;
    let generated: Value = serde_json::from_str(generated)?;
    Ok(existing != generated)
}

fn run(check: bool, path: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let generated = ApiDoc::openapi().to_pretty_json()?;

    if !check {
        std::fs::write(path, generated)?;
        println!("OpenAPI document written to {path}");
        return Ok(true);
    }

    let existing = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {path}: {e}"))?;
    if is_stale(&existing, &generated)? {
        eprintln!("{path} is out of date, regenerate it with `cargo run --bin openapi`");
        return Ok(false);
    }
    println!("{path} is up to date");
    Ok(true)
}

fn main() -> ExitCode {
    let mut check = false;
    let mut path = DEFAULT_PATH.to_string();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--check" => check = true,
            _ => path = arg,
        }
    }

    match run(check, &path) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("openapi: {e}");
            ExitCode::FAILURE
        }
    }
}
