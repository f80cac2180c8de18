//! `gantry check` -- validate a specification directory without serving.
//!
//! Runs the same load path as `serve` (discovery, resolution, contract
//! checks, schema compilation) and prints a per-resource summary. Any
//! load error is fatal, which makes this usable as a CI gate.

use std::error::Error;
use std::path::Path;

use gantry_core::{load_dir, ResolutionPolicy, SchemaValidator};

pub(crate) fn run(spec_dir: &Path, policy: ResolutionPolicy) -> Result<(), Box<dyn Error>> {
    let specs = load_dir(spec_dir, policy)?;
    if specs.is_empty() {
        return Err(format!("no specification files found in {}", spec_dir.display()).into());
    }

    for spec in &specs {
        // Schema compilation failures should surface here, not at serve time.
        for method in ["POST", "PATCH"] {
            if let Some(schema) = spec.request_schema_for(method) {
                SchemaValidator::compile(&spec.name, schema)?;
            }
        }

        println!(
            "{} v{} ({}): {} endpoints, {} schemas",
            spec.name,
            spec.version,
            spec.base_resource_path,
            spec.endpoints.len(),
            spec.schemas.len(),
        );
        if let Some(contract) = &spec.contract {
            println!(
                "  contract: {} states, {} transitions, initial '{}', terminal [{}]",
                contract.states.len(),
                contract.transitions.len(),
                contract.initial_state,
                contract.terminal_states().join(", "),
            );
        }
    }

    println!("{} specification(s) ok", specs.len());
    Ok(())
}
