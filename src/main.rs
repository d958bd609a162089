//! form-cascade
//!
//! Evaluates the cascade rules of a schema document against a set of form
//! values and preloads its independent data sources.
//!
//! Usage: `form-cascade <schema.json> [values.json]`
//!
//! Prints `{"cascade": <state>, "sources": {<id>: <state>}}` to stdout.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::info;

use form_cascade::datasource::{DataSourceRegistry, FormContext, HttpTransport};
use form_cascade::{telemetry, CascadeEngine, EngineConfig, FormConfig};

const BASE_URL_VAR: &str = "FORM_CASCADE_BASE_URL";

fn read_values(path: Option<&str>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(json!({}));
    };
    let content = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("reading form values from {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing form values in {}", path))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    if let Err(e) = telemetry::init_tracing() {
        eprintln!("tracing already initialised: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(schema_path) = args.first() else {
        bail!("usage: form-cascade <schema.json> [values.json]");
    };

    let config = EngineConfig::from_env().context("reading engine configuration")?;
    let form = FormConfig::from_file(schema_path)
        .with_context(|| format!("loading schema {}", schema_path))?;
    let values = read_values(args.get(1).map(String::as_str))?;

    let engine = CascadeEngine::new(form.rules);
    let cascade = engine.evaluate(&values);

    let mut transport = HttpTransport::new();
    if let Ok(base_url) = std::env::var(BASE_URL_VAR) {
        transport = transport.with_base_url(base_url);
    }
    let registry = DataSourceRegistry::with_config(
        form.sources,
        FormContext::new(values),
        Arc::new(transport),
        config,
    );
    registry.preload_all().await;

    let sources: BTreeMap<&str, _> = registry
        .source_ids()
        .into_iter()
        .map(|id| (id, registry.get_state(id)))
        .collect();
    info!("Evaluated {} rules over {} sources", engine.rules().len(), sources.len());

    let output = json!({ "cascade": cascade, "sources": sources });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
