// pipeline.rs — Compilation driver
//
// Picks the codec for an input syntax, parses into the Graph IR, and
// renders any output form from it. Records provenance for every
// compilation so exported workflows can be traced to their source.
//
// Preconditions: the registry is loaded.
// Postconditions: `compile` returns a graph built by exactly one codec;
//                 `emit` never mutates the graph.
// Failure modes: codec diagnostics pass through; JSON exports of graphs
//                that fail validation → `Diagnostic`.
// Side effects: none.

use std::fmt::Write;
use std::time::Instant;

use serde_json::{json, Value};

use crate::diag::Diagnostic;
use crate::error::GraphError;
use crate::graph::CompiledGraph;
use crate::registry::Registry;
use crate::{dot, export, markdown, natural, sequential, staged};

const TRACING_TARGET: &str = "flowc::pipeline";

/// Key under the workflow's `extra` object that carries provenance.
pub const PROVENANCE_KEY: &str = "flowc";

// ── Forms ──

/// Input syntaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Syntax {
    Sequential,
    Staged,
    Markdown,
    Natural,
    /// Workflow JSON.
    Workflow,
}

/// Output forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Emit {
    Sequential,
    Staged,
    Markdown,
    Natural,
    Workflow,
    /// Engine API prompt JSON.
    Prompt,
    Dot,
    /// Graph IR dump.
    Graph,
    /// Provenance JSON.
    BuildInfo,
}

// ── Provenance ──

/// Provenance metadata for caching and traceability.
///
/// `source_hash`: SHA-256 of the raw source text.
/// `registry_fingerprint`: SHA-256 of `Registry::canonical_json()`.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub registry_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the registry fingerprint (64 characters).
    pub fn registry_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.registry_fingerprint)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "source_hash": self.source_hash_hex(),
            "registry_fingerprint": self.registry_fingerprint_hex(),
            "compiler_version": self.compiler_version,
        })
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        write!(s, "{b:02x}").unwrap();
    }
    s
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from source text and registry.
pub fn compute_provenance(source: &str, registry: &Registry) -> Provenance {
    Provenance {
        source_hash: sha256(source.as_bytes()),
        registry_fingerprint: sha256(registry.canonical_json().as_bytes()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Driver ──

/// A compiled graph and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub graph: CompiledGraph,
    pub provenance: Provenance,
}

/// Parse `source` in `syntax` into the Graph IR.
pub fn compile(source: &str, syntax: Syntax, registry: &Registry) -> Result<Compiled, Diagnostic> {
    let start = Instant::now();
    let graph = match syntax {
        Syntax::Sequential => sequential::parse(source, registry)?,
        Syntax::Staged => staged::parse(source, registry)?,
        Syntax::Markdown => markdown::parse(source, registry)?,
        Syntax::Natural => natural::parse(source, registry)?,
        Syntax::Workflow => export::from_workflow_json(source, registry)?,
    };
    tracing::debug!(
        target: TRACING_TARGET,
        syntax = ?syntax,
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Compiled"
    );
    Ok(Compiled {
        graph,
        provenance: compute_provenance(source, registry),
    })
}

/// Render a compiled graph in `form`.
pub fn emit(compiled: &Compiled, form: Emit) -> Result<String, Diagnostic> {
    let graph = &compiled.graph;
    let out = match form {
        Emit::Sequential => sequential::serialize(graph)?,
        Emit::Staged => staged::serialize(graph)?,
        Emit::Markdown => markdown::serialize(graph),
        Emit::Natural => natural::serialize(graph)?,
        Emit::Workflow => {
            graph.validate()?;
            let mut workflow = export::to_workflow_json(graph);
            workflow
                .extra
                .insert(PROVENANCE_KEY.to_string(), compiled.provenance.to_json());
            to_json_text(&workflow)?
        }
        Emit::Prompt => {
            graph.validate()?;
            to_json_text(&export::to_api_prompt(graph))?
        }
        Emit::Dot => dot::emit_dot(graph),
        Emit::Graph => graph.to_string(),
        Emit::BuildInfo => to_json_text(&compiled.provenance.to_json())?,
    };
    tracing::debug!(target: TRACING_TARGET, form = ?form, bytes = out.len(), "Emitted");
    Ok(out)
}

/// Compile and emit in one step.
pub fn convert(source: &str, from: Syntax, to: Emit, registry: &Registry) -> Result<String, Diagnostic> {
    emit(&compile(source, from, registry)?, to)
}

fn to_json_text(value: &impl serde::Serialize) -> Result<String, Diagnostic> {
    serde_json::to_string_pretty(value)
        .map(|mut text| {
            text.push('\n');
            text
        })
        .map_err(|e| Diagnostic::new(GraphError::InvalidGraph(format!("cannot encode JSON: {e}"))))
}

// ── Tests ───────────────────────────────────────────────────────────────────
