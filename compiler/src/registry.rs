// registry.rs — Node template registry
//
// Read-only lookup from node-type name to its port/parameter schema.
// Templates are JSON records, one per node type, loaded from a directory:
//
//   { "type": "VAEDecode",
//     "parameters": { "<name>": { "index": 0, "type": "INT", "value": 512 } },
//     "inputs":     { "<name>": { "index": 0, "type": "LATENT" } },
//     "outputs":    { "<name>": { "index": 0, "type": "IMAGE" } } }
//
// Schemas are immutable once registered; the compiler only reads them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::literal::Literal;

const TRACING_TARGET: &str = "flowc::registry";

// ── Data types ──────────────────────────────────────────────────────────────

/// Declared type of a port or parameter slot (e.g. `IMAGE`, `LATENT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(pub String);

impl DataType {
    /// The one input category that accepts a link from an output of any type.
    pub const CONDITIONING: &'static str = "CONDITIONING";

    pub fn new(name: impl Into<String>) -> Self {
        DataType(name.into())
    }

    pub fn is_conditioning(&self) -> bool {
        self.0 == Self::CONDITIONING
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parameter slot: a literal-valued widget that a link may later replace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSchema {
    pub name: String,
    pub index: usize,
    #[serde(rename = "type")]
    pub ty: DataType,
    pub default: Literal,
}

/// A typed input or output port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSchema {
    pub name: String,
    pub index: usize,
    #[serde(rename = "type")]
    pub ty: DataType,
}

/// Schema of one node type. Every list is ordered by `index`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSchema {
    #[serde(rename = "type")]
    pub type_name: String,
    pub params: Vec<ParamSchema>,
    pub inputs: Vec<PortSchema>,
    pub outputs: Vec<PortSchema>,
}

impl NodeSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        NodeSchema {
            type_name: type_name.into(),
            params: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Append a parameter slot at the next index.
    pub fn with_param(mut self, name: &str, ty: &str, default: Literal) -> Self {
        let index = self.params.len();
        self.params.push(ParamSchema {
            name: name.to_string(),
            index,
            ty: DataType::new(ty),
            default,
        });
        self
    }

    /// Append an input port at the next index.
    pub fn with_input(mut self, name: &str, ty: &str) -> Self {
        let index = self.inputs.len();
        self.inputs.push(PortSchema {
            name: name.to_string(),
            index,
            ty: DataType::new(ty),
        });
        self
    }

    /// Append an output port at the next index.
    pub fn with_output(mut self, name: &str, ty: &str) -> Self {
        let index = self.outputs.len();
        self.outputs.push(PortSchema {
            name: name.to_string(),
            index,
            ty: DataType::new(ty),
        });
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSchema> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&PortSchema> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortSchema> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

/// Errors that can occur during registry loading.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{}: {message}", path.display())]
    Template { path: PathBuf, message: String },
    #[error("duplicate node type '{name}': first defined in {}, redefined in {}", first.display(), second.display())]
    DuplicateType {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

// ── Template records ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TemplateRecord {
    #[serde(rename = "type", default)]
    type_name: Option<String>,
    #[serde(default)]
    parameters: HashMap<String, ParamRecord>,
    #[serde(default)]
    inputs: HashMap<String, PortRecord>,
    #[serde(default)]
    outputs: HashMap<String, PortRecord>,
}

#[derive(Debug, Deserialize)]
struct ParamRecord {
    index: usize,
    /// Usually a type name; combo widgets list their choices instead.
    #[serde(rename = "type", default)]
    ty: serde_json::Value,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PortRecord {
    index: usize,
    #[serde(rename = "type")]
    ty: String,
}

fn param_type(value: &serde_json::Value) -> DataType {
    match value {
        serde_json::Value::String(s) => DataType::new(s.as_str()),
        serde_json::Value::Array(_) => DataType::new("COMBO"),
        _ => DataType::new("*"),
    }
}

impl TemplateRecord {
    fn into_schema(self, path: &Path) -> Result<NodeSchema, RegistryError> {
        let type_name = match self.type_name {
            Some(name) => name,
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| RegistryError::Template {
                    path: path.to_path_buf(),
                    message: "template has no \"type\" and no file stem".to_string(),
                })?,
        };

        let mut params = Vec::with_capacity(self.parameters.len());
        for (name, record) in self.parameters {
            let default = serde_json::from_value::<Literal>(record.value).map_err(|_| {
                RegistryError::Template {
                    path: path.to_path_buf(),
                    message: format!("parameter '{name}' has a non-scalar default value"),
                }
            })?;
            params.push(ParamSchema {
                ty: param_type(&record.ty),
                name,
                index: record.index,
                default,
            });
        }
        params.sort_by_key(|p| p.index);

        let ports = |records: HashMap<String, PortRecord>| {
            let mut ports: Vec<PortSchema> = records
                .into_iter()
                .map(|(name, r)| PortSchema {
                    name,
                    index: r.index,
                    ty: DataType(r.ty),
                })
                .collect();
            ports.sort_by_key(|p| p.index);
            ports
        };

        Ok(NodeSchema {
            type_name,
            params,
            inputs: ports(self.inputs),
            outputs: ports(self.outputs),
        })
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

/// Node template registry. Populated from JSON template files or in memory.
#[derive(Debug, Default)]
pub struct Registry {
    templates: HashMap<String, (NodeSchema, PathBuf)>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            templates: HashMap::new(),
        }
    }

    /// Register an in-memory schema.
    pub fn insert(&mut self, schema: NodeSchema) -> Result<(), RegistryError> {
        self.insert_from(schema, PathBuf::from("<memory>"))
    }

    fn insert_from(&mut self, schema: NodeSchema, origin: PathBuf) -> Result<(), RegistryError> {
        if let Some((_, first)) = self.templates.get(&schema.type_name) {
            return Err(RegistryError::DuplicateType {
                name: schema.type_name.clone(),
                first: first.clone(),
                second: origin,
            });
        }
        self.templates
            .insert(schema.type_name.clone(), (schema, origin));
        Ok(())
    }

    /// Load one JSON template file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let record: TemplateRecord =
            serde_json::from_str(&text).map_err(|e| RegistryError::Json {
                path: path.to_path_buf(),
                source: e,
            })?;
        let schema = record.into_schema(path)?;
        self.insert_from(schema, path.to_path_buf())
    }

    /// Load every `*.json` template in a directory (non-recursive).
    /// Returns the number of templates loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, RegistryError> {
        let entries = std::fs::read_dir(dir).map_err(|e| RegistryError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RegistryError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        for path in &files {
            self.load_file(path)?;
        }
        tracing::debug!(
            target: TRACING_TARGET,
            dir = %dir.display(),
            templates = files.len(),
            "Loaded node templates"
        );
        Ok(files.len())
    }

    pub fn lookup(&self, type_name: &str) -> Option<&NodeSchema> {
        self.templates.get(type_name).map(|(schema, _)| schema)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &NodeSchema> {
        self.templates.values().map(|(schema, _)| schema)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Compact JSON of every schema, sorted by type name. Stable across
    /// load order, so it can be hashed into a registry fingerprint.
    pub fn canonical_json(&self) -> String {
        let mut schemas: Vec<&NodeSchema> = self.schemas().collect();
        schemas.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        serde_json::to_string(&schemas).unwrap_or_default()
    }
}

// ── Test fixtures ───────────────────────────────────────────────────────────

/// Small in-memory registry shared by unit tests across modules.
#[cfg(test)]
pub(crate) fn sample_registry() -> Registry {
    let schemas = [
        NodeSchema::new("CheckpointLoader")
            .with_param("ckpt", "STRING", Literal::Str("model.safetensors".into()))
            .with_output("model", "MODEL")
            .with_output("clip", "CLIP")
            .with_output("vae", "VAE"),
        NodeSchema::new("TextEncode")
            .with_param("text", "STRING", Literal::Str(String::new()))
            .with_input("clip", "CLIP")
            .with_output("conditioning", "CONDITIONING"),
        NodeSchema::new("EmptyLatent")
            .with_param("width", "INT", Literal::Int(512))
            .with_param("height", "INT", Literal::Int(512))
            .with_output("LATENT", "LATENT"),
        NodeSchema::new("Sampler")
            .with_param("seed", "INT", Literal::Int(0))
            .with_param("cfg", "FLOAT", Literal::Float(7.0))
            .with_input("model", "MODEL")
            .with_input("positive", "CONDITIONING")
            .with_input("latent", "LATENT")
            .with_output("LATENT", "LATENT"),
        NodeSchema::new("Decode")
            .with_input("samples", "LATENT")
            .with_input("vae", "VAE")
            .with_output("IMAGE", "IMAGE"),
        NodeSchema::new("LoadImage")
            .with_param("image", "STRING", Literal::Str("input.png".into()))
            .with_output("IMAGE", "IMAGE")
            .with_output("MASK", "MASK"),
        NodeSchema::new("SaveImage")
            .with_param("filename_prefix", "STRING", Literal::Str("out".into()))
            .with_input("images", "IMAGE"),
        NodeSchema::new("Number")
            .with_param("value", "INT", Literal::Int(0))
            .with_output("INT", "INT"),
        NodeSchema::new("Image Blend (Advanced)")
            .with_param("blend_factor", "FLOAT", Literal::Float(0.5))
            .with_param("blend_mode", "STRING", Literal::Str("normal".into()))
            .with_input("image_a", "IMAGE")
            .with_input("image_b", "IMAGE")
            .with_output("IMAGE", "IMAGE"),
    ];
    let mut reg = Registry::new();
    for schema in schemas {
        reg.insert(schema).expect("duplicate fixture schema");
    }
    reg
}

// ── Tests ───────────────────────────────────────────────────────────────────
