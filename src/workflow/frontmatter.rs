//! Workflow definition front matter.
//!
//! A workflow document starts with a YAML block between `---` lines:
//!
//! ```yaml
//! ---
//! name: create-prd
//! description: Product requirements
//! required_config: [output_folder, user_name]
//! required_inputs: ["{output_folder}/brief.md"]
//! output_folder: docs
//! user_name: Sam
//! ---
//! ```
//!
//! `name`, `description`, `required_config` and `required_inputs` are
//! reserved; every other top-level key is a config value. Validation reports
//! every problem found, not just the first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_yaml::Value;

use crate::core::{AutomationResult, ValidationFailure};

const RESERVED_KEYS: &[&str] = &["name", "description", "required_config", "required_inputs"];

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_\-]*)\}").expect("valid regex"));

/// A parsed workflow document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub description: Option<String>,
    /// Config keys that must be present and non-empty
    pub required_config: Vec<String>,
    /// Files that must exist before the workflow runs; may use `{key}` placeholders
    pub required_inputs: Vec<String>,
    /// Every non-reserved front matter key
    pub config: BTreeMap<String, Value>,
    /// Document text after the front matter
    #[serde(skip)]
    pub body: String,
}

impl WorkflowDefinition {
    /// Read and parse a workflow file.
    pub fn load(path: &Path) -> AutomationResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content)?)
    }

    /// Parse a workflow document, checking its front matter and required config.
    pub fn parse(document: &str) -> Result<Self, ValidationFailure> {
        let mut failure = ValidationFailure::new();

        let Some((yaml, body)) = split_frontmatter(document) else {
            failure.push("frontmatter", "missing YAML front matter block");
            return Err(failure);
        };

        let mapping = match serde_yaml::from_str::<Value>(yaml) {
            Ok(Value::Mapping(mapping)) => mapping,
            Ok(Value::Null) => serde_yaml::Mapping::new(),
            Ok(_) => {
                failure.push("frontmatter", "front matter must be a mapping");
                return Err(failure);
            }
            Err(e) => {
                failure.push("frontmatter", format!("malformed YAML: {}", e));
                return Err(failure);
            }
        };

        let mut fields: BTreeMap<String, Value> = BTreeMap::new();
        for (key, value) in mapping {
            match key {
                Value::String(key) => {
                    fields.insert(key, value);
                }
                other => failure.push(format!("{:?}", other), "front matter keys must be strings"),
            }
        }

        let name = match fields.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                failure.push("name", "workflow name is required");
                String::new()
            }
            Some(_) => {
                failure.push("name", "must be a string");
                String::new()
            }
        };

        let description = match fields.get("description") {
            Some(Value::String(d)) => Some(d.clone()),
            None | Some(Value::Null) => None,
            Some(_) => {
                failure.push("description", "must be a string");
                None
            }
        };

        let required_config = string_list(&fields, "required_config", &mut failure);
        let required_inputs = string_list(&fields, "required_inputs", &mut failure);

        let config: BTreeMap<String, Value> = fields
            .into_iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .collect();

        for key in &required_config {
            match config.get(key) {
                None => failure.push(key.as_str(), "required config key is missing"),
                Some(value) if is_empty_value(value) => {
                    failure.push(key.as_str(), "required config key is empty")
                }
                Some(_) => {}
            }
        }

        failure.into_result()?;
        tracing::debug!(workflow = %name, config_keys = config.len(), "Parsed workflow front matter");

        Ok(Self {
            name,
            description,
            required_config,
            required_inputs,
            config,
            body: body.to_string(),
        })
    }

    /// Parse and check required inputs in one pass, reporting every violation.
    pub fn validate(document: &str, base_dir: &Path) -> Result<Self, ValidationFailure> {
        let definition = Self::parse(document)?;
        definition.check_inputs(base_dir)?;
        Ok(definition)
    }

    /// Config value as a string, when it is a scalar.
    pub fn config_str(&self, key: &str) -> Option<String> {
        match self.config.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Expand `{key}` placeholders in a required input from config values.
    pub fn resolve_input(&self, input: &str) -> Result<PathBuf, String> {
        let mut unresolved = Vec::new();
        let resolved = PLACEHOLDER.replace_all(input, |caps: &regex::Captures<'_>| {
            match self.config_str(&caps[1]) {
                Some(value) => value,
                None => {
                    unresolved.push(caps[1].to_string());
                    caps[0].to_string()
                }
            }
        });

        if unresolved.is_empty() {
            Ok(PathBuf::from(resolved.as_ref()))
        } else {
            Err(format!("unresolved placeholder(s): {}", unresolved.join(", ")))
        }
    }

    /// Check that every required input file exists under `base_dir`.
    pub fn check_inputs(&self, base_dir: &Path) -> Result<(), ValidationFailure> {
        let mut failure = ValidationFailure::new();

        for input in &self.required_inputs {
            match self.resolve_input(input) {
                Ok(path) => {
                    let full = if path.is_absolute() { path } else { base_dir.join(path) };
                    if !full.is_file() {
                        failure.push(
                            input.as_str(),
                            format!("required input file not found: {}", full.display()),
                        );
                    }
                }
                Err(reason) => failure.push(input.as_str(), reason),
            }
        }

        failure.into_result()
    }
}

/// Split a document into its front matter and body.
fn split_frontmatter(document: &str) -> Option<(&str, &str)> {
    let doc = document.trim_start_matches('\u{feff}').trim_start();
    let rest = doc.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn string_list(
    fields: &BTreeMap<String, Value>,
    key: &str,
    failure: &mut ValidationFailure,
) -> Vec<String> {
    match fields.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Sequence(items)) => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    _ => failure.push(format!("{}[{}]", key, i), "must be a non-empty string"),
                }
            }
            out
        }
        Some(_) => {
            failure.push(key, "must be a list of strings");
            Vec::new()
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        _ => false,
    }
}
