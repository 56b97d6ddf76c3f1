//! SP-007: Typed serverless template model and the decode → resolve → bind pipeline.
//!
//! Top-level sections are typed; resource properties, conditions, and other
//! free-form sections stay as [`Value`] so unresolved intrinsics survive binding.

use super::binder::{bind, BindError, BindOptions};
use super::resolver::{resolve_all, Context, Resolve};
use super::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Template
// ============================================================================

/// A serverless application template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SamTemplate {
    /// Template format version, usually "2010-09-09"
    #[serde(rename = "AWSTemplateFormatVersion", skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,

    /// Transform declaration: a single name or a list of names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Properties shared by every function, API, and table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub globals: Option<Value>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub mappings: IndexMap<String, Value>,

    /// Named condition expressions (referenced by `Condition` and `Fn::If`)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub conditions: IndexMap<String, Value>,

    /// Resource declarations (order-preserving)
    pub resources: IndexMap<String, Resource>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SamTemplate {
    /// Transform names, whether declared as a single string or a list.
    pub fn transforms(&self) -> Vec<&str> {
        match &self.transform {
            Some(Value::String(name)) => vec![name.as_str()],
            Some(Value::List(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Resources of a given type, in declaration order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// A template input parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_echo: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

/// A declared resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Resource type, e.g. `AWS::Serverless::Function`
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,

    /// A single logical ID or a list of them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl Resource {
    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }

    /// Declared dependencies, whether written as a string or a list.
    pub fn dependencies(&self) -> Vec<&str> {
        match &self.depends_on {
            Some(Value::String(id)) => vec![id.as_str()],
            Some(Value::List(ids)) => ids.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

/// A template output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Failure of [`decode_to_model`]: either the resolver's own error, unchanged,
/// or a binding failure.
#[derive(Debug, Error)]
pub enum ModelError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Resolve(E),

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Resolve a decoded tree (when a resolver is given), then bind it to `T`.
pub fn decode_into<T, R>(
    value: &Value,
    resolver: Option<&R>,
    ctx: &Context,
    options: &BindOptions,
) -> Result<T, ModelError<R::Error>>
where
    T: serde::de::DeserializeOwned,
    R: Resolve + ?Sized,
    R::Error: std::error::Error + 'static,
{
    let resolved = match resolver {
        Some(_) => resolve_all(ctx, value, resolver).map_err(ModelError::Resolve)?,
        None => value.clone(),
    };
    Ok(bind(resolved, options)?)
}

/// Resolve a decoded tree and bind it to [`SamTemplate`].
pub fn decode_to_model<R>(
    value: &Value,
    resolver: Option<&R>,
    ctx: &Context,
    options: &BindOptions,
) -> Result<SamTemplate, ModelError<R::Error>>
where
    R: Resolve + ?Sized,
    R::Error: std::error::Error + 'static,
{
    decode_into(value, resolver, ctx, options)
}
