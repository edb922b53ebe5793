use std::collections::HashSet;

use anyhow::{anyhow, Context};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::params::ParamDefinition;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionSpec {
    pub name: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub billing_required: bool,
    #[serde(default)]
    pub params: Vec<ParamDefinition>,
    #[serde(default)]
    pub resources: Vec<ExtensionResource>,
    #[serde(default)]
    pub apis: Vec<ExtensionApi>,
    #[serde(default)]
    pub roles: Vec<ExtensionRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionResource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionApi {
    pub api_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionRole {
    pub role: String,
    pub reason: String,
}

impl ExtensionSpec {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let spec: Self = toml::from_str(input).context("failed to parse extension spec")?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("failed to serialize extension spec")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_extension_name(&self.name)?;

        let mut seen_params = HashSet::new();
        for param in &self.params {
            if param.param.trim().is_empty() {
                return Err(anyhow!(
                    "extension '{}' declares a param with an empty name",
                    self.name
                ));
            }
            if !seen_params.insert(param.param.as_str()) {
                return Err(anyhow!(
                    "extension '{}' declares param '{}' more than once",
                    self.name,
                    param.param
                ));
            }
            param.validate_definition().with_context(|| {
                format!(
                    "invalid param '{}' in extension '{}'",
                    param.param, self.name
                )
            })?;
        }

        let mut seen_resources = HashSet::new();
        for resource in &self.resources {
            if !seen_resources.insert(resource.name.as_str()) {
                return Err(anyhow!(
                    "extension '{}' declares resource '{}' more than once",
                    self.name,
                    resource.name
                ));
            }
        }

        Ok(())
    }

    pub fn param(&self, name: &str) -> Option<&ParamDefinition> {
        self.params.iter().find(|param| param.param == name)
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|param| param.param.as_str())
    }

    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

pub fn validate_extension_name(name: &str) -> anyhow::Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("extension name must not be empty"));
    }
    if !is_identifier_token(name) {
        return Err(anyhow!(
            "invalid extension name '{name}': use lowercase letters, digits and '-' (max 64 chars)"
        ));
    }
    Ok(())
}

pub(crate) fn is_identifier_token(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || bytes.len() > 64 {
        return false;
    }

    let starts_valid = bytes[0].is_ascii_lowercase() || bytes[0].is_ascii_digit();
    starts_valid
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}
