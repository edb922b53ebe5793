use anyhow::{anyhow, Context};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Select,
    Multiselect,
    Secret,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Secret => "secret",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamDefinition {
    pub param: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error_message: Option<String>,
    #[serde(default)]
    pub options: Vec<ParamOption>,
    #[serde(default)]
    pub immutable: bool,
}

impl ParamDefinition {
    /// Checks a candidate value against this definition's rules.
    ///
    /// Empty values are only rejected for required params; the regex and
    /// option rules apply to non-empty values.
    pub fn validate_value(&self, value: &str) -> anyhow::Result<()> {
        if value.is_empty() {
            if self.required {
                return Err(anyhow!("param '{}' is required", self.param));
            }
            return Ok(());
        }

        match self.kind {
            ParamType::Select => {
                if !self.has_option(value) {
                    return Err(anyhow!(
                        "'{}' is not a valid option for param '{}'",
                        value,
                        self.param
                    ));
                }
            }
            ParamType::Multiselect => {
                for item in value.split(',').map(str::trim) {
                    if !self.has_option(item) {
                        return Err(anyhow!(
                            "'{}' is not a valid option for param '{}'",
                            item,
                            self.param
                        ));
                    }
                }
            }
            ParamType::String | ParamType::Secret => {}
        }

        if let Some(pattern) = &self.validation_regex {
            let regex = anchored_regex(pattern)?;
            if !regex.is_match(value) {
                let message = self
                    .validation_error_message
                    .clone()
                    .unwrap_or_else(|| format!("value must match {pattern}"));
                return Err(anyhow!("invalid value for param '{}': {message}", self.param));
            }
        }

        Ok(())
    }

    pub fn is_valid_value(&self, value: &str) -> bool {
        self.validate_value(value).is_ok()
    }

    pub fn is_secret(&self) -> bool {
        self.kind == ParamType::Secret
    }

    pub(crate) fn validate_definition(&self) -> anyhow::Result<()> {
        if let Some(pattern) = &self.validation_regex {
            anchored_regex(pattern)?;
        }
        if matches!(self.kind, ParamType::Select | ParamType::Multiselect) && self.options.is_empty()
        {
            return Err(anyhow!(
                "{} param must declare at least one option",
                self.kind.as_str()
            ));
        }
        if let Some(default) = &self.default {
            if !default.is_empty() {
                self.validate_value(default)
                    .context("default value does not satisfy the param rules")?;
            }
        }
        Ok(())
    }

    fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|option| option.value == value)
    }
}

fn anchored_regex(pattern: &str) -> anyhow::Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .with_context(|| format!("invalid validation regex: {pattern}"))
}
