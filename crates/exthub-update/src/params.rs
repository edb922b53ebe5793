use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use exthub_core::ExtensionSpec;

use crate::error::UpdateError;
use crate::ports::Operator;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamReconciliation {
    /// Exactly one entry per parameter the new spec declares.
    pub params: BTreeMap<String, String>,
    pub kept: Vec<String>,
    /// Parameters the installed version did not declare.
    pub added: Vec<String>,
    /// Declared before, but the stored value no longer validates.
    pub reprompted: Vec<String>,
    /// Stored values the new version does not declare.
    pub removed: Vec<String>,
}

impl ParamReconciliation {
    pub fn changed_from(&self, current: &BTreeMap<String, String>) -> bool {
        &self.params != current
    }
}

/// Carries valid values forward and prompts for everything else.
///
/// An invalid stored value is re-asked with the new default as the
/// suggestion. Immutable params are never re-asked once set.
pub fn reconcile_params(
    operator: &dyn Operator,
    project_id: &str,
    current_spec: &ExtensionSpec,
    new_spec: &ExtensionSpec,
    current_params: &BTreeMap<String, String>,
) -> Result<ParamReconciliation, UpdateError> {
    let mut reconciliation = ParamReconciliation::default();

    for param in &new_spec.params {
        let name = param.param.as_str();
        let previous = current_params.get(name);

        let suggestion = match previous {
            Some(value) if param.is_valid_value(value) => {
                reconciliation.params.insert(name.to_string(), value.clone());
                reconciliation.kept.push(name.to_string());
                continue;
            }
            Some(value) if param.immutable => {
                return Err(anyhow!(
                    "param {name} is immutable and its current value '{value}' is not valid \
                     for version {}",
                    new_spec.version
                )
                .into());
            }
            Some(value) => {
                tracing::debug!(param = %name, "stored value no longer validates");
                reconciliation.reprompted.push(name.to_string());
                // The rejected value is only offered when there is no default to derive from.
                param.default.as_deref().or(Some(value.as_str()))
            }
            None => {
                if current_spec.param(name).is_none() {
                    reconciliation.added.push(name.to_string());
                } else {
                    reconciliation.reprompted.push(name.to_string());
                }
                param.default.as_deref()
            }
        };

        let answer = operator.prompt_param(project_id, param, suggestion)?;
        param
            .validate_value(&answer)
            .with_context(|| format!("invalid value for parameter {name}"))?;
        reconciliation.params.insert(name.to_string(), answer);
    }

    reconciliation.removed = current_params
        .keys()
        .filter(|name| new_spec.param(name).is_none())
        .cloned()
        .collect();

    Ok(reconciliation)
}
