use std::collections::{BTreeMap, BTreeSet};

use exthub_core::{ExtensionApi, ExtensionResource, ExtensionRole, ExtensionSpec};
use semver::Version;

use crate::error::UpdateError;
use crate::ports::Operator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub name: String,
    pub old_kind: String,
    pub new_kind: String,
}

/// What moving from one spec to another changes for the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecChanges {
    pub from_version: Version,
    pub to_version: Version,
    /// Set when the new source belongs to a different extension.
    pub extension_switch: Option<(String, String)>,
    pub fields: Vec<FieldChange>,
    pub resources_added: Vec<ExtensionResource>,
    pub resources_removed: Vec<ExtensionResource>,
    pub resources_retyped: Vec<ResourceChange>,
    pub apis_added: Vec<ExtensionApi>,
    pub apis_removed: Vec<ExtensionApi>,
    pub roles_added: Vec<ExtensionRole>,
    pub roles_removed: Vec<ExtensionRole>,
    pub params_added: Vec<String>,
    pub params_removed: Vec<String>,
    /// Params declared by both versions whose definition differs.
    pub params_changed: Vec<String>,
}

impl SpecChanges {
    /// True when nothing besides the version label differs.
    pub fn is_empty(&self) -> bool {
        self.extension_switch.is_none()
            && self.fields.is_empty()
            && self.resources_added.is_empty()
            && self.resources_removed.is_empty()
            && self.resources_retyped.is_empty()
            && self.apis_added.is_empty()
            && self.apis_removed.is_empty()
            && self.roles_added.is_empty()
            && self.roles_removed.is_empty()
            && self.params_added.is_empty()
            && self.params_removed.is_empty()
            && self.params_changed.is_empty()
    }

    /// New APIs or roles grant the extension new access.
    pub fn requires_acknowledgment(&self) -> bool {
        !self.apis_added.is_empty() || !self.roles_added.is_empty()
    }
}

pub fn diff_specs(current: &ExtensionSpec, new: &ExtensionSpec) -> SpecChanges {
    let extension_switch =
        (current.name != new.name).then(|| (current.name.clone(), new.name.clone()));

    let mut fields = Vec::new();
    push_field_change(
        &mut fields,
        "display name",
        current.display_name.as_deref(),
        new.display_name.as_deref(),
    );
    push_field_change(
        &mut fields,
        "description",
        current.description.as_deref(),
        new.description.as_deref(),
    );
    push_field_change(
        &mut fields,
        "author",
        current.author.as_deref(),
        new.author.as_deref(),
    );
    if current.billing_required != new.billing_required {
        fields.push(FieldChange {
            field: "billing required",
            old: current.billing_required.to_string(),
            new: new.billing_required.to_string(),
        });
    }

    let old_resources = current
        .resources
        .iter()
        .map(|resource| (resource.name.as_str(), resource))
        .collect::<BTreeMap<_, _>>();
    let new_resources = new
        .resources
        .iter()
        .map(|resource| (resource.name.as_str(), resource))
        .collect::<BTreeMap<_, _>>();
    let resources_added = new_resources
        .iter()
        .filter(|(name, _)| !old_resources.contains_key(*name))
        .map(|(_, resource)| (*resource).clone())
        .collect();
    let resources_removed = old_resources
        .iter()
        .filter(|(name, _)| !new_resources.contains_key(*name))
        .map(|(_, resource)| (*resource).clone())
        .collect();
    let resources_retyped = old_resources
        .iter()
        .filter_map(|(name, old)| {
            let new = new_resources.get(name)?;
            (old.kind != new.kind).then(|| ResourceChange {
                name: (*name).to_string(),
                old_kind: old.kind.clone(),
                new_kind: new.kind.clone(),
            })
        })
        .collect();

    let old_apis = current
        .apis
        .iter()
        .map(|api| api.api_name.as_str())
        .collect::<BTreeSet<_>>();
    let new_apis = new
        .apis
        .iter()
        .map(|api| api.api_name.as_str())
        .collect::<BTreeSet<_>>();
    let old_roles = current
        .roles
        .iter()
        .map(|role| role.role.as_str())
        .collect::<BTreeSet<_>>();
    let new_roles = new
        .roles
        .iter()
        .map(|role| role.role.as_str())
        .collect::<BTreeSet<_>>();
    let old_params = current.param_names().collect::<BTreeSet<_>>();
    let new_params = new.param_names().collect::<BTreeSet<_>>();

    SpecChanges {
        from_version: current.version.clone(),
        to_version: new.version.clone(),
        extension_switch,
        fields,
        resources_added,
        resources_removed,
        resources_retyped,
        apis_added: new
            .apis
            .iter()
            .filter(|api| !old_apis.contains(api.api_name.as_str()))
            .cloned()
            .collect(),
        apis_removed: current
            .apis
            .iter()
            .filter(|api| !new_apis.contains(api.api_name.as_str()))
            .cloned()
            .collect(),
        roles_added: new
            .roles
            .iter()
            .filter(|role| !old_roles.contains(role.role.as_str()))
            .cloned()
            .collect(),
        roles_removed: current
            .roles
            .iter()
            .filter(|role| !new_roles.contains(role.role.as_str()))
            .cloned()
            .collect(),
        params_added: new
            .param_names()
            .filter(|name| !old_params.contains(name))
            .map(str::to_string)
            .collect(),
        params_removed: current
            .param_names()
            .filter(|name| !new_params.contains(name))
            .map(str::to_string)
            .collect(),
        params_changed: new
            .params
            .iter()
            .filter(|param| {
                current
                    .param(&param.param)
                    .is_some_and(|previous| previous != *param)
            })
            .map(|param| param.param.clone())
            .collect(),
    }
}

/// Shows the diff and, when it grants new access, waits for the operator.
pub fn present_changes(
    operator: &dyn Operator,
    current: &ExtensionSpec,
    new: &ExtensionSpec,
) -> Result<SpecChanges, UpdateError> {
    let changes = diff_specs(current, new);
    operator.present_changes(&changes);
    if changes.requires_acknowledgment() && !operator.confirm_changes(&changes)? {
        return Err(UpdateError::Cancelled);
    }
    Ok(changes)
}

fn push_field_change(
    fields: &mut Vec<FieldChange>,
    field: &'static str,
    old: Option<&str>,
    new: Option<&str>,
) {
    if old != new {
        fields.push(FieldChange {
            field,
            old: old.unwrap_or("(none)").to_string(),
            new: new.unwrap_or("(none)").to_string(),
        });
    }
}
