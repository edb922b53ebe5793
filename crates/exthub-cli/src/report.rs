//! Operator-facing text for workflow notices, diffs and errors.

use std::collections::BTreeMap;
use std::error::Error;

use exthub_core::ExtensionInstance;
use exthub_update::{BillingFraming, BillingNotice, SourceProvenance, SpecChanges, UpdateNotice};
use serde::Serialize;

pub const SECRET_MASK: &str = "********";

/// Status keyword and message for each line of a notice.
pub fn notice_lines(notice: &UpdateNotice) -> Vec<(&'static str, String)> {
    match notice {
        UpdateNotice::OverrideIgnored { location } => vec![(
            "warn",
            format!(
                "ignoring source {location}: updating from a local directory or URL needs the \
                 extdev preview (pass --extdev or set `[previews] extdev = true`)"
            ),
        )],
        UpdateNotice::UpdatingFromOfficial {
            instance_id,
            from_version,
            to_version,
        } => vec![(
            "info",
            format!("Updating {instance_id} from version {from_version} to version {to_version}"),
        )],
        UpdateNotice::UpdatingFromOverride {
            instance_id,
            from_version,
            location,
            to_version,
            provenance,
        } => {
            let kind = match provenance {
                SourceProvenance::Url => "URL",
                SourceProvenance::Local | SourceProvenance::Official => "local directory",
            };
            vec![(
                "info",
                format!(
                    "Updating {instance_id} from version {from_version} to {kind} {location} \
                     ({to_version})"
                ),
            )]
        }
        UpdateNotice::AlreadyUpToDate {
            instance_id,
            version,
        } => vec![(
            "warn",
            format!("{instance_id} is already up to date. Its version is {version}."),
        )],
        UpdateNotice::UpdateAborted { instance_id } => {
            vec![("info", format!("Update of {instance_id} aborted; nothing changed."))]
        }
        UpdateNotice::Billing(notice) => vec![billing_notice_line(notice)],
        UpdateNotice::ParamsReconciled {
            kept,
            added,
            reprompted,
            removed,
            changed,
        } => {
            let mut lines = Vec::new();
            if !removed.is_empty() {
                lines.push((
                    "info",
                    format!("Dropping params the new version no longer uses: {}", removed.join(", ")),
                ));
            }
            if !kept.is_empty() {
                lines.push(("info", format!("Keeping current values for: {}", kept.join(", "))));
            }
            if !added.is_empty() {
                lines.push(("info", format!("Set new params: {}", added.join(", "))));
            }
            if !reprompted.is_empty() {
                lines.push(("info", format!("Updated values for: {}", reprompted.join(", "))));
            }
            if !changed {
                lines.push(("info", "Params are unchanged".to_string()));
            }
            lines
        }
        UpdateNotice::Updating { instance_id } => vec![(
            "step",
            format!("Updating {instance_id}. This usually takes 3 to 5 minutes..."),
        )],
        UpdateNotice::Updated {
            instance_id,
            console_url,
        } => vec![
            ("ok", format!("Successfully updated {instance_id}.")),
            ("info", format!("View the instance in the console: {console_url}")),
        ],
    }
}

fn billing_notice_line(notice: &BillingNotice) -> (&'static str, String) {
    if notice.enabled {
        return (
            "info",
            "Billing is enabled on this project; the extension may incur charges.".to_string(),
        );
    }
    let message = match notice.framing {
        BillingFraming::NewlyRequired => {
            "This version of the extension requires billing (pay-as-you-go plan). \
             Billing will be enabled on the project now."
        }
        BillingFraming::AlreadyRequired => {
            "This extension requires billing, which is not enabled on the project. \
             Billing will be enabled now."
        }
    };
    ("warn", message.to_string())
}

pub fn change_lines(changes: &SpecChanges) -> Vec<String> {
    let mut lines = vec![format!(
        "version: {} -> {}",
        changes.from_version, changes.to_version
    )];
    if changes.is_empty() {
        lines.push("no changes to resources, APIs, roles or params".to_string());
        return lines;
    }

    if let Some((from, to)) = &changes.extension_switch {
        lines.push(format!("extension: {from} -> {to}"));
    }
    for field in &changes.fields {
        lines.push(format!("{}: {} -> {}", field.field, field.old, field.new));
    }
    for resource in &changes.resources_added {
        lines.push(format!("+ resource {} ({})", resource.name, resource.kind));
    }
    for resource in &changes.resources_removed {
        lines.push(format!("- resource {} ({})", resource.name, resource.kind));
    }
    for resource in &changes.resources_retyped {
        lines.push(format!(
            "~ resource {}: {} -> {}",
            resource.name, resource.old_kind, resource.new_kind
        ));
    }
    for api in &changes.apis_added {
        lines.push(format!("+ api {}: {}", api.api_name, api.reason));
    }
    for api in &changes.apis_removed {
        lines.push(format!("- api {}", api.api_name));
    }
    for role in &changes.roles_added {
        lines.push(format!("+ role {}: {}", role.role, role.reason));
    }
    for role in &changes.roles_removed {
        lines.push(format!("- role {}", role.role));
    }
    for param in &changes.params_added {
        lines.push(format!("+ param {param}"));
    }
    for param in &changes.params_removed {
        lines.push(format!("- param {param}"));
    }
    for param in &changes.params_changed {
        lines.push(format!("~ param {param}: definition changed"));
    }
    lines
}

/// The error followed by each distinct cause.
pub fn error_lines(err: &(dyn Error + 'static)) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    let mut cause = err.source();
    while let Some(current) = cause {
        let text = current.to_string();
        let repeated = lines.last().is_some_and(|previous| previous.contains(&text));
        if !repeated {
            lines.push(format!("caused by: {text}"));
        }
        cause = current.source();
    }
    lines
}

pub fn instance_row(instance: &ExtensionInstance) -> String {
    let spec = instance.spec();
    format!(
        "{}  {}@{}  {}",
        instance.instance_id,
        spec.name,
        spec.version,
        instance.source_name()
    )
}

#[derive(Debug, Serialize)]
pub struct InstanceInfo<'a> {
    pub project_id: &'a str,
    pub instance_id: &'a str,
    pub extension: &'a str,
    pub version: String,
    pub source: &'a str,
    pub billing_required: bool,
    pub params: BTreeMap<&'a str, String>,
    pub updated_at_unix: u64,
}

impl<'a> InstanceInfo<'a> {
    /// Secret param values are masked.
    pub fn from_instance(instance: &'a ExtensionInstance) -> Self {
        let spec = instance.spec();
        let params = instance
            .params()
            .iter()
            .map(|(name, value)| {
                let secret = spec.param(name).is_some_and(|param| param.is_secret());
                let shown = if secret {
                    SECRET_MASK.to_string()
                } else {
                    value.clone()
                };
                (name.as_str(), shown)
            })
            .collect();

        Self {
            project_id: &instance.project_id,
            instance_id: &instance.instance_id,
            extension: &spec.name,
            version: spec.version.to_string(),
            source: instance.source_name(),
            billing_required: spec.billing_required,
            params,
            updated_at_unix: instance.updated_at_unix,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Instance: {}", self.instance_id),
            format!("Project: {}", self.project_id),
            format!("Extension: {}@{}", self.extension, self.version),
            format!("Source: {}", self.source),
            format!("Billing required: {}", self.billing_required),
        ];
        if self.params.is_empty() {
            lines.push("Params: (none)".to_string());
        } else {
            lines.push("Params:".to_string());
            for (name, value) in &self.params {
                lines.push(format!("  {name} = {value}"));
            }
        }
        lines
    }
}
