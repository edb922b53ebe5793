//! The update state machine.
//!
//! `Start -> SourceResolved -> WarningsConfirmed -> IdempotenceAccepted ->
//! ChangesPresented -> BillingSatisfied -> ParamsReconciled -> Updated`.
//! Any step may fail; a declined idempotence check ends the run early as
//! [`UpdateOutcome::Declined`]. Nothing is retried.

use std::cell::Cell;
use std::collections::BTreeMap;

use exthub_core::ExtensionInstance;
use semver::Version;

use crate::billing::{ensure_billing, BillingNotice};
use crate::changes::present_changes;
use crate::error::UpdateError;
use crate::executor::{build_update_payload, console_url, execute_update};
use crate::idempotence::{check_idempotent, IdempotenceDecision};
use crate::params::reconcile_params;
use crate::ports::{BillingService, InstanceStore, Operator, Registry, SourceBuilder};
use crate::resolve::{SourceProvenance, SourceResolver};
use crate::warnings::{registry_update_warnings, warning_for, UpdateWarning};

/// Informational messages for the operator. None of them needs an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateNotice {
    OverrideIgnored {
        location: String,
    },
    UpdatingFromOfficial {
        instance_id: String,
        from_version: Version,
        to_version: Version,
    },
    UpdatingFromOverride {
        instance_id: String,
        from_version: Version,
        location: String,
        to_version: Version,
        provenance: SourceProvenance,
    },
    AlreadyUpToDate {
        instance_id: String,
        version: Version,
    },
    UpdateAborted {
        instance_id: String,
    },
    Billing(BillingNotice),
    ParamsReconciled {
        kept: Vec<String>,
        added: Vec<String>,
        reprompted: Vec<String>,
        removed: Vec<String>,
        changed: bool,
    },
    Updating {
        instance_id: String,
    },
    Updated {
        instance_id: String,
        console_url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpdateStage {
    Start,
    SourceResolved,
    WarningsConfirmed,
    IdempotenceAccepted,
    ChangesPresented,
    BillingSatisfied,
    ParamsReconciled,
    Updated,
}

impl UpdateStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SourceResolved => "source-resolved",
            Self::WarningsConfirmed => "warnings-confirmed",
            Self::IdempotenceAccepted => "idempotence-accepted",
            Self::ChangesPresented => "changes-presented",
            Self::BillingSatisfied => "billing-satisfied",
            Self::ParamsReconciled => "params-reconciled",
            Self::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    /// Honors local directory and URL overrides. Off unless the preview is enabled.
    pub allow_override: bool,
    pub console_base_url: String,
}

#[derive(Clone, Copy)]
pub struct UpdateCollaborators<'a> {
    pub store: &'a dyn InstanceStore,
    pub registry: &'a dyn Registry,
    pub sources: &'a dyn SourceBuilder,
    pub billing: &'a dyn BillingService,
    pub operator: &'a dyn Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub project_id: String,
    pub instance_id: String,
    pub override_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedInstance {
    pub instance: ExtensionInstance,
    pub console_url: String,
    pub provenance: SourceProvenance,
    pub params_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Box<UpdatedInstance>),
    Declined,
}

pub struct UpdateWorkflow<'a> {
    collaborators: UpdateCollaborators<'a>,
    settings: UpdateSettings,
    stage: Cell<UpdateStage>,
}

impl<'a> UpdateWorkflow<'a> {
    pub fn new(collaborators: UpdateCollaborators<'a>, settings: UpdateSettings) -> Self {
        Self {
            collaborators,
            settings,
            stage: Cell::new(UpdateStage::Start),
        }
    }

    /// Last stage reached. After a failure this is the stage before the failing step.
    pub fn stage(&self) -> UpdateStage {
        self.stage.get()
    }

    pub fn run(&self, request: &UpdateRequest) -> Result<UpdateOutcome, UpdateError> {
        let UpdateCollaborators {
            store,
            registry,
            sources,
            billing,
            operator,
        } = self.collaborators;
        let project_id = request.project_id.as_str();
        let instance_id = request.instance_id.as_str();
        self.advance(UpdateStage::Start);

        let instance =
            store
                .get(project_id, instance_id)?
                .ok_or_else(|| UpdateError::InstanceNotFound {
                    project_id: project_id.to_string(),
                    instance_id: instance_id.to_string(),
                })?;

        let resolver = SourceResolver::new(registry, sources, self.settings.allow_override);
        let override_location = request.override_location.as_deref();
        if let Some(location) = override_location {
            if resolver.effective_override(Some(location)).is_none() {
                operator.notify(&UpdateNotice::OverrideIgnored {
                    location: location.to_string(),
                });
            }
        }
        let resolved = resolver.resolve(project_id, &instance, override_location)?;
        self.advance(UpdateStage::SourceResolved);

        let current_spec = instance.spec();
        let new_spec = &resolved.source.spec;
        let warnings = match resolved.provenance {
            SourceProvenance::Official => {
                operator.notify(&UpdateNotice::UpdatingFromOfficial {
                    instance_id: instance_id.to_string(),
                    from_version: current_spec.version.clone(),
                    to_version: new_spec.version.clone(),
                });
                resolved
                    .registry_entry
                    .as_ref()
                    .map(|entry| registry_update_warnings(entry, &current_spec.version))
                    .unwrap_or_default()
            }
            provenance @ (SourceProvenance::Local | SourceProvenance::Url) => {
                operator.notify(&UpdateNotice::UpdatingFromOverride {
                    instance_id: instance_id.to_string(),
                    from_version: current_spec.version.clone(),
                    location: resolved.location.clone(),
                    to_version: new_spec.version.clone(),
                    provenance,
                });
                warning_for(provenance, resolved.was_official)
                    .into_iter()
                    .collect()
            }
        };
        self.confirm_warnings(operator, &warnings)?;
        self.advance(UpdateStage::WarningsConfirmed);

        if resolved.provenance == SourceProvenance::Official {
            let decision = check_idempotent(
                operator,
                instance_id,
                &current_spec.version,
                &new_spec.version,
            )?;
            if decision == IdempotenceDecision::Declined {
                operator.notify(&UpdateNotice::UpdateAborted {
                    instance_id: instance_id.to_string(),
                });
                tracing::info!(instance = %instance_id, "re-apply declined; nothing updated");
                return Ok(UpdateOutcome::Declined);
            }
        }
        self.advance(UpdateStage::IdempotenceAccepted);

        present_changes(operator, current_spec, new_spec)?;
        self.advance(UpdateStage::ChangesPresented);

        ensure_billing(
            billing,
            operator,
            project_id,
            instance_id,
            current_spec,
            new_spec,
        )?;
        self.advance(UpdateStage::BillingSatisfied);

        let current_params: &BTreeMap<String, String> = instance.params();
        let reconciliation =
            reconcile_params(operator, project_id, current_spec, new_spec, current_params)?;
        let params_changed = reconciliation.changed_from(current_params);
        operator.notify(&UpdateNotice::ParamsReconciled {
            kept: reconciliation.kept.clone(),
            added: reconciliation.added.clone(),
            reprompted: reconciliation.reprompted.clone(),
            removed: reconciliation.removed.clone(),
            changed: params_changed,
        });
        self.advance(UpdateStage::ParamsReconciled);

        let payload = build_update_payload(
            resolved.source.clone(),
            &reconciliation.params,
            current_params,
        );
        operator.notify(&UpdateNotice::Updating {
            instance_id: instance_id.to_string(),
        });
        let updated = execute_update(store, project_id, instance_id, &payload)?;
        self.advance(UpdateStage::Updated);

        let console_url = console_url(&self.settings.console_base_url, project_id, instance_id);
        operator.notify(&UpdateNotice::Updated {
            instance_id: instance_id.to_string(),
            console_url: console_url.clone(),
        });

        Ok(UpdateOutcome::Updated(Box::new(UpdatedInstance {
            instance: updated,
            console_url,
            provenance: resolved.provenance,
            params_changed,
        })))
    }

    fn confirm_warnings(
        &self,
        operator: &dyn Operator,
        warnings: &[UpdateWarning],
    ) -> Result<(), UpdateError> {
        for warning in warnings {
            if !operator.confirm_warning(warning)? {
                tracing::debug!("operator declined an update warning");
                return Err(UpdateError::Cancelled);
            }
        }
        Ok(())
    }

    fn advance(&self, stage: UpdateStage) {
        tracing::debug!(from = self.stage.get().as_str(), to = stage.as_str(), "update stage");
        self.stage.set(stage);
    }
}
