mod billing;
mod changes;
mod error;
mod executor;
mod idempotence;
mod params;
mod ports;
mod resolve;
mod warnings;
mod workflow;

pub use billing::{ensure_billing, BillingFraming, BillingNotice, BillingOutcome};
pub use changes::{diff_specs, present_changes, FieldChange, ResourceChange, SpecChanges};
pub use error::UpdateError;
pub use executor::{build_update_payload, console_url, execute_update, UpdatePayload};
pub use idempotence::{check_idempotent, IdempotenceDecision};
pub use params::{reconcile_params, ParamReconciliation};
pub use ports::{BillingService, InstanceStore, Operator, Registry, SourceBuilder};
pub use resolve::{ResolvedSource, SourceProvenance, SourceResolver};
pub use warnings::{registry_update_warnings, warning_for, UpdateWarning};
pub use workflow::{
    UpdateNotice, UpdateOutcome, UpdateRequest, UpdateSettings, UpdateStage, UpdateWorkflow,
    UpdatedInstance, UpdateCollaborators,
};
