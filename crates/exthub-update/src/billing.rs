use exthub_core::ExtensionSpec;

use crate::error::UpdateError;
use crate::ports::{BillingService, Operator};
use crate::workflow::UpdateNotice;

/// Whether the installed version already required billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingFraming {
    NewlyRequired,
    AlreadyRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingNotice {
    pub framing: BillingFraming,
    /// Billing state of the project when the notice was shown.
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingOutcome {
    NotRequired,
    AlreadyEnabled,
    Enabled,
}

/// Makes sure the project can pay for the new version before any
/// parameter is prompted for.
pub fn ensure_billing(
    billing: &dyn BillingService,
    operator: &dyn Operator,
    project_id: &str,
    instance_id: &str,
    current_spec: &ExtensionSpec,
    new_spec: &ExtensionSpec,
) -> Result<BillingOutcome, UpdateError> {
    if !new_spec.billing_required {
        return Ok(BillingOutcome::NotRequired);
    }

    let framing = if current_spec.billing_required {
        BillingFraming::AlreadyRequired
    } else {
        BillingFraming::NewlyRequired
    };
    let enabled = billing.is_enabled(project_id)?;
    operator.notify(&UpdateNotice::Billing(BillingNotice { framing, enabled }));
    if enabled {
        return Ok(BillingOutcome::AlreadyEnabled);
    }

    billing
        .enable(project_id, instance_id)
        .map_err(|source| UpdateError::BillingEnableFailed {
            project_id: project_id.to_string(),
            source,
        })?;
    tracing::info!(project = %project_id, instance = %instance_id, "enabled billing");
    Ok(BillingOutcome::Enabled)
}
