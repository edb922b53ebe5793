use semver::Version;

use crate::error::UpdateError;
use crate::ports::Operator;
use crate::workflow::UpdateNotice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotenceDecision {
    NewVersion,
    Reapply,
    Declined,
}

impl IdempotenceDecision {
    pub fn proceed(self) -> bool {
        !matches!(self, Self::Declined)
    }
}

/// Asks before re-applying a version that is already installed.
pub fn check_idempotent(
    operator: &dyn Operator,
    instance_id: &str,
    current: &Version,
    target: &Version,
) -> Result<IdempotenceDecision, UpdateError> {
    if current != target {
        return Ok(IdempotenceDecision::NewVersion);
    }

    operator.notify(&UpdateNotice::AlreadyUpToDate {
        instance_id: instance_id.to_string(),
        version: current.clone(),
    });
    if operator.confirm_retry(instance_id, current)? {
        Ok(IdempotenceDecision::Reapply)
    } else {
        Ok(IdempotenceDecision::Declined)
    }
}
