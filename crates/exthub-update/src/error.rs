//! Classified failures of the update workflow.
//!
//! Collaborators report failures as `anyhow::Error`. Converting one into an
//! [`UpdateError`] recovers an already classified error instead of wrapping it
//! a second time, so every failure is classified exactly once.

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("no extension instance {instance_id} found in project {project_id}")]
    InstanceNotFound {
        project_id: String,
        instance_id: String,
    },

    #[error(
        "unable to update from the source `{location}`. To update this instance, you can either:\n  \
         - run `exthub update {instance_id}` to update from the official source\n  \
         - check your directory path or URL, then run \
         `exthub update {instance_id} <local-directory-or-url>`"
    )]
    InvalidOverrideSource {
        instance_id: String,
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "unable to update this instance without a local or URL source. To update this instance, \
         run `exthub update {instance_id} <local-directory-or-url>`"
    )]
    NoLocalOrUrlSource { instance_id: String },

    #[error("failed to enable billing for project {project_id}")]
    BillingEnableFailed {
        project_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("update cancelled")]
    Cancelled,

    #[error("error occurred while updating the instance: {message}")]
    UpdateFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl UpdateError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InstanceNotFound { .. }
            | Self::InvalidOverrideSource { .. }
            | Self::NoLocalOrUrlSource { .. }
            | Self::BillingEnableFailed { .. }
            | Self::Cancelled
            | Self::UpdateFailed { .. } => 1,
        }
    }
}

impl From<anyhow::Error> for UpdateError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<UpdateError>() {
            Ok(classified) => classified,
            Err(err) => Self::UpdateFailed {
                message: err.to_string(),
                source: err,
            },
        }
    }
}
