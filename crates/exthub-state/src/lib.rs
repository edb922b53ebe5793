use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

mod billing;
mod instances;
mod layout;
mod sources;

pub use billing::{enable_billing, is_billing_enabled, read_billing_state, BillingState};
pub use instances::{apply_instance_update, list_instances, read_instance, write_instance};
pub use layout::{default_state_root, StateLayout};
pub use sources::{create_source_from_location, read_source, uploaded_source_name};

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}
