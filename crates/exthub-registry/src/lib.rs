mod entry;
mod registry_index;

pub use entry::{
    official_source_name, parse_official_source_name, RegistryEntry, RegistryUpdateWarning,
    LATEST_VERSION,
};
pub use registry_index::RegistryIndex;
