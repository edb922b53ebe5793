mod instance;
mod params;
mod spec;

pub use instance::{
    is_url_location, validate_instance_id, ExtensionInstance, InstanceConfig, SourceRef,
};
pub use params::{ParamDefinition, ParamOption, ParamType};
pub use spec::{
    validate_extension_name, ExtensionApi, ExtensionResource, ExtensionRole, ExtensionSpec,
};
