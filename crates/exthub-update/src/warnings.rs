use exthub_registry::RegistryEntry;
use semver::Version;

use crate::resolve::SourceProvenance;

/// Text the operator must acknowledge before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateWarning {
    pub description: String,
}

const URL_OVERWRITE: &str = "All the instance's extension-specific resources and logic will be \
     overwritten to use the source code and files from the URL.";
const URL_IRREVERSIBLE: &str = "After updating from a URL source, this instance cannot be updated \
     in the future to use an official source.";
const LOCAL_OVERWRITE: &str = "All the instance's extension-specific resources and logic will be \
     overwritten to use the source code and files from the local directory.";
const LOCAL_IRREVERSIBLE: &str = "After updating from a local source, this instance cannot be \
     updated in the future to use an official source.";

/// Blocking warning for an update path. The official path has none; its
/// notice is informational and reported separately.
pub fn warning_for(provenance: SourceProvenance, was_official: bool) -> Option<UpdateWarning> {
    let (overwrite, irreversible) = match provenance {
        SourceProvenance::Official => return None,
        SourceProvenance::Url => (URL_OVERWRITE, URL_IRREVERSIBLE),
        SourceProvenance::Local => (LOCAL_OVERWRITE, LOCAL_IRREVERSIBLE),
    };

    // Leaving an already non-official source changes nothing about reversibility.
    let description = if was_official {
        format!("{overwrite}\n\n{irreversible}")
    } else {
        overwrite.to_string()
    };
    Some(UpdateWarning { description })
}

/// Publisher-declared warnings that apply when updating away from `current`.
pub fn registry_update_warnings(entry: &RegistryEntry, current: &Version) -> Vec<UpdateWarning> {
    entry
        .warnings_for(current)
        .into_iter()
        .map(|warning| {
            let description = match &warning.action {
                Some(action) => format!("{}\n\n{action}", warning.description),
                None => warning.description.clone(),
            };
            UpdateWarning { description }
        })
        .collect()
}
