//! Triggers: a flat list of body and metadata files.

use super::{ArtifactSet, object, safe_name, text};
use crate::error::CategoryError;
use serde_json::Value;

pub(super) fn render(triggers: &[Value]) -> Result<ArtifactSet, CategoryError> {
    render_flat(triggers, "trigger", "Unnamed trigger")
}

/// Shared by triggers and screen choosers, which only differ in the fallback name
pub(super) fn render_flat(
    entries: &[Value],
    what: &str,
    unnamed: &str,
) -> Result<ArtifactSet, CategoryError> {
    let mut artifacts = ArtifactSet::new();

    for entry in entries {
        let mut description = text(entry, "description");
        if description.is_empty() {
            description = format!("{} (ID {})", unnamed, text(entry, "unique_identifier"));
        }
        let stem = safe_name(&description);

        artifacts.add_script(format!("{stem}.crmscript"), &text(entry, "body"));

        let mut metadata = object(entry, what)?;
        metadata.remove("body");
        artifacts.add_json(format!("{stem}.json"), &metadata)?;
    }

    Ok(artifacts)
}
