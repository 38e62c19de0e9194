//! Scripts: a folder tree where every script becomes a body file and a metadata file.

use super::{ArtifactSet, array, matching, object, safe_name, text, walk_folders};
use crate::error::CategoryError;
use serde_json::Value;

pub(super) fn render(group: &Value) -> Result<ArtifactSet, CategoryError> {
    let folders = array(group, "script_folders")?;
    let scripts = array(group, "scripts")?;
    let mut artifacts = ArtifactSet::new();

    walk_folders(folders, &mut artifacts, |dir, folder_id, artifacts| {
        for script in matching(scripts, "hierarchy_id", Some(folder_id)) {
            let stem = safe_name(&text(script, "description"));

            artifacts.add_script(dir.join(format!("{stem}.crmscript")), &text(script, "body"));

            let mut metadata = object(script, "script")?;
            metadata.remove("body");
            artifacts.add_json(dir.join(format!("{stem}.json")), &metadata)?;
        }
        Ok(())
    })?;

    Ok(artifacts)
}
