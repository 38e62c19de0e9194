//! Extra tables: a folder tree of table definitions plus one file per built-in domain.

use super::{ArtifactSet, array, id, matching, safe_name, text, walk_folders};
use crate::error::CategoryError;
use serde_json::{Value, json};

/// Built-in tables that can carry extra fields, keyed by their domain id
const BUILT_IN_DOMAINS: [(i64, &str); 8] = [
    (1, "Contact"),
    (2, "Company"),
    (4, "Request"),
    (8, "Message"),
    (32, "User"),
    (64, "Category"),
    (128, "FAQ entry"),
    (256, "FAQ category"),
];

pub(super) fn render(group: &Value) -> Result<ArtifactSet, CategoryError> {
    let folders = array(group, "extra_table_folders")?;
    let tables = array(group, "extra_tables")?;
    let fields = array(group, "extra_fields")?;
    let mut artifacts = ArtifactSet::new();

    walk_folders(folders, &mut artifacts, |dir, folder_id, artifacts| {
        for table in matching(tables, "hierarchy_id", Some(folder_id)) {
            let table_fields: Vec<&Value> =
                matching(fields, "extra_table", id(table, "id")).collect();
            let file_name = safe_name(&format!("{}.json", text(table, "name")));
            artifacts.add_json(
                dir.join(file_name),
                &json!({"extra_table": table, "extra_fields": table_fields}),
            )?;
        }
        Ok(())
    })?;

    for (domain, name) in BUILT_IN_DOMAINS {
        let domain_fields: Vec<&Value> = matching(fields, "domain", Some(domain)).collect();
        artifacts.add_json(
            format!("{name}.json"),
            &json!({"extra_fields": domain_fields}),
        )?;
    }

    Ok(artifacts)
}
