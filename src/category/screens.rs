//! Screens: one folder per screen definition inside the screen folder tree.
//!
//! A screen folder holds its four load scripts, a `Buttons` folder with one file
//! per action, and the screen's rows from the definition tables as JSON.

use super::{ArtifactSet, array, id, matching, object, safe_name, text, walk_folders};
use crate::error::CategoryError;
use serde_json::Value;
use std::path::Path;

/// Script members of a screen definition and the files they are written to
const LOAD_SCRIPTS: [(&str, &str); 4] = [
    ("creation_script", "Creation script.crmscript"),
    (
        "load_script_body",
        "Loading script (before setFromCgi).crmscript",
    ),
    (
        "load_post_cgi_script_body",
        "Loading script (after setFromCgi).crmscript",
    ),
    (
        "load_final_script_body",
        "Load script (run after everything else).crmscript",
    ),
];

struct ScreenTables<'a> {
    definitions: &'a [Value],
    actions: &'a [Value],
    elements: &'a [Value],
    item_config: &'a [Value],
    hidden: &'a [Value],
    language: &'a [Value],
}

pub(super) fn render(group: &Value) -> Result<ArtifactSet, CategoryError> {
    let folders = array(group, "screen_folders")?;
    let tables = ScreenTables {
        definitions: array(group, "screen_definition")?,
        actions: array(group, "screen_definition_action")?,
        elements: array(group, "screen_definition_element")?,
        item_config: array(group, "item_config")?,
        hidden: array(group, "screen_definition_hidden")?,
        language: array(group, "screen_definition_language")?,
    };
    let mut artifacts = ArtifactSet::new();

    walk_folders(folders, &mut artifacts, |dir, folder_id, artifacts| {
        for screen in matching(tables.definitions, "hierarchy_id", Some(folder_id)) {
            render_screen(dir, screen, &tables, artifacts)?;
        }
        Ok(())
    })?;

    Ok(artifacts)
}

fn render_screen(
    dir: &Path,
    screen: &Value,
    tables: &ScreenTables<'_>,
    artifacts: &mut ArtifactSet,
) -> Result<(), CategoryError> {
    let screen_dir = dir.join(safe_name(&format!("(Screen) {}", text(screen, "name"))));
    let screen_id = id(screen, "id");
    artifacts.add_dir(screen_dir.clone());

    for (key, file_name) in LOAD_SCRIPTS {
        artifacts.add_script(screen_dir.join(file_name), &text(screen, key));
    }

    let buttons_dir = screen_dir.join("Buttons");
    artifacts.add_dir(buttons_dir.clone());
    for action in matching(tables.actions, "screen_definition", screen_id) {
        let file_name = safe_name(&format!("{}.crmscript", text(action, "button")));
        artifacts.add_script(buttons_dir.join(file_name), &text(action, "ejscript_body"));
    }

    let mut definition = object(screen, "screen definition")?;
    for (key, _) in LOAD_SCRIPTS {
        definition.remove(key);
    }
    artifacts.add_json(screen_dir.join("screen_definition.json"), &definition)?;

    let mut elements = Vec::new();
    for element in matching(tables.elements, "screen_definition", screen_id) {
        let mut element_map = object(element, "screen element")?;
        let config: Vec<Value> = matching(tables.item_config, "item_id", id(element, "id"))
            .cloned()
            .collect();
        element_map.insert("item_config".to_string(), Value::Array(config));
        elements.push(Value::Object(element_map));
    }
    artifacts.add_json(
        screen_dir.join("screen_definition_element.json"),
        &elements,
    )?;

    let hidden: Vec<&Value> = matching(tables.hidden, "screen_definition", screen_id).collect();
    artifacts.add_json(screen_dir.join("screen_definition_hidden.json"), &hidden)?;

    let language: Vec<&Value> =
        matching(tables.language, "screen_definition", screen_id).collect();
    artifacts.add_json(
        screen_dir.join("screen_definition_language.json"),
        &language,
    )?;

    Ok(())
}
