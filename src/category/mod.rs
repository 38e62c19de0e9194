//! Per-category rendering of remote payloads into local artifacts.
//!
//! Each [`Category`] has exactly one strategy that turns its JSON group into an
//! [`ArtifactSet`]:
//! - [`scripts`] - Script folders, `.crmscript` bodies plus metadata
//! - [`triggers`] - Event triggers
//! - [`screens`] - Screen definitions with load scripts, buttons and element tables
//! - [`screen_choosers`] - Screen chooser scripts
//! - [`scheduled_tasks`] - Scheduled tasks with their schedule embedded
//! - [`extra_tables`] - Extra tables, extra fields and built-in domain fields
//!
//! Rendering is pure: the same payload always produces the same artifact set,
//! which is what makes repeated fetches byte-identical on disk.

mod extra_tables;
mod scheduled_tasks;
mod screen_choosers;
mod screens;
mod scripts;
mod triggers;

use crate::error::CategoryError;
use crate::remote::{RemotePayload, RemoteSource, TenantCredentials};
use crate::types::Category;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Newest fetcher script version this crate knows how to render
pub const CURRENT_SCRIPT_VERSION: u32 = 2;

/// Parent id of folders placed directly in a category's root directory
const ROOT_FOLDER_ID: i64 = -1;

/// Rendered files (and directories) for one category, keyed by path relative to
/// the category directory
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

impl ArtifactSet {
    /// Create an empty artifact set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory, even if no file ends up inside it
    pub fn add_dir(&mut self, path: impl Into<PathBuf>) {
        self.dirs.insert(path.into());
    }

    /// Add a raw file
    ///
    /// A later file with the same path replaces the earlier one, with a warning.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, contents: Vec<u8>) {
        let path = path.into();
        if self.files.contains_key(&path) {
            tracing::warn!(
                path = %path.display(),
                "Artifact path rendered twice, keeping the later file"
            );
        }
        self.files.insert(path, contents);
    }

    /// Add a CRMScript body with line endings normalized to CRLF
    pub fn add_script(&mut self, path: impl Into<PathBuf>, body: &str) {
        self.add_file(path, to_crlf(body).into_bytes());
    }

    /// Add a value as pretty-printed JSON
    pub fn add_json<T: Serialize + ?Sized>(
        &mut self,
        path: impl Into<PathBuf>,
        value: &T,
    ) -> Result<(), CategoryError> {
        let bytes = pretty_json(value)?;
        self.add_file(path, bytes);
        Ok(())
    }

    /// Number of files; this is the artifact count reported per category
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True if no files were rendered
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in path order
    pub fn files(&self) -> impl Iterator<Item = (&Path, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_path(), b.as_slice()))
    }

    /// Explicit directories in path order
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.dirs.iter().map(PathBuf::as_path)
    }

    /// Contents of a single file
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }
}

/// Replace characters that are not allowed in Windows file and folder names
///
/// Names that would address the parent or current directory are prefixed with `_`.
pub fn safe_name(text: &str) -> String {
    const REPLACEMENTS: [(&str, &str); 9] = [
        ("/", "."),
        ("\"", "'"),
        ("\\", ".."),
        (":", " - "),
        ("*", "X"),
        ("<", " Lt "),
        (">", " Gt "),
        ("|", "I"),
        ("?", ""),
    ];

    let mut name = text.to_string();
    for (from, to) in REPLACEMENTS {
        name = name.replace(from, to);
    }

    if name.is_empty() || name == "." || name == ".." {
        name.insert(0, '_');
    }
    name
}

/// Normalize all line endings to CRLF
pub(crate) fn to_crlf(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Serialize with 4-space indentation and sorted object keys, keeping non-ASCII text
pub(crate) fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CategoryError> {
    let value = serde_json::to_value(value)
        .map_err(|e| CategoryError::RemoteFormat(format!("unserializable value: {}", e)))?;
    let value = sort_keys(value);

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| CategoryError::RemoteFormat(format!("unserializable value: {}", e)))?;
    Ok(buf)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Look up a required member of a JSON object
pub(crate) fn member<'a>(value: &'a Value, key: &str) -> Result<&'a Value, CategoryError> {
    value
        .get(key)
        .ok_or_else(|| CategoryError::RemoteFormat(format!("missing '{}'", key)))
}

/// Look up a required array member of a JSON object
pub(crate) fn array<'a>(value: &'a Value, key: &str) -> Result<&'a [Value], CategoryError> {
    member(value, key)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| CategoryError::RemoteFormat(format!("'{}' is not an array", key)))
}

/// Copy an array entry as a JSON object
pub(crate) fn object(value: &Value, what: &str) -> Result<Map<String, Value>, CategoryError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| CategoryError::RemoteFormat(format!("{} entry is not an object", what)))
}

/// Text of a member: strings as-is, numbers and booleans formatted, missing or null empty
pub(crate) fn text(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Integer id of a member; numeric strings are accepted
pub(crate) fn id(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Entries of `items` whose `key` member equals `wanted`
pub(crate) fn matching<'a>(
    items: &'a [Value],
    key: &'a str,
    wanted: Option<i64>,
) -> impl Iterator<Item = &'a Value> + 'a {
    items
        .iter()
        .filter(move |item| wanted.is_some() && id(item, key) == wanted)
}

/// Walk a folder hierarchy, calling `visit(relative_dir, folder_id)` for the root
/// (id -1) and for every folder reachable from it
///
/// Folders are `{id, parent_id, name}` objects. Each folder becomes a directory
/// named after it; folders whose parent chain never reaches the root are skipped.
pub(crate) fn walk_folders<F>(
    folders: &[Value],
    artifacts: &mut ArtifactSet,
    mut visit: F,
) -> Result<(), CategoryError>
where
    F: FnMut(&Path, i64, &mut ArtifactSet) -> Result<(), CategoryError>,
{
    let mut seen = HashSet::new();
    let mut pending = vec![(PathBuf::new(), ROOT_FOLDER_ID)];

    while let Some((dir, folder_id)) = pending.pop() {
        visit(&dir, folder_id, artifacts)?;

        for folder in matching(folders, "parent_id", Some(folder_id)) {
            let Some(child_id) = id(folder, "id") else {
                return Err(CategoryError::RemoteFormat(
                    "folder entry without id".to_string(),
                ));
            };
            // A folder listed twice or a parent cycle would otherwise recurse forever
            if !seen.insert(child_id) {
                continue;
            }
            let child_dir = dir.join(safe_name(&text(folder, "name")));
            artifacts.add_dir(child_dir.clone());
            pending.push((child_dir, child_id));
        }
    }
    Ok(())
}

/// Render one category's group from a remote payload
///
/// Version 1 fetcher scripts return flat `script_folders`, `scripts` and
/// `triggers` keys and know nothing about the other categories. Version 2
/// nests each category under its `group_*` key.
pub fn render(category: Category, payload: &RemotePayload) -> Result<ArtifactSet, CategoryError> {
    let document = &payload.document;
    match payload.script_version {
        1 => match category {
            Category::Scripts => scripts::render(document),
            Category::Triggers => triggers::render(array(document, "triggers")?),
            other => Err(CategoryError::RemoteFormat(format!(
                "{} requires fetcher script version {}",
                other, CURRENT_SCRIPT_VERSION
            ))),
        },
        2 => {
            let group = member(document, category.group_key())?;
            match category {
                Category::Scripts => scripts::render(group),
                Category::Triggers => triggers::render(array(group, "triggers")?),
                Category::Screens => screens::render(group),
                Category::ScreenChoosers => {
                    screen_choosers::render(array(group, "screen_choosers")?)
                }
                Category::ScheduledTasks => scheduled_tasks::render(group),
                Category::ExtraTables => extra_tables::render(group),
            }
        }
        version => Err(CategoryError::RemoteFormat(format!(
            "unsupported fetcher script version {}",
            version
        ))),
    }
}

/// Result of fetching one category
#[derive(Clone, Debug)]
pub struct FetchedCategory {
    /// Rendered artifacts, ready for the local writer
    pub artifacts: ArtifactSet,
    /// Fetcher script version reported by the remote side
    pub script_version: u32,
}

/// Retrieves one category from a tenant and renders it
#[derive(Clone)]
pub struct CategoryFetcher {
    remote: Arc<dyn RemoteSource>,
}

impl CategoryFetcher {
    /// Create a fetcher on top of a remote source
    pub fn new(remote: Arc<dyn RemoteSource>) -> Self {
        Self { remote }
    }

    /// Fetch and render a single category
    ///
    /// Nothing is written here; a malformed group fails with
    /// [`CategoryError::RemoteFormat`] before the writer is involved.
    pub async fn fetch(
        &self,
        credentials: &TenantCredentials,
        category: Category,
    ) -> Result<FetchedCategory, CategoryError> {
        let payload = self.remote.fetch_category(credentials, category).await?;
        let artifacts = render(category, &payload)?;

        tracing::debug!(
            category = %category,
            script_version = payload.script_version,
            artifacts = artifacts.len(),
            "Rendered category"
        );

        Ok(FetchedCategory {
            artifacts,
            script_version: payload.script_version,
        })
    }
}
