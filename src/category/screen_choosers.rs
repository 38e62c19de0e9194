use super::ArtifactSet;
use super::triggers::render_flat;
use crate::error::CategoryError;
use serde_json::Value;

pub(super) fn render(screen_choosers: &[Value]) -> Result<ArtifactSet, CategoryError> {
    render_flat(screen_choosers, "screen chooser", "Unnamed ScreenChooser")
}
