//! The fetcher script template.

use crate::error::{Error, Result};

use super::CrmscriptFetcher;

/// File names the template is looked up under, in order
const SCRIPT_FILE_NAMES: [&str; 2] = ["crmscript_fetcher.crmscript", "CRMScript Fetcher.crmscript"];

impl CrmscriptFetcher {
    /// Text of the CRMScript that has to be installed on a tenant to serve fetches
    ///
    /// # Errors
    /// [`Error::Io`] if no template exists in the configured `script_dir` or it
    /// cannot be read.
    pub async fn fetcher_script(&self) -> Result<String> {
        let dir = &self.config.script_dir;

        for name in SCRIPT_FILE_NAMES {
            let path = dir.join(name);
            match tokio::fs::read_to_string(&path).await {
                Ok(script) => return Ok(script),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to read fetcher script '{}': {}", path.display(), e),
                    )));
                }
            }
        }

        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!(
                "fetcher script not found in '{}', expected a file named \"{}\"",
                dir.display(),
                SCRIPT_FILE_NAMES[0]
            ),
        )))
    }
}
