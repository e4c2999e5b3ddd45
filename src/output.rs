use anyhow::{bail, Context, Result};
use arboard::Clipboard;
use std::fs;
use std::path::Path;

/// Copies or exports the result text. The clipboard is opened lazily so headless
/// sessions can still export.
#[derive(Default)]
pub struct OutputHandler {
    clipboard: Option<Clipboard>,
}

impl OutputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            bail!("There is no result to copy");
        }

        if self.clipboard.is_none() {
            self.clipboard = Some(Clipboard::new().context("Clipboard is not available")?);
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard.set_text(text.to_string())?;
        }
        log::info!("Copied {} characters to clipboard", text.chars().count());
        Ok(())
    }

    pub fn export_to_file(&self, path: &Path, text: &str) -> Result<()> {
        if text.is_empty() {
            bail!("There is no result to export");
        }

        fs::write(path, text).with_context(|| format!("Failed to export to {}", path.display()))?;
        log::info!("Exported result to {:?}", path);
        Ok(())
    }
}
