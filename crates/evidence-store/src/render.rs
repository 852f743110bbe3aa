//! Markdown rendering hook for evidence entering `ready/`
//!
//! The renderer itself lives outside this crate. Conversion is best-effort:
//! a failed render leaves the markdown in place as the submittable fallback.

use std::path::{Path, PathBuf};

use evidence_core::Result;
use tracing::{info, warn};

use crate::fs::read_dir_or_empty;

pub trait DocumentRenderer: Send + Sync {
    /// Extension of rendered output, without the dot ("pdf")
    fn extension(&self) -> &str;

    fn render(&self, input: &Path, output: &Path, title: &str, subject: &str) -> Result<()>;
}

/// Render every markdown file in `dir` whose output is missing or stale.
/// Returns the names of files that were rendered.
pub(crate) fn render_markdown_in(
    renderer: &dyn DocumentRenderer,
    dir: &Path,
    task_ref: &str,
    window: &str,
) -> Vec<String> {
    let entries = match read_dir_or_empty(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "markdown conversion skipped");
            return Vec::new();
        }
    };

    let subject = format!("Evidence for {task_ref} - {window}");
    let mut rendered = Vec::new();
    for entry in entries {
        let input = entry.path();
        let is_markdown = input.extension().is_some_and(|ext| ext == "md");
        if !is_markdown || !input.is_file() {
            continue;
        }
        let output = output_path(&input, renderer.extension());
        if is_up_to_date(&input, &output) {
            continue;
        }
        let title = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match renderer.render(&input, &output, &title, &subject) {
            Ok(()) => {
                info!(input = %input.display(), output = %output.display(), "rendered evidence");
                rendered.push(entry.file_name().to_string_lossy().into_owned());
            }
            Err(err) => warn!(input = %input.display(), error = %err, "render failed, keeping markdown"),
        }
    }
    rendered
}

fn output_path(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension)
}

/// Output exists and is newer than its source.
fn is_up_to_date(input: &Path, output: &Path) -> bool {
    let modified = |p: &Path| p.metadata().and_then(|m| m.modified()).ok();
    match (modified(input), modified(output)) {
        (Some(src), Some(out)) => out > src,
        _ => false,
    }
}
