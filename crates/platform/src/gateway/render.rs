//! Placeholder substitution over a template directory.
//!
//! Every file under the template directory is copied to the same relative
//! path in the output directory with each `{{ name }}` placeholder replaced
//! by the variable of that name. Strings, booleans and numbers render
//! verbatim. Lists and maps render as inline JSON, which is also valid YAML
//! flow syntax.
//!
//! The output directory may hold files the renderer does not own, such as
//! gateway secrets. The files written by a render are listed in a manifest
//! inside the output directory; the next render removes every listed file
//! whose template no longer exists and leaves everything else alone.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, trace};

use perimeter_common::{PerimeterError, PerimeterResult};

use super::traits::ConfigRenderer;

const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

/// Manifest of rendered files, relative to the output directory
pub const RENDER_MANIFEST: &str = ".rendered";

/// File-tree renderer for `{{ name }}` templates
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    placeholder: Regex,
}

impl TemplateRenderer {
    pub fn new() -> PerimeterResult<Self> {
        let placeholder = Regex::new(PLACEHOLDER)
            .map_err(|e| PerimeterError::Render(format!("invalid placeholder pattern: {}", e)))?;
        Ok(Self { placeholder })
    }

    /// Render a single template string
    pub fn render_str(&self, template: &str, variables: &Value) -> PerimeterResult<String> {
        let mut missing = None;

        let rendered = self.placeholder.replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => format_value(value),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(PerimeterError::Render(format!(
                "unknown template variable '{}'",
                name
            ))),
            None => Ok(rendered.into_owned()),
        }
    }

    /// Render `from` into `to`, recording each written path relative to
    /// `root` in `rendered`.
    fn render_dir(
        &self,
        from: &Path,
        to: &Path,
        root: &Path,
        variables: &Value,
        rendered: &mut BTreeSet<PathBuf>,
    ) -> PerimeterResult<()> {
        fs::create_dir_all(to).map_err(|e| render_io(to, e))?;

        let entries = fs::read_dir(from).map_err(|e| render_io(from, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| render_io(from, e))?;
            let source = entry.path();
            let target = to.join(entry.file_name());

            if source.is_dir() {
                self.render_dir(&source, &target, root, variables, rendered)?;
                continue;
            }

            let template = fs::read_to_string(&source).map_err(|e| render_io(&source, e))?;
            let output = self.render_str(&template, variables).map_err(|e| {
                PerimeterError::Render(format!("{}: {}", source.display(), e))
            })?;
            fs::write(&target, output).map_err(|e| render_io(&target, e))?;

            trace!(template = %source.display(), output = %target.display(), "Rendered template");
            if let Ok(relative) = target.strip_prefix(root) {
                rendered.insert(relative.to_path_buf());
            }
        }

        Ok(())
    }

    /// Delete files listed by the previous render that this one did not
    /// produce, then record the new list.
    fn prune(&self, output_dir: &Path, rendered: &BTreeSet<PathBuf>) -> PerimeterResult<usize> {
        let manifest = output_dir.join(RENDER_MANIFEST);

        let previous = match fs::read_to_string(&manifest) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(render_io(&manifest, e)),
        };

        let mut removed = 0;
        for line in previous.lines().filter(|line| !line.is_empty()) {
            let relative = PathBuf::from(line);
            if rendered.contains(&relative) || relative.is_absolute() {
                continue;
            }
            let stale = output_dir.join(&relative);
            match fs::remove_file(&stale) {
                Ok(()) => {
                    debug!(path = %stale.display(), "Removed stale rendered file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(render_io(&stale, e)),
            }
        }

        let listing: String = rendered
            .iter()
            .map(|path| format!("{}\n", path.display()))
            .collect();
        fs::write(&manifest, listing).map_err(|e| render_io(&manifest, e))?;

        Ok(removed)
    }
}

impl ConfigRenderer for TemplateRenderer {
    fn render(
        &self,
        template_dir: &Path,
        output_dir: &Path,
        variables: &Value,
    ) -> PerimeterResult<()> {
        let mut rendered = BTreeSet::new();
        self.render_dir(template_dir, output_dir, output_dir, variables, &mut rendered)?;
        let removed = self.prune(output_dir, &rendered)?;
        debug!(
            template_dir = %template_dir.display(),
            output_dir = %output_dir.display(),
            files = rendered.len(),
            removed,
            "Rendered gateway configuration"
        );
        Ok(())
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn render_io(path: &Path, err: std::io::Error) -> PerimeterError {
    PerimeterError::Render(format!("{}: {}", path.display(), err))
}
