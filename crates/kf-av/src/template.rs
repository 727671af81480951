//! Variable substitution for renderer argument templates.

use std::collections::HashMap;
use std::path::Path;

/// Variable substitution context for command templates.
///
/// Supports variable substitution in strings using the `{varname}` syntax.
/// Unknown variables are left in place.
///
/// # Example
///
/// ```
/// use kf_av::TemplateContext;
/// use std::path::Path;
///
/// let ctx = TemplateContext::new()
///     .with_paths(
///         Path::new("/tmp/kwzforge_x/input_1.kwz"),
///         Path::new("/tmp/kwzforge_x/silent_1.mp4"),
///         Path::new("/tmp/kwzforge_x"),
///     )
///     .with_var("track", "0");
///
/// assert_eq!(ctx.substitute("{input}"), "/tmp/kwzforge_x/input_1.kwz");
/// assert_eq!(ctx.substitute("--track={track}"), "--track=0");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty template context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stage path variables:
    /// - `{input}` - the persisted source artifact
    /// - `{output}` - where the stage must write its artifact
    /// - `{workspace}` - the job workspace directory
    pub fn with_paths(mut self, input: &Path, output: &Path, workspace: &Path) -> Self {
        self.set("input", &input.display().to_string());
        self.set("output", &output.display().to_string());
        self.set("workspace", &workspace.display().to_string());
        self
    }

    /// Add a custom variable.
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    /// Set a variable.
    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    /// Get a variable value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|s| s.as_str())
    }

    /// Substitute variables in a string.
    ///
    /// The template is scanned once, left to right. Substituted values are
    /// copied verbatim and never rescanned, so a path containing `{output}`
    /// stays as it is.
    pub fn substitute(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after
                .find('}')
                .and_then(|close| self.get(&after[..close]).map(|v| (v, close)));
            match value {
                Some((value, close)) => {
                    result.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    result.push('{');
                    rest = after;
                }
            }
        }
        result.push_str(rest);
        result
    }

    /// Substitute variables in a list of strings.
    pub fn substitute_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.substitute(t)).collect()
    }
}
