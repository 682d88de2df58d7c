//! Email body templates.
//!
//! Templates are compiled once with [`MailTemplate`] and applied to an
//! email with [`Email::apply_templates`] before it is sent.
//!
//! ```rust,ignore
//! let html = MailTemplate::parse_html_with_inline_css("welcome.html", &email.css)?;
//! let text = MailTemplate::parse("welcome.txt")?;
//! email.apply_templates(Some(&html), Some(&text), None)?;
//! ```

use handlebars::Handlebars;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::{Email, MailError, Result};

/// Placeholder replaced with the stylesheet before inlining.
pub const STYLES_PLACEHOLDER: &str = "{{styles}}";

/// A compiled Handlebars template.
///
/// Templates named `*.html` or `*.htm` escape HTML in rendered values,
/// others render values verbatim.
#[derive(Debug, Clone)]
pub struct MailTemplate {
    name: String,
    handlebars: Handlebars<'static>,
}

impl MailTemplate {
    /// Compile a template from source.
    pub fn from_str(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let mut handlebars = Handlebars::new();

        let lower = name.to_lowercase();
        if !(lower.ends_with(".html") || lower.ends_with(".htm")) {
            handlebars.register_escape_fn(handlebars::no_escape);
        }

        handlebars.register_template_string(&name, source)?;
        Ok(Self { name, handlebars })
    }

    /// Compile a template file, named after its file name.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = read_template(path)?;
        Self::from_str(file_name(path), &source)
    }

    /// Compile an HTML template file, inlining `css` into its elements.
    ///
    /// The stylesheet replaces the `{{styles}}` placeholder. Without a
    /// placeholder or a stylesheet this is the same as [`Self::parse`].
    pub fn parse_html_with_inline_css(path: impl AsRef<Path>, css: &str) -> Result<Self> {
        let path = path.as_ref();
        let source = read_template(path)?;

        if css.is_empty() || !source.contains(STYLES_PLACEHOLDER) {
            return Self::from_str(file_name(path), &source);
        }

        let inlined = css_inline::inline(&source.replace(STYLES_PLACEHOLDER, css))?;
        debug!(template = %path.display(), "Inlined email stylesheet");

        Self::from_str(file_name(path), &inlined)
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template against `data`.
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        Ok(self.handlebars.render(&self.name, data)?)
    }
}

impl Email {
    /// Render the HTML and text bodies from templates.
    ///
    /// Each template that is given replaces its body. When `data` is `None`
    /// the email itself is the template data, so fields such as `subject`
    /// and `from_name` are available by name.
    pub fn apply_templates(
        &mut self,
        html: Option<&MailTemplate>,
        text: Option<&MailTemplate>,
        data: Option<&serde_json::Value>,
    ) -> Result<()> {
        let data = match data {
            Some(data) => data.clone(),
            None => template_data(&*self)?,
        };

        if let Some(template) = html {
            self.html_content = template.render(&data)?;
        }
        if let Some(template) = text {
            self.plain_text_content = template.render(&data)?;
        }
        Ok(())
    }
}

fn template_data<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| MailError::Template(format!("Failed to build template data: {}", e)))
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| MailError::Template(format!("Failed to read {}: {}", path.display(), e)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
