//! Markdown rendering of feed entries
//!
//! Entries are rendered from Jinja-style templates (minijinja). The metadata
//! and highlight templates can be overridden per vault; the page layout is
//! fixed. Block tags swallow their own line so conditional sections leave no
//! blank lines behind.
//!
//! Metadata template variables: `url`, `title`, `author`, `publisher`,
//! `published_date` (`YYYY-MM-DD`), `note`, `tags` (list of names).
//!
//! Highlight template variables: `text`, `note`, `created_date`.

use minijinja::Environment;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Annotation, FeedEntry};

/// Page layout wrapping rendered metadata and highlights
pub const LAYOUT_TEMPLATE: &str = r#"
{{ metadata }}

## Highlights
{{ highlights }}
"#;

/// Default metadata template
pub const METADATA_TEMPLATE: &str = r#"
## Metadata
* URL: [{{ url }}]({{ url }})
{% if author %}
* Author: [[{{ author }}]]
{% endif %}
{% if publisher %}
* Publisher: [[{{ publisher }}]]
{% endif %}
{% if published_date %}
* Published Date: {{ published_date }}
{% endif %}
{% if note %}
* Note: {{ note }}
{% endif %}
{% if tags %}
* Tags: {% for tag in tags %}#{{ tag | replace(' ', '_') }}{% if not loop.last %}, {% endif %}{% endfor %}
{% endif %}
"#;

/// Default highlight template
pub const HIGHLIGHT_TEMPLATE: &str = r#"
* {{ text }}
{% if note %}
  * **Note**: {{ note }}
{% endif %}
"#;

/// Template failure (bad syntax or evaluation error)
#[derive(Error, Debug)]
#[error("Template error in {template} template: {source}")]
pub struct TemplateError {
    /// Which template failed (`metadata`, `highlight` or `layout`)
    pub template: &'static str,
    #[source]
    pub source: minijinja::Error,
}

#[derive(Debug, Serialize)]
struct MetadataContext<'a> {
    url: &'a str,
    title: &'a str,
    author: Option<&'a str>,
    publisher: Option<&'a str>,
    published_date: Option<String>,
    note: Option<&'a str>,
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HighlightContext<'a> {
    text: &'a str,
    note: Option<&'a str>,
    created_date: String,
}

#[derive(Debug, Serialize)]
struct LayoutContext<'a> {
    metadata: &'a str,
    highlights: &'a str,
}

/// Renders entries with the configured templates
pub struct Renderer {
    env: Environment<'static>,
    metadata_template: String,
    highlight_template: String,
}

impl Renderer {
    /// Create a renderer; `None` or blank overrides fall back to the defaults
    pub fn new(metadata_template: Option<&str>, highlight_template: Option<&str>) -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        Self {
            env,
            metadata_template: pick_template(metadata_template, METADATA_TEMPLATE),
            highlight_template: pick_template(highlight_template, HIGHLIGHT_TEMPLATE),
        }
    }

    /// Render a full note for a new entry
    pub fn render_entry(&self, entry: &FeedEntry) -> Result<String, TemplateError> {
        let metadata = self.render_metadata(entry)?;
        let highlights = self.render_annotations(&entry.annotations_in_reading_order())?;

        let ctx = LayoutContext {
            metadata: &metadata,
            highlights: &highlights,
        };
        let rendered = self
            .env
            .render_str(LAYOUT_TEMPLATE, ctx)
            .map_err(|source| TemplateError {
                template: "layout",
                source,
            })?;
        Ok(rendered.trim().to_string())
    }

    /// Render the metadata block
    pub fn render_metadata(&self, entry: &FeedEntry) -> Result<String, TemplateError> {
        let content = &entry.content;
        let ctx = MetadataContext {
            url: &content.url,
            title: &content.title,
            author: content.author_name(),
            publisher: content.publisher_name(),
            published_date: content
                .published_date()
                .map(|d| d.format("%Y-%m-%d").to_string()),
            note: content.note_text(),
            tags: content.tag_names(),
        };

        self.env
            .render_str(&self.metadata_template, ctx)
            .map(|s| s.trim().to_string())
            .map_err(|source| TemplateError {
                template: "metadata",
                source,
            })
    }

    /// Render a single highlight
    pub fn render_annotation(&self, annotation: &Annotation) -> Result<String, TemplateError> {
        let ctx = HighlightContext {
            text: &annotation.text,
            note: annotation.note.as_deref().filter(|n| !n.trim().is_empty()),
            created_date: annotation.created_date.to_rfc3339(),
        };

        self.env
            .render_str(&self.highlight_template, ctx)
            .map(|s| s.trim().to_string())
            .map_err(|source| TemplateError {
                template: "highlight",
                source,
            })
    }

    /// Render highlights in the given order, one block per line group
    pub fn render_annotations(&self, annotations: &[&Annotation]) -> Result<String, TemplateError> {
        let rendered = annotations
            .iter()
            .map(|a| self.render_annotation(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join("\n"))
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(None, None)
    }
}

fn pick_template(custom: Option<&str>, default: &str) -> String {
    match custom {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => default.to_string(),
    }
}
