//! # Rendering Module
//!
//! Turns a completed record into a self-contained HTML page. Every value
//! coming from the user or the metadata service is escaped before it is
//! interpolated.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::dialogue::Record;
use crate::flows::{FIELD_DESCRIPTION, FIELD_IMAGE_URL, FIELD_LINKS, FIELD_TITLE};
use crate::metadata::MovieMetadata;

/// Longest file stem produced by [`document_file_name`]
pub const MAX_FILE_STEM: usize = 64;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern should be valid"));
static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("file name pattern should be valid"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("record is missing field '{0}'")]
    MissingField(String),
}

/// Data for a recipe page
#[derive(Debug, Clone)]
pub struct RecipeDocument {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub generated_at: DateTime<Utc>,
}

impl RecipeDocument {
    pub fn from_record(record: &Record) -> Result<Self, RenderError> {
        Ok(Self {
            title: required(record, FIELD_TITLE)?,
            description: required(record, FIELD_DESCRIPTION)?,
            image_url: required(record, FIELD_IMAGE_URL)?,
            generated_at: Utc::now(),
        })
    }
}

/// Data for a movie page
#[derive(Debug, Clone)]
pub struct MovieDocument {
    pub title: String,
    pub links: Vec<String>,
    pub metadata: Option<MovieMetadata>,
    pub generated_at: DateTime<Utc>,
}

impl MovieDocument {
    pub fn from_record(record: &Record) -> Result<Self, RenderError> {
        let links = record
            .list(FIELD_LINKS)
            .ok_or_else(|| RenderError::MissingField(FIELD_LINKS.to_string()))?
            .iter()
            .map(|link| link.trim().to_string())
            .collect();
        Ok(Self {
            title: required(record, FIELD_TITLE)?,
            links,
            metadata: None,
            generated_at: Utc::now(),
        })
    }
}

fn required(record: &Record, field: &str) -> Result<String, RenderError> {
    record
        .field(field)
        .map(|value| value.trim().to_string())
        .ok_or_else(|| RenderError::MissingField(field.to_string()))
}

/// Escape text for use in HTML content and double-quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `Chocolate Cake!` becomes `Chocolate_Cake.html`
pub fn document_file_name(title: &str) -> String {
    let underscored = WHITESPACE.replace_all(title.trim(), "_");
    let cleaned = UNSAFE_FILE_CHARS.replace_all(&underscored, "");
    let stem: String = cleaned.chars().take(MAX_FILE_STEM).collect();
    if stem.trim_matches('_').is_empty() {
        "document.html".to_string()
    } else {
        format!("{stem}.html")
    }
}

fn page(title: &str, description: &str, accent: &str, body: &str, footer: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <meta name="description" content="{description}" />
    <style>
        body {{ font-family: Arial, sans-serif; background-color: #f4f4f4; text-align: center; }}
        #page-container {{ max-width: 800px; margin: 50px auto; padding: 20px; border-radius: 8px; background-color: #fff; }}
        h1 {{ color: {accent}; }}
        h2, h3 {{ color: #ff2200; }}
        p {{ color: #333; }}
        img {{ width: 100%; border-radius: 8px; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ margin: 8px 0; }}
        footer {{ color: #999; font-size: 0.8em; margin-top: 24px; }}
    </style>
</head>
<body>
    <div id="page-container">
{body}
        <footer>{footer}</footer>
    </div>
</body>
</html>
"#
    )
}

pub fn render_recipe(document: &RecipeDocument) -> String {
    let title = escape_html(&document.title);
    let description = escape_html(&document.description);
    let image_url = escape_html(&document.image_url);

    let body = format!(
        r#"        <h1>{title}</h1>
        <img src="{image_url}" alt="{title} Recipe">
        <h2>Recipe Overview</h2>
        <p>{description}</p>"#
    );
    page(
        &format!("{title} Recipe"),
        &description,
        "#ff5722",
        &body,
        &footer(document.generated_at),
    )
}

pub fn render_movie(document: &MovieDocument) -> String {
    let title = escape_html(&document.title);
    let mut body = format!("        <h1>{title}</h1>\n");
    let mut description = title.clone();

    if let Some(metadata) = &document.metadata {
        if let Some(poster) = &metadata.poster {
            body.push_str(&format!(
                "        <img src=\"{}\" alt=\"{title} poster\">\n",
                escape_html(poster)
            ));
        }
        let facts: Vec<String> = [
            ("Year", &metadata.year),
            ("Genre", &metadata.genre),
            ("Director", &metadata.director),
            ("IMDb rating", &metadata.imdb_rating),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_ref()
                .map(|value| format!("<strong>{label}:</strong> {}", escape_html(value)))
        })
        .collect();
        if !facts.is_empty() {
            body.push_str(&format!("        <p>{}</p>\n", facts.join(" &middot; ")));
        }
        if let Some(plot) = &metadata.plot {
            description = escape_html(plot);
            body.push_str("        <h2>Plot</h2>\n");
            body.push_str(&format!("        <p>{description}</p>\n"));
        }
    }

    body.push_str("        <h2>Download Links</h2>\n        <ul>\n");
    for (i, link) in document.links.iter().enumerate() {
        let link = escape_html(link);
        body.push_str(&format!(
            "            <li><a href=\"{link}\" rel=\"noopener noreferrer\">Link {}</a></li>\n",
            i + 1
        ));
    }
    body.push_str("        </ul>");

    page(
        &title,
        &description,
        "#3f51b5",
        &body,
        &footer(document.generated_at),
    )
}

fn footer(generated_at: DateTime<Utc>) -> String {
    format!("Generated on {}", generated_at.format("%Y-%m-%d %H:%M UTC"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(document_file_name("Chocolate Cake"), "Chocolate_Cake.html");
        assert_eq!(document_file_name("  Mom's   Lasagna!  "), "Moms_Lasagna.html");
        assert_eq!(document_file_name("../../etc/passwd"), "etcpasswd.html");
        assert_eq!(document_file_name("???"), "document.html");
        assert_eq!(document_file_name(&"x".repeat(100)).len(), MAX_FILE_STEM + 5);
    }
}
