//! Presentation of the generated HTML: preview and download.
//!
//! The model's output is untrusted. The preview puts it in a sandboxed
//! `<iframe srcdoc>` (no `allow-scripts`) and can additionally strip scripts
//! from that copy. The download is always the generated string, byte for
//! byte.

use crate::error::Pdf2HtmlError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// File name offered for the download.
pub const DOWNLOAD_FILE_NAME: &str = "converted_datasheet.html";

/// Media type of the download.
pub const MEDIA_TYPE: &str = "text/html";

static RE_SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap());
static RE_SCRIPT_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<script\b[^>]*>").unwrap());
static RE_EVENT_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?P<tag><[a-z][^>]*?)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});
static RE_JS_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)(href|src)\s*=\s*(["']?)\s*javascript:[^"'\s>]*"#).unwrap());

/// The generated page, ready to preview or save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlArtifact {
    html: String,
}

impl HtmlArtifact {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }

    /// Download payload: exactly the generated text.
    pub fn bytes(&self) -> &[u8] {
        self.html.as_bytes()
    }

    pub fn file_name(&self) -> &'static str {
        DOWNLOAD_FILE_NAME
    }

    pub fn media_type(&self) -> &'static str {
        MEDIA_TYPE
    }

    pub fn into_string(self) -> String {
        self.html
    }

    /// Write the download payload atomically (temp file in the same
    /// directory, then rename).
    pub fn write_to(&self, path: &Path) -> Result<(), Pdf2HtmlError> {
        let fail = |source: std::io::Error| Pdf2HtmlError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
        tmp.write_all(self.bytes()).map_err(fail)?;
        tmp.flush().map_err(fail)?;
        tmp.persist(path).map_err(|e| fail(e.error))?;
        debug!("Wrote {} bytes to {}", self.html.len(), path.display());
        Ok(())
    }

    /// An `<iframe>` showing the page at a fixed height with scrolling.
    pub fn preview_frame(&self, height_px: u32, strip: bool) -> String {
        let body = if strip {
            strip_scripts(&self.html)
        } else {
            self.html.clone()
        };
        format!(
            "<iframe class=\"preview\" title=\"Generated HTML Preview\" sandbox=\"allow-same-origin\" \
             scrolling=\"yes\" style=\"width:100%; height:{height_px}px; border:1px solid #ccc; overflow:auto;\" \
             srcdoc=\"{}\"></iframe>",
            escape_attr(&body)
        )
    }

    /// A `data:` URI of the download payload, for a link with a
    /// `download` attribute.
    pub fn download_data_uri(&self) -> String {
        format!("data:{};base64,{}", MEDIA_TYPE, STANDARD.encode(self.bytes()))
    }

    /// A standalone result page: summary, preview and download link.
    pub fn preview_page(&self, summary: &str, height_px: u32, strip: bool) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>PDF → Structured HTML</title>
<style>
body {{ font-family: system-ui, sans-serif; margin: 24px; }}
.summary {{ padding: 8px 12px; background: #e8f5e9; border-radius: 4px; }}
.download {{ display: inline-block; margin-top: 12px; padding: 8px 14px; background: #1565c0; color: #fff; text-decoration: none; border-radius: 4px; }}
</style>
</head>
<body>
<h1>PDF → Structured HTML</h1>
<p class="summary">{summary}</p>
<h2>Generated HTML Preview</h2>
{frame}
<p><a class="download" href="{href}" download="{file}">Download HTML file</a></p>
</body>
</html>
"#,
            summary = escape_text(summary),
            frame = self.preview_frame(height_px, strip),
            href = self.download_data_uri(),
            file = DOWNLOAD_FILE_NAME,
        )
    }
}

/// Remove script elements, inline event handlers and `javascript:` URLs.
///
/// Applied to preview copies only.
pub fn strip_scripts(html: &str) -> String {
    let out = RE_SCRIPT_BLOCK.replace_all(html, "");
    // An unterminated <script> would still swallow the rest of the page.
    let out = RE_SCRIPT_OPEN.replace_all(&out, "");
    // One handler per tag comes off each pass.
    let mut out = out.into_owned();
    loop {
        let next = RE_EVENT_ATTR.replace_all(&out, "${tag}").into_owned();
        if next == out {
            break;
        }
        out = next;
    }
    RE_JS_URL.replace_all(&out, "$1=$2#").into_owned()
}

/// Escape text for a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for element content.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
