//! Pipeline stages for PDF-to-HTML conversion.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ images ──▶ prompt ──▶ llm
//! (bytes)   (pdfium)    (lopdf)    (template) (chat)
//!              │           │
//!     ruling ──▶ table   encode
//!     (lopdf)  (lines) (data URI)
//! ```
//!
//! 1. [`input`]   — load a path, URL or upload into an immutable byte buffer
//! 2. [`extract`] — page text and glyph boxes; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`ruling`]  — horizontal and vertical path segments from content streams
//! 4. [`table`]   — pure geometry: rulings and glyph boxes into ruled tables
//! 5. [`images`]  — embedded image XObjects from the object model
//! 6. [`encode`]  — base64 data URIs and `<img>` tags
//! 7. [`prompt`]  — flatten tables and fill the fixed template
//! 8. [`llm`]     — the one network call, with timeout and retry

pub mod encode;
pub mod extract;
pub mod images;
pub mod input;
pub mod llm;
pub mod prompt;
pub mod ruling;
pub mod table;
