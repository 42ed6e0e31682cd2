//! # Rendering Pipeline
//!
//! Pure text transforms and the PDF step that sit between stored templates and
//! a finished document:
//!
//! - [`import`]: uploaded HTML/DOCX/text → template body with inferred
//!   placeholders.
//! - [`print`]: rendered HTML → layout-safe HTML with page-break markers and the
//!   compact annexure section.
//! - [`pdf`]: prepared HTML → PDF bytes through a pluggable engine.
//!
//! Placeholder extraction and rendering live in `common::placeholder`.

pub mod import;
pub mod pdf;
pub mod print;
