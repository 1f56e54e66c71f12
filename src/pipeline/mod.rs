//! Per-document conversion stages used by the default converter.
//!
//! Each submodule implements exactly one transformation step and is a pure
//! `&str → String` function, so a document can be converted on any worker
//! thread without shared state.
//!
//! ## Data Flow
//!
//! ```text
//! raw HTML ──▶ html ──▶ postprocess ──▶ text
//!            (render)   (cleanup)
//! ```
//!
//! 1. [`html`]        — parse the markup and lay it out as wrapped text,
//!    keeping anchor text and dropping link targets
//! 2. [`postprocess`] — deterministic whitespace/Unicode cleanup so the
//!    output is stable when fed back through the converter

pub mod html;
pub mod postprocess;
