//! Core utilities for gql.
//!
//! This crate provides foundational types used throughout gql:
//! - `span`: Source location tracking
//! - `diagnostics`: Error reporting

pub mod diagnostics;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticSeverity, Label};
pub use span::{LineIndex, Location, Span};
