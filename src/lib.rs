//! # api-model
//!
//! Reconstructs the API structure of compiled Java components from class
//! files, lazily and with per-unit fault isolation.
//!
//! ## Architecture
//!
//! - **classfile**: Pure decoder from class-file bytes to a [`model::Type`]
//! - **model**: Decoded API structure (types, fields, methods, modifiers)
//! - **source**: Byte sources for loose class files, archive members and memory
//! - **type_root**: Lazy, memoized handle on one binary unit
//! - **element**: Component → package → type root tree with parent lookup
//! - **discovery**: Lists the units of a component from configured roots
//! - **locator**: Session cache of components and parallel scans
//! - **config**: Explicit session configuration
//! - **error**: Error kinds and per-unit fault records

pub mod classfile;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod element;
pub mod error;
pub mod locator;
pub mod model;
pub mod source;
pub mod type_root;

#[cfg(test)]
#[path = "../tests/support/classfile.rs"]
pub(crate) mod fixture;
