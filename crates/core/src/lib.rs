//! Core types for chainbase
//!
//! This crate defines what every other layer agrees on:
//! - [`Object`] / [`Oid`]: the record contract and typed ids
//! - [`SecondaryKey`] / [`SecondaryIndices`]: declared unique orderings
//! - [`LayoutDescriptor`]: the persisted schema fingerprint checked on open
//! - [`Error`] / [`Result`]: the crate-wide error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod layout;
pub mod object;
pub mod secondary;

pub use error::{BoxError, Error, Result};
pub use layout::{LayoutDescriptor, REGION_FORMAT_VERSION};
pub use object::{Object, Oid};
pub use secondary::{SecondaryIndex, SecondaryIndices, SecondaryKey, UniqueIndex};
