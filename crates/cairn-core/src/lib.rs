//! Core data types for the Cairn build planner.
//!
//! This crate defines the fundamental types that represent a recipe
//! repository: package recipes with their versions, variants, conditional
//! dependencies, conflicts, and flag rules; version ordering and range
//! matching; the constraint predicate language; compiler selections; and
//! the read-only recipe registry handed to the resolver.
//!
//! This crate performs filesystem I/O only when loading recipes at startup.
//! Everything consumed during resolution is pure data.

pub mod compiler;
pub mod errors;
pub mod predicate;
pub mod recipe;
pub mod registry;
pub mod version;
