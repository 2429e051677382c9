//! Core data types for the modwire resolver.
//!
//! This crate defines what the resolver consumes and produces: versions and
//! version ranges, attribute maps and filter match expressions, modules with
//! their requirements and capabilities, committed wires, the execution
//! environment, resolver configuration, and the catalog collaborator that owns
//! module metadata between resolutions.
//!
//! This crate is intentionally free of resolution logic.

pub mod attrs;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod environment;
pub mod filter;
pub mod module;
pub mod outcome;
pub mod requirement;
pub mod version;
pub mod wiring;
