//! Shared utilities for the modwire resolver.
//!
//! Holds the cross-cutting fault type used by every other modwire crate.
//! Resolution *failures* are not represented here: they are data attached to
//! modules by the resolver. This crate only covers faults that abort a call.

pub mod errors;
