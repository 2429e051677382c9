//! Module resolution engine: wires module requirements to capabilities,
//! attaches fragments to hosts, picks one version of each singleton and
//! verifies that no module ends up seeing a package from two unrelated
//! suppliers.
//!
//! The entry point is [`resolver::Resolver`]. Everything else is the
//! resolution-time machinery it drives for the duration of one call.

mod constraint;
mod dynamic;
mod eligibility;
mod engine;
mod fragments;
mod grouping;
mod module;
mod search;
mod session;
mod singleton;

pub mod graph;
pub mod hooks;
pub mod index;
pub mod resolver;
