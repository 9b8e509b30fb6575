//! Guardian authority: who may halt the feed and manage the guardian set.

pub mod registry;

pub use registry::{EmptyGuardianSet, GuardianRegistry};
