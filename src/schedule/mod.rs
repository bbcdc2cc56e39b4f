//! Scheduling core: placement rules, the calendar view and the lifecycle
//! service that owns every write. No HTTP in here.

pub mod audit;
pub mod calendar;
pub mod clock;
pub mod error;
pub mod guard;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod service;
pub mod store;
pub mod validation;
