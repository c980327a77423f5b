

pub mod base;
pub mod bus;

pub use base::{
    Event, EventMetadata, CASCADE_COMPLETED, CASCADE_INCOMPLETE, CASCADE_RACE_DETECTED,
    CASCADE_REJECTED,
};
pub use bus::{EventBus, EventHandler};
