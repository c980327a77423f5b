

pub mod config;
pub mod error;
pub mod events;

pub use config::{StoreBackend, TeamspaceConfig};
pub use error::{Result, TeamspaceError};
pub use events::{Event, EventBus, EventHandler};
