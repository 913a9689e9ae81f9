pub mod errors;
pub mod events;
pub mod id;

pub use errors::{ConfigError, DuetError};
pub use events::{Event, EventBus};
pub use id::{new_id, PlayerId, SessionId};

pub type Result<T> = std::result::Result<T, DuetError>;
