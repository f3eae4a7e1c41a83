pub mod error;
pub mod types;

pub use error::{
    BatchError, CommitError, ConfigError, InvariantViolation, PublishError, StoreError,
    StoreResult, SubmitError,
};
pub use types::{ActorId, HandId, SeatNo, TableId, Timestamp};
