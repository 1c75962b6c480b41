pub mod dates;
pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::AuthorizationStatus;
pub use error::CoreError;
pub use structs::{Authorization, MeteringPoint, Reading, ReadingKey};
