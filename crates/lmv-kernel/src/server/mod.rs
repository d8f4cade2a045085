mod error;
mod health;
mod router;
mod state;

pub use error::ApiError;
pub use router::system_router;
pub use state::{ApiState, ApiStateBuilder, ApiStateError};
