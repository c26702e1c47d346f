//! HTTP API module.
//!
//! Browser-facing endpoints: the streaming `/chat` relay plus thin
//! pass-throughs for backend statistics.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
