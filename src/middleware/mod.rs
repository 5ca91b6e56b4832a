mod auth;
mod trace;

pub use auth::{AuthLayer, CurrentUser};
pub use trace::TraceLayer;
