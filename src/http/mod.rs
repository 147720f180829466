//! HTTP drain surface (C5): the narrow API the upstream cloud drainer
//! polls to pull punches and acknowledge them.

pub mod auth;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
