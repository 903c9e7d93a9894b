//! Web dashboard for browsing and editing bugs.
//!
//! Serves server-rendered pages plus a small JSON API. When the store is
//! unreachable the dashboard stays up, shows sample data with a guidance
//! banner, and refuses writes.

#[cfg(feature = "gui")]
mod server;
#[cfg(feature = "gui")]
mod views;

#[cfg(feature = "gui")]
pub use server::{AppState, DEFAULT_PORT, build_router, start_server};
