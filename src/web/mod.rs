//! HTTP control API.
//!
//! JSON in and out, camelCase fields. Every handler delegates to the shared
//! [`Supervisor`](crate::supervisor::Supervisor) held in the router state.

mod routes;
mod server;

pub use server::{router, serve, serve_on};
