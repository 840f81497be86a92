//! REST API: routes, handlers, middleware, and the HTTP server

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::ApiServer;
