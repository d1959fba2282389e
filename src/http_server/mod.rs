//! # HTTP Server Module
//!
//! axum front end for the engine. All routing happens in the engine; the
//! router only has a fallback handler plus CORS and trace layers.

pub mod config;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
