//! Bridges a parent process to browser clients.
//!
//! JSON values written to stdin, one per line, are pushed to every
//! connected WebSocket client as `avatar_json` events, while a single
//! HTML page is served at `/`.
//!
//! - [`cli`] parses the command-line interface.
//! - [`hub`] owns the broadcast channel, connected-client registry, and
//!   shutdown signal shared by everything else.
//! - [`relay`] turns newline-delimited JSON into broadcasts.
//! - [`server`] hosts the index page and the `/ws` push channel on axum.
//! - [`message`] defines the event envelope and line parsing.

pub mod cli;
pub mod hub;
pub mod message;
pub mod relay;
pub mod server;
