//! dbchat core library: REST clients, session, conversation state, routing,
//! and the standard-query catalog shared by the CLI and desktop applications.

pub mod api;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod history;
pub mod models;
pub mod render;
pub mod routing;
pub mod session;
