//! Bug triage service: classifies incoming bug reports by severity, suggests
//! an assignee and keeps bugs, developers and API keys in SQLite.

pub mod auth;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod store;
