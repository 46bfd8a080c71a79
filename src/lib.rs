// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod game;
pub mod protocol;
pub mod reaper;
pub mod state;
pub mod types;
pub mod ws;
