pub mod app;
pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod provider;
pub mod state;
pub mod users;
pub mod validators;
