pub mod account;
pub mod chat;
pub mod config;
pub mod health;
pub mod keys;
pub mod upload;
