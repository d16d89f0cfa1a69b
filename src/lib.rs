pub mod api;
pub mod auth;
pub mod config;
pub mod key;
pub mod link_repo;
pub mod link_service;
mod orm;
