// Culinair client - library root

pub mod app;
pub mod auth;
pub mod comment_tree;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod push;
pub mod repository;
pub mod rest;
pub mod storage;

pub use app::Culinair;
pub use error::{ClientError, Result};
