pub mod api;
pub mod auth;
pub mod certificate;
pub mod config;
pub mod conversation;
pub mod error;
pub mod models;
pub mod quiz;
pub mod seed;
pub mod storage;
pub mod utils;
pub mod vocabulary;
