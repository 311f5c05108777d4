#![forbid(unsafe_code)]

pub mod api;
pub mod app;
pub mod audit;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod identity_http;
pub mod index;
pub mod kv;
pub mod models;
pub mod observability;
pub mod officers;
pub mod persons;
pub mod reports;
pub mod resolver;
pub mod roster;
pub mod runtime;
pub mod session;
pub mod storage;
