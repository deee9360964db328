//! Library crate for kana-clash: game rules, the reconciling room client and the store host,
//! exposed for the binaries and integration tests.

pub mod client;
pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
