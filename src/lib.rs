//! Tierserve - HTTP file server with a two-tier object store
//!
//! Core library: the HTTP connection state machine, the worker dispatch
//! pool and the storage index.

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod metrics;
pub mod server;
pub mod storage;
