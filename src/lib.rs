//! Faultline Library
//!
//! Core functionality for the programmable HTTP fault-injection and
//! observability server. This library can be embedded in other
//! applications.

pub mod config;
pub mod error;
pub mod history;
pub mod observer;
pub mod server;
pub mod stats;

pub use config::Config;
pub use error::{Error, Result};
pub use server::FaultServer;
