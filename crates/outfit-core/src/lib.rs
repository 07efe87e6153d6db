//! `outfit-core`: domain model and session state for the outfit client.
//!
//! Nothing in this crate touches the network. It defines the records the
//! backend exchanges (analyses, products, saved looks, users), the cache key
//! model the query layer addresses them by, the [`session::Session`] holder
//! for the bearer token, and configuration.

pub mod analysis;
pub mod commerce;
pub mod config;
pub mod error;
pub mod guard;
pub mod io;
pub mod keys;
pub mod paths;
pub mod product;
pub mod saved_look;
pub mod session;
pub mod types;
pub mod user;

pub use error::{CoreError, Result};
