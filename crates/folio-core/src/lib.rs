//! Core types and trait definitions for the Folio content repository.
//!
//! This crate is deliberately free of database and XML dependencies. Storage
//! backends implement [`store::FolioStore`]; validation engines implement
//! [`validate::ContentValidator`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod content;
pub mod error;
pub mod relationship;
pub mod schema;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
