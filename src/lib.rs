// ABOUTME: Public library API for the Pocket to Notion exporter
// ABOUTME: Re-exports core modules for the binary and integration tests

pub mod api;
pub mod auth;
pub mod callback;
pub mod cli;
pub mod clipper;
pub mod convert;
pub mod error;
pub mod filter;
pub mod model;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use filter::Filter;
pub use model::{Clipping, Credential, SavedItem};
