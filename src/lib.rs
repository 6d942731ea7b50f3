//! Image upload pipeline for a property-listing dashboard
//!
//! Building cover photos and unit photo galleries are compressed to
//! web-optimized WebP, uploaded to an S3-compatible object store with
//! transfer progress, and handed back to the owning form as durable public
//! URLs. Failed operations revert the field to its pre-operation state.

pub mod app;
pub mod compress;
pub mod error;
pub mod models;
pub mod slug;
pub mod store;
pub mod uploader;

pub use error::{Error, Result};
