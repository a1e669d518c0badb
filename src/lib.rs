//! Image gallery web application.
//!
//! Uploaded images are written to object storage together with an
//! AI-generated `{title, description}` sidecar, and the index page lists
//! every stored image newest first.

pub mod caption;
pub mod config;
pub mod error;
pub mod gallery;
pub mod keys;
pub mod routes;
pub mod secrets;
pub mod storage;

pub use config::Config;
pub use error::GalleryError;
pub use routes::{router, AppState};
