//! Core business logic module
//!
//! This module provides the application layer including:
//! - Book service (CRUD, ownership checks, rating aggregation)
//! - Cover image ingestion and storage
//! - Configuration management
//! - Structured logging system
//! - Error handling and type system

pub mod config;
pub mod error;
pub mod images;
pub mod logging;
pub mod services;

pub use config::Config;
pub use error::{ErrorResponse, GrimoireError, Result};
pub use images::{ImageStore, ImageUpload};
pub use logging::Logger;
pub use services::BookService;
