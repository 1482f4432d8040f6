//! Authentication module
//!
//! This module provides authentication functionality including:
//! - User sign-up and login
//! - JWT token generation and validation
//! - Password hashing and verification
//! - Authentication middleware

pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;

pub use handlers::{login, signup};
pub use jwt::{generate_token, validate_token, Claims};
pub use middleware::{authenticate, AuthUser};
pub use password::{hash_password, verify_password};
