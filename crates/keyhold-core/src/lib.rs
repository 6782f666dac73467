//! Core library for Keyhold.
//!
//! Contains the tenant and vault role model, the membership store contract
//! with in-memory and `PostgreSQL` backends, the authorization guard, and the
//! tenant, vault, credential, user, and authentication services built on top
//! of them. Nothing here knows about HTTP.

pub mod auth;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod guard;
pub mod memory;
pub mod models;
#[cfg(feature = "postgres-backend")]
pub mod postgres;
pub mod role;
pub mod store;
pub mod tenant;
pub mod token;
pub mod user;
pub mod vault;
