//! Route handlers
//!
//! Handlers stay thin: validate the body, call one service operation, map
//! the result. Every rule lives in the domain services.

pub mod accounts;
pub mod receivables;
pub mod resources;
pub mod health;
