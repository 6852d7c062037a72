//! Request and response bodies
//!
//! Requests are validated with `validator` before they reach a service;
//! amount rules (sign, excess, balance) stay in the domain.

pub mod accounts;
pub mod receivables;
pub mod resources;
