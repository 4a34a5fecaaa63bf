//! Core domain concepts shared across all subdomains.
//!
//! - [`model::ModelIdentity`]: a configured backend model and its role
//! - [`question::Question`]: a validated question to pose to the council
//! - [`selection::ModelSelection`]: the member set and lead for one round
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod model;
pub mod question;
pub mod selection;
pub mod string;
