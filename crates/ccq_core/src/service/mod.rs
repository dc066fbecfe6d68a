//! Core use-case services.
//!
//! # Responsibility
//! - Turn repository calls into the two use-cases of the tool: quoting and
//!   refreshing.
//! - Keep the CLI decoupled from storage and transport details.

pub mod quote_service;
pub mod refresh_service;
