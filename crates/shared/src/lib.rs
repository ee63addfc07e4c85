//! Identifiers, domain types, and wire payloads shared between the session
//! controller and the terminal front end.

pub mod domain;
pub mod error;
pub mod protocol;
