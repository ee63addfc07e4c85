//! Controller layer: parsed commands and their dispatch onto the session.

pub mod commands;
pub mod orchestration;
