#![forbid(unsafe_code)]

pub mod checklist;
pub mod gating;
pub mod session;
pub mod state;
