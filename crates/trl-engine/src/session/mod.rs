pub mod controller;
pub mod event;
pub mod evidence;
mod invariants;

pub use controller::AssessmentSession;
pub use event::{replay, ReplayEntry, SessionEvent};
pub use evidence::EvidenceTracker;
