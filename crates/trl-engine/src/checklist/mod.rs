pub mod evaluator;
pub mod trail;

pub use evaluator::is_complete;
pub use trail::{ChecklistStep, StepTrail};
