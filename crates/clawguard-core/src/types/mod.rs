pub mod job;
pub mod outcome;
pub mod priority;

pub use job::{JobKind, JobRequest, PropagationMode};
pub use outcome::{ActionOutcome, ActionResult, OutcomeKind, ProgressSnapshot};
pub use priority::Priority;
