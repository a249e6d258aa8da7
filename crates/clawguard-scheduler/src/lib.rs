//! # ClawGuard Scheduler
//!
//! Global serialization point for heavy administrative jobs.
//!
//! ## Design Principles
//! - Exactly zero or one task is active at any instant, system-wide
//! - Highest priority weight dispatches first; equal weights run FIFO
//! - A failing or panicking task never stalls the queue
//!
//! ## Architecture
//! ```text
//! enqueue(task, priority) ──► queue (weight desc, sequence asc)
//!                                │
//!                     dispatch() │ when no task is active
//!                                ▼
//!                          active slot ──► task.run()
//!                                ▲              │
//!                                └── settle ◄───┘ (clear slot, re-dispatch)
//! ```

pub mod engine;
pub mod tasks;

pub use engine::PriorityScheduler;
pub use tasks::{FnTask, ScheduledTask, TaskHandle, TaskId, TaskInfo, TaskStatus};
