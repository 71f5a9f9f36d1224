//! Poll-claim-execute-report machinery.
//!
//! ```text
//! Poller tick
//!   ↓
//! ExecutionCycle::run_cycle
//!   ├─ CapacityScheduler::available_slots
//!   ├─ TaskQueue::fetch_next_tasks
//!   ├─ select_parallel (scope-fair)
//!   ├─ CapacityScheduler::start_task  (reserve)
//!   ├─ TaskQueue::mark_tasks_in_progress
//!   └─ per task: register in InFlightRegistry → spawn unit of work
//!                  SubprocessWorker::execute → StatusReporter → release
//! ```

mod control;
mod cycle;
mod poller;
mod registry;

pub use control::RunningTaskControl;
pub use cycle::{CycleOptions, CycleReport, ExecutionCycle, DEFAULT_STOPPED_REASON};
pub use poller::Poller;
pub use registry::InFlightRegistry;
