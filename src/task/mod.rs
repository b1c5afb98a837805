//! Task module - task records and the due-date policy that drives their
//! derived state.

mod model;
pub mod priority;

pub use model::{format_timestamp, parse_due_date, NewTask, Priority, Task, TaskUpdate};
pub use priority::{derive_state, state_on_edit};
