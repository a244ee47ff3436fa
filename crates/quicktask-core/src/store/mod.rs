//! Store module: task collection, snapshots, and the undo record of an
//! optimistic mutation.

mod pending;
mod task_store;

pub use pending::PendingMutation;
pub use task_store::{TaskSnapshot, TaskStore};
