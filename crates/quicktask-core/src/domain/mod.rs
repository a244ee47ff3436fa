//! Domain model (ids, tasks, mutations, errors).

pub mod errors;
pub mod ids;
pub mod mutation;
pub mod task;

pub use errors::{ErrorKind, RemoteError, StoreError, SurfacedError, SyncError};
pub use ids::{CanonicalId, LocalId, TaskId};
pub use mutation::{MutationKind, MutationPhase};
pub use task::{CanonicalTask, NewTask, Task, TaskPatch};
