pub mod events;
pub mod manager;
pub mod registry;

pub use events::CompletionEvent;
pub use manager::{generate_task_id, ProcessManager, ProcessOptions, ProcessTasks};
pub use registry::TaskRegistry;
