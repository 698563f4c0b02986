//! haul library
//!
//! Routes download links to one of two engines: an aria2 daemon driven over JSON-RPC, or one
//! yt-dlp process per link for streaming sites. Both engines report through the same [`Task`]
//! model, and finished payloads are moved from the working directory into a library tree.

pub mod backend;
pub mod engine;
pub mod extractor;
pub mod queue;
pub mod rpc;
pub mod task;
pub mod utils;

// Re-export main types for easier use
pub use backend::{ActionOutcome, CompletionWorker, Downloader, Submission, TaskOptions};
pub use engine::EngineSelector;
pub use queue::{CompletionEvent, ProcessManager};
pub use rpc::{Aria2Api, Aria2Client, RpcEngine};
pub use task::{EngineKind, Task, TaskAction, TaskStatus};
pub use utils::{AppSettings, HaulError, Relocator};
