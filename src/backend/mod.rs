pub mod completion;
pub mod downloader;
pub mod messages;

pub use completion::CompletionWorker;
pub use downloader::Downloader;
pub use messages::{ActionOutcome, Submission, TaskOptions};
