pub mod ytdlp;

pub use ytdlp::{build_args, classify_line, parse_progress, OutputLine, ProgressSample};
