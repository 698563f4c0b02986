pub mod client;
pub mod engine;
pub mod models;
pub mod notifications;

pub use client::{Aria2Api, Aria2Client};
pub use engine::RpcEngine;
pub use models::{Aria2File, Aria2Snapshot, Aria2Status};
pub use notifications::{parse_notification, Aria2Notification, NotificationListener};
