//! Stress and property tests for the process engine's task registry
//!
//! Invariants tested:
//! A - Unique ids: concurrent submissions never share an id, even from a tiny id space
//! B - Monotonic progress: completedLength never decreases while a task is active
//! C - Bounded progress: completedLength never exceeds a known totalLength
//! D - Terminal stickiness: nothing moves a task out of complete/error

use haul::extractor::ProgressSample;
use haul::queue::{ProcessOptions, TaskRegistry};
use haul::{EngineKind, ProcessManager, Task, TaskStatus};
use proptest::prelude::*;
use rand::Rng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::RwLock;

fn make(id: String) -> Task {
    Task::waiting(
        id,
        EngineKind::Process,
        "https://youtube.com/watch?v=x",
        PathBuf::from("/tmp"),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_get_unique_ids() {
    let temp = tempdir().expect("Failed to create temp dir");
    let manager = Arc::new(ProcessManager::new(
        temp.path().join("missing-yt-dlp"),
        temp.path().to_path_buf(),
        None,
    ));

    let mut handles = Vec::new();
    for i in 0..200 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .add_task(
                    &format!("https://youtube.com/watch?v={}", i),
                    ProcessOptions::default(),
                )
                .await
                .unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()), "duplicate id handed out");
    }
    assert_eq!(ids.len(), 200);
    assert_eq!(manager.list_tasks().await.len(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn collision_check_holds_under_contention() {
    // 64 inserts drawn from 96 possible ids forces plenty of collisions
    let registry = Arc::new(RwLock::new(TaskRegistry::new(None)));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let mut guard = registry.write().await;
            guard.insert_with(
                || format!("{:02}", rand::thread_rng().gen_range(0..96)),
                make,
            )
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()));
    }
    assert_eq!(registry.read().await.len(), 64);
}

fn sample_strategy() -> impl Strategy<Value = ProgressSample> {
    (
        proptest::option::of(0u32..10_000),
        proptest::option::of(0u32..12_000),
        proptest::option::of(0u32..5_000),
    )
        .prop_map(|(total, completed, speed)| ProgressSample {
            total_length: total.map(f64::from),
            completed_length: completed.map(f64::from),
            download_speed: speed.map(f64::from),
        })
}

proptest! {
    #[test]
    fn progress_never_moves_backwards(samples in proptest::collection::vec(sample_strategy(), 1..50)) {
        let mut registry = TaskRegistry::new(None);
        let id = registry.insert_with(|| "task".to_string(), make);

        let mut last_completed = 0u64;
        for sample in &samples {
            registry.apply_progress(&id, sample);
            let task = registry.get(&id).unwrap();

            prop_assert_eq!(task.status, TaskStatus::Active);
            prop_assert!(task.completed_length >= last_completed);
            if task.total_length > 0 {
                prop_assert!(task.completed_length <= task.total_length);
            }
            last_completed = task.completed_length;
        }
    }

    #[test]
    fn terminal_tasks_ignore_late_updates(
        before in proptest::collection::vec(sample_strategy(), 0..10),
        after in proptest::collection::vec(sample_strategy(), 1..10),
        failed in any::<bool>(),
    ) {
        let mut registry = TaskRegistry::new(None);
        let id = registry.insert_with(|| "task".to_string(), make);
        for sample in &before {
            registry.apply_progress(&id, sample);
        }

        let terminal = if failed { TaskStatus::Error } else { TaskStatus::Complete };
        prop_assert!(registry.finish(&id, terminal, None));
        let frozen = registry.get(&id).unwrap();

        for sample in &after {
            prop_assert!(!registry.apply_progress(&id, sample));
        }
        prop_assert!(!registry.finish(&id, TaskStatus::Active, None));

        prop_assert_eq!(registry.get(&id).unwrap(), frozen);
    }
}
