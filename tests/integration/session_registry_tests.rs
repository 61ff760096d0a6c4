//! Integration tests for `SessionRegistry`: single launch under contention,
//! removal, idle eviction, and shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mcp_windbg::session::reaper::spawn_idle_reaper;
use mcp_windbg::session::{DumpPath, SessionRegistry};
use mcp_windbg::AppError;

use super::test_helpers::{dyn_launcher, test_options, FakeLauncher};

fn registry(launcher: &Arc<FakeLauncher>) -> Arc<SessionRegistry> {
    Arc::new(SessionRegistry::new(dyn_launcher(launcher)))
}

// ── get_or_create ────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_launch() {
    let launcher = FakeLauncher::slow(Duration::from_millis(50));
    let registry = registry(&launcher);
    let path = DumpPath::new("contended.dmp");
    let options = test_options(Duration::from_secs(2));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        let path = path.clone();
        let options = options.clone();
        handles.push(tokio::spawn(async move {
            registry.get_or_create(&path, &options).await
        }));
    }

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(launcher.stats.launches(), 1);
    assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn distinct_paths_get_distinct_sessions() {
    let launcher = FakeLauncher::new();
    let registry = registry(&launcher);
    let options = test_options(Duration::from_secs(2));

    let a = registry
        .get_or_create(&DumpPath::new("a.dmp"), &options)
        .await
        .unwrap();
    let b = registry
        .get_or_create(&DumpPath::new("b.dmp"), &options)
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(launcher.stats.launches(), 2);
    let listed = registry.list().await;
    assert_eq!(listed, vec![DumpPath::new("a.dmp"), DumpPath::new("b.dmp")]);
}

#[tokio::test]
async fn failed_launch_retains_no_entry() {
    let launcher = FakeLauncher::failing();
    let registry = registry(&launcher);

    let err = registry
        .get_or_create(&DumpPath::new("broken.dmp"), &test_options(Duration::from_secs(2)))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, AppError::SessionCreationFailed(_)));
    assert!(registry.is_empty().await);
}

// ── remove ───────────────────────────────────────────────────

#[tokio::test]
async fn remove_closes_and_next_use_starts_fresh() {
    let launcher = FakeLauncher::new();
    let registry = registry(&launcher);
    let path = DumpPath::new("reopen.dmp");
    let options = test_options(Duration::from_secs(2));

    let first = registry.get_or_create(&path, &options).await.unwrap();
    assert!(registry.remove(&path).await);
    assert_eq!(launcher.stats.closes(), 1);
    assert!(matches!(
        first.send_command("k").await,
        Err(AppError::SessionClosed(_))
    ));

    let second = registry.get_or_create(&path, &options).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.send_command("generation").await.unwrap(), vec!["2"]);
}

#[tokio::test]
async fn remove_unknown_path_is_a_no_op() {
    let launcher = FakeLauncher::new();
    let registry = registry(&launcher);
    assert!(!registry.remove(&DumpPath::new("never-opened.dmp")).await);
    assert_eq!(launcher.stats.closes(), 0);
}

#[tokio::test]
async fn close_all_empties_the_registry() {
    let launcher = FakeLauncher::new();
    let registry = registry(&launcher);
    let options = test_options(Duration::from_secs(2));
    for name in ["x.dmp", "y.dmp", "z.dmp"] {
        registry
            .get_or_create(&DumpPath::new(name), &options)
            .await
            .unwrap();
    }

    registry.close_all().await;

    assert!(registry.is_empty().await);
    assert_eq!(launcher.stats.closes(), 3);
}

// ── idle eviction ────────────────────────────────────────────

#[tokio::test]
async fn evict_idle_keeps_recent_sessions() {
    let launcher = FakeLauncher::new();
    let registry = registry(&launcher);
    registry
        .get_or_create(&DumpPath::new("fresh.dmp"), &test_options(Duration::from_secs(2)))
        .await
        .unwrap();

    assert!(registry.evict_idle(Duration::from_secs(60)).await.is_empty());
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn evict_idle_skips_busy_sessions() {
    let launcher = FakeLauncher::new();
    let registry = registry(&launcher);
    let options = test_options(Duration::from_secs(2));
    let busy = registry
        .get_or_create(&DumpPath::new("busy.dmp"), &options)
        .await
        .unwrap();
    registry
        .get_or_create(&DumpPath::new("idle.dmp"), &options)
        .await
        .unwrap();

    let running = tokio::spawn({
        let busy = Arc::clone(&busy);
        async move { busy.send_command("sleep 200").await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let evicted = registry.evict_idle(Duration::ZERO).await;

    assert_eq!(evicted, vec![DumpPath::new("idle.dmp")]);
    assert_eq!(registry.list().await, vec![DumpPath::new("busy.dmp")]);
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn reaper_evicts_abandoned_sessions() {
    let launcher = FakeLauncher::new();
    let registry = registry(&launcher);
    registry
        .get_or_create(&DumpPath::new("abandoned.dmp"), &test_options(Duration::from_secs(2)))
        .await
        .unwrap();

    let ct = CancellationToken::new();
    let reaper = spawn_idle_reaper(Arc::clone(&registry), Duration::from_millis(100), ct.clone());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(registry.is_empty().await);
    assert_eq!(launcher.stats.closes(), 1);

    ct.cancel();
    reaper.await.unwrap();
}
