use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arena_core::{EngineIdentity, SearchLimit};
use arena_runner::{
    EngineError, EngineEvent, EngineEventKind, EngineHandle, EngineSettings, EngineTimeouts,
    InProcessLauncher, SearchRequest,
};
use chess_core::Color;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use uci_engine::EngineBehavior;

/// Launcher whose n-th launch (0-based) gets `pick(n)` as its behavior.
fn launcher(pick: impl Fn(usize) -> EngineBehavior + Send + Sync + 'static) -> Arc<InProcessLauncher> {
    let launches = Arc::new(AtomicUsize::new(0));
    Arc::new(InProcessLauncher::new(
        move |_identity: &EngineIdentity, io: DuplexStream| {
            let behavior = pick(launches.fetch_add(1, Ordering::SeqCst));
            async move {
                let (r, w) = tokio::io::split(io);
                let _ = uci_engine::serve(r, w, behavior).await;
            }
        },
    ))
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        timeouts: EngineTimeouts {
            handshake: Duration::from_millis(500),
            ready: Duration::from_millis(200),
            stop: Duration::from_millis(200),
            search_grace: Duration::from_millis(100),
        },
        max_restarts: 1,
    }
}

fn spawn(
    launcher: Arc<InProcessLauncher>,
    settings: EngineSettings,
) -> (EngineHandle, mpsc::Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel(256);
    let handle = EngineHandle::spawn(EngineIdentity::new("test", "in-process"), launcher, settings, tx);
    (handle, rx)
}

fn request(limit: SearchLimit) -> SearchRequest {
    SearchRequest {
        start_fen: None,
        moves: vec!["e2e4".to_string()],
        side_to_move: Color::Black,
        limit,
    }
}

async fn next(rx: &mut mpsc::Receiver<EngineEvent>) -> EngineEventKind {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("engine event in time")
        .expect("event channel open")
        .kind
}

/// Next event that is not an info line.
async fn next_non_info(rx: &mut mpsc::Receiver<EngineEvent>) -> EngineEventKind {
    loop {
        match next(rx).await {
            EngineEventKind::Info { .. } => {}
            other => return other,
        }
    }
}

#[tokio::test]
async fn test_ready_then_depth_search() {
    let (engine, mut rx) = spawn(launcher(|_| EngineBehavior::default()), fast_settings());
    assert_eq!(
        next(&mut rx).await,
        EngineEventKind::Ready {
            name: Some("ArenaUci".to_string())
        }
    );

    let id = engine.search(request(SearchLimit::Depth { depth: 2 }));
    let mut depths = Vec::new();
    loop {
        match next(&mut rx).await {
            EngineEventKind::Info { search, info } => {
                assert_eq!(search, id);
                depths.push(info.depth);
            }
            EngineEventKind::BestMove { search, best, .. } => {
                assert_eq!(search, id);
                assert!(best.is_some());
                break;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(depths, vec![1, 2]);
}

#[tokio::test]
async fn test_two_rapid_infinite_searches() {
    let (engine, mut rx) = spawn(launcher(|_| EngineBehavior::default()), fast_settings());
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));

    let first = engine.search(request(SearchLimit::Infinite));
    let second = engine.search(request(SearchLimit::Infinite));
    assert!(second > first);

    // Everything tagged `second` arrives after the first search's bestmove.
    let mut first_done = false;
    loop {
        match next(&mut rx).await {
            EngineEventKind::Info { search, .. } => {
                if search == second {
                    assert!(first_done, "second search started before first finished");
                    break;
                }
            }
            EngineEventKind::BestMove { search, .. } => {
                assert_eq!(search, first);
                first_done = true;
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    engine.stop();
    match next_non_info(&mut rx).await {
        EngineEventKind::BestMove { search, .. } => assert_eq!(search, second),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_respawn_after_crash() {
    let behavior = |n: usize| EngineBehavior {
        crash_on_go: n == 0,
        ..EngineBehavior::default()
    };
    let (engine, mut rx) = spawn(launcher(behavior), fast_settings());
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));

    let lost = engine.search(request(SearchLimit::Depth { depth: 1 }));
    assert_eq!(
        next(&mut rx).await,
        EngineEventKind::Fatal {
            search: Some(lost),
            pending: None,
            error: EngineError::Closed
        }
    );
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));
    assert_eq!(next(&mut rx).await, EngineEventKind::Restarted { attempt: 1 });

    let retry = engine.search(request(SearchLimit::Depth { depth: 1 }));
    match next_non_info(&mut rx).await {
        EngineEventKind::BestMove { search, best, .. } => {
            assert_eq!(search, retry);
            assert!(best.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_after_restarts_exhausted() {
    let behavior = |_| EngineBehavior {
        ignore_isready: true,
        ..EngineBehavior::default()
    };
    let (engine, mut rx) = spawn(launcher(behavior), fast_settings());
    assert_eq!(
        next(&mut rx).await,
        EngineEventKind::Fatal {
            search: None,
            pending: None,
            error: EngineError::Timeout("readyok")
        }
    );
    assert_eq!(
        next(&mut rx).await,
        EngineEventKind::Failed {
            error: EngineError::Timeout("readyok")
        }
    );
    assert!(rx.recv().await.is_none());
    assert!(!engine.is_alive());
}

#[tokio::test]
async fn test_unacknowledged_stop_is_fatal() {
    let behavior = |_| EngineBehavior {
        hang_on_go: true,
        ..EngineBehavior::default()
    };
    let (engine, mut rx) = spawn(launcher(behavior), fast_settings());
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));

    let id = engine.search(request(SearchLimit::Infinite));
    engine.stop();
    assert_eq!(
        next(&mut rx).await,
        EngineEventKind::Fatal {
            search: Some(id),
            pending: None,
            error: EngineError::Timeout("bestmove after stop")
        }
    );
}

#[tokio::test]
async fn test_movetime_overrun_is_fatal() {
    let behavior = |_| EngineBehavior {
        hang_on_go: true,
        ..EngineBehavior::default()
    };
    let (engine, mut rx) = spawn(launcher(behavior), fast_settings());
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));

    let id = engine.search(request(SearchLimit::MoveTime { ms: 20 }));
    assert_eq!(
        next(&mut rx).await,
        EngineEventKind::Fatal {
            search: Some(id),
            pending: None,
            error: EngineError::Timeout("bestmove")
        }
    );
}

#[tokio::test]
async fn test_option_set_while_thinking_applies_to_next_search() {
    let (engine, mut rx) = spawn(launcher(|_| EngineBehavior::default()), fast_settings());
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));

    engine.search(request(SearchLimit::Infinite));
    engine.set_option("MultiPV", Some("2".to_string()));
    engine.stop();
    assert!(matches!(next_non_info(&mut rx).await, EngineEventKind::BestMove { .. }));

    let id = engine.search(request(SearchLimit::Depth { depth: 1 }));
    let mut lines = Vec::new();
    loop {
        match next(&mut rx).await {
            EngineEventKind::Info { search, info } if search == id => lines.push(info.multipv),
            EngineEventKind::BestMove { search, .. } if search == id => break,
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(lines, vec![1, 2]);
}

#[tokio::test]
async fn test_shutdown_ends_actor() {
    let (engine, mut rx) = spawn(launcher(|_| EngineBehavior::default()), fast_settings());
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));
    engine.shutdown();
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_fatal_reports_queued_search() {
    let behavior = |n: usize| EngineBehavior {
        hang_on_go: n == 0,
        ..EngineBehavior::default()
    };
    let (engine, mut rx) = spawn(launcher(behavior), fast_settings());
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));

    let running = engine.search(request(SearchLimit::Infinite));
    let queued = engine.search(request(SearchLimit::Depth { depth: 2 }));
    assert_eq!(
        next(&mut rx).await,
        EngineEventKind::Fatal {
            search: Some(running),
            pending: Some(queued),
            error: EngineError::Timeout("bestmove after stop")
        }
    );
    assert!(matches!(next(&mut rx).await, EngineEventKind::Ready { .. }));
    assert_eq!(next(&mut rx).await, EngineEventKind::Restarted { attempt: 1 });
}
