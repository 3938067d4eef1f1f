use super::*;

fn info(depth: u32, multipv: u32) -> SearchInfo {
    SearchInfo {
        multipv,
        ..SearchInfo::at_depth(depth)
    }
}

#[test]
fn test_depth_gate_drops_regressions() {
    let mut gate = DepthGate::default();
    assert!(gate.admit(&info(1, 1)));
    assert!(gate.admit(&info(2, 1)));
    assert!(gate.admit(&info(2, 1)));
    assert!(!gate.admit(&info(1, 1)));
    assert!(gate.admit(&info(3, 1)));
}

#[test]
fn test_depth_gate_tracks_lines_separately() {
    let mut gate = DepthGate::default();
    assert!(gate.admit(&info(5, 1)));
    assert!(gate.admit(&info(3, 2)));
    assert!(!gate.admit(&info(4, 1)));
    assert!(gate.admit(&info(4, 2)));
}

#[test]
fn test_default_timeouts() {
    let t = EngineTimeouts::default();
    assert_eq!(t.handshake, Duration::from_secs(10));
    assert_eq!(t.ready, Duration::from_secs(5));
    assert_eq!(t.stop, Duration::from_secs(3));
    assert_eq!(EngineSettings::default().max_restarts, 2);
}
