use super::*;
use serde_json::json;

#[test]
fn test_client_move_parses() {
    let msg: ClientMessage =
        serde_json::from_value(json!({"type": "move", "from": "e7", "to": "e8", "promotion": "knight"}))
            .unwrap();
    assert_eq!(
        msg,
        ClientMessage::Move {
            from: "e7".to_string(),
            to: "e8".to_string(),
            promotion: Some(PieceKind::Knight),
        }
    );
    let msg: ClientMessage =
        serde_json::from_value(json!({"type": "move", "from": "e2", "to": "e4"})).unwrap();
    assert!(matches!(msg, ClientMessage::Move { promotion: None, .. }));
}

#[test]
fn test_client_setup_variants() {
    let msg: ClientMessage = serde_json::from_value(json!({
        "type": "new_game",
        "setup": {"kind": "handicap", "handicap": "knight-b1"},
        "clock": {"initial_ms": 60000}
    }))
    .unwrap();
    assert_eq!(
        msg,
        ClientMessage::NewGame {
            setup: Setup::Handicap {
                handicap: Handicap::KnightB1
            },
            clock: Some(TimeControl::new(60000, 0)),
        }
    );

    let msg: ClientMessage =
        serde_json::from_value(json!({"type": "new_game", "setup": {"kind": "chess960"}})).unwrap();
    assert!(matches!(
        msg,
        ClientMessage::NewGame {
            setup: Setup::Chess960 { index: None },
            clock: None
        }
    ));

    let msg: ClientMessage = serde_json::from_value(json!({"type": "new_game"})).unwrap();
    assert!(matches!(
        msg,
        ClientMessage::NewGame {
            setup: Setup::Standard,
            ..
        }
    ));
}

#[test]
fn test_client_mode_and_match_messages() {
    let msg: ClientMessage = serde_json::from_value(json!({
        "type": "set_mode",
        "mode": {"kind": "play", "engine": "black"}
    }))
    .unwrap();
    assert_eq!(
        msg,
        ClientMessage::SetMode {
            mode: ModeSpec::Play {
                engine: Some(Color::Black)
            }
        }
    );

    let msg: ClientMessage = serde_json::from_value(json!({
        "type": "start_tournament",
        "engines": ["a", "b", "c"]
    }))
    .unwrap();
    assert!(matches!(msg, ClientMessage::StartTournament { rounds: 1, .. }));

    let msg: ClientMessage = serde_json::from_value(json!({
        "type": "import",
        "source": {"format": "pgn", "text": "1. e4 e5"}
    }))
    .unwrap();
    assert!(matches!(
        msg,
        ClientMessage::Import {
            source: ImportSource::Pgn { .. }
        }
    ));

    assert!(serde_json::from_value::<ClientMessage>(json!({"type": "dance"})).is_err());
}

#[test]
fn test_server_messages_are_tagged() {
    let msg = ServerMessage::Clock(ClockSnapshot {
        white_ms: 1000,
        black_ms: 2000,
        running: Some(Color::White),
    });
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "clock");
    assert_eq!(json["running"], "white");

    let msg = ServerMessage::notice(NoticeLevel::Warning, "illegal move");
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json, json!({"type": "notice", "level": "warning", "message": "illegal move"}));

    let msg = ServerMessage::GameOver {
        status: GameStatus::Resigned {
            winner: Color::Black,
        },
        result: Some(Outcome::BlackWins),
        fen: "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
        movetext: "0-1".to_string(),
    };
    let json = serde_json::to_string(&msg).unwrap();
    let back: ServerMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}
