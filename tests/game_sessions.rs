//! End-to-end duplex session tests: snapshots, move fan-out, private
//! rejections and pre-upgrade checks.

#![allow(clippy::panic)]

mod common;

use serde_json::{Value, json};

use common::{TestServer, json_body, next_frame, send_json, send_move, str_at};

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[tokio::test]
async fn snapshot_is_the_first_frame() {
    let server = TestServer::start().await;
    let white = server.register("snap_white").await;
    let black = server.register("snap_black").await;
    let id = server.active_game(&white, &black).await;

    let mut session = server.connect(id, &black).await;
    let frame = next_frame(&mut session).await;
    assert_eq!(
        frame,
        json!({
            "type": "game_state",
            "gameId": id,
            "fen": START_FEN,
            "status": "active",
            "result": "none",
            "whitePlayerId": white.id,
            "blackPlayerId": black.id,
            "isWhite": false,
        })
    );
}

#[tokio::test]
async fn fools_mate_is_broadcast_and_settles_ratings() {
    let server = TestServer::start().await;
    let white = server.register("fool_white").await;
    let black = server.register("fool_black").await;
    let id = server.active_game(&white, &black).await;

    let mut ws_white = server.connect(id, &white).await;
    let mut ws_black = server.connect(id, &black).await;
    assert_eq!(str_at(&next_frame(&mut ws_white).await, "/type"), "game_state");
    assert_eq!(str_at(&next_frame(&mut ws_black).await, "/type"), "game_state");

    let line = [
        ("f2f3", true),
        ("e7e5", false),
        ("g2g4", true),
        ("d8h4", false),
    ];
    for (ply, (uci, by_white)) in line.iter().enumerate() {
        let mover = if *by_white { &mut ws_white } else { &mut ws_black };
        send_move(mover, uci).await;

        for session in [&mut ws_white, &mut ws_black] {
            let frame = next_frame(session).await;
            assert_eq!(str_at(&frame, "/type"), "move");
            assert_eq!(str_at(&frame, "/move/moveNotation"), *uci);
            assert_eq!(
                frame.pointer("/move/plyNumber").and_then(Value::as_u64),
                Some(ply as u64 + 1)
            );
        }
    }

    let history = json_body(server.get(&format!("/api/games/{id}/history"), &white).await).await;
    assert_eq!(history.as_array().map(Vec::len), Some(4));

    let game = json_body(server.get(&format!("/api/games/{id}"), &white).await).await;
    assert_eq!(str_at(&game, "/status"), "finished");
    assert_eq!(str_at(&game, "/result"), "black_wins");
    assert_eq!(str_at(&game, "/pgn"), "1. f3 e5 2. g4 Qh4# 0-1");
    assert_eq!(game.pointer("/whitePlayer/eloRating").and_then(Value::as_i64), Some(1184));
    assert_eq!(game.pointer("/blackPlayer/eloRating").and_then(Value::as_i64), Some(1216));
    assert_eq!(game.pointer("/whitePlayer/losses").and_then(Value::as_i64), Some(1));
    assert_eq!(game.pointer("/blackPlayer/wins").and_then(Value::as_i64), Some(1));

    send_move(&mut ws_white, "e2e4").await;
    let rejected = next_frame(&mut ws_white).await;
    assert_eq!(str_at(&rejected, "/type"), "error");
}

#[tokio::test]
async fn final_frame_carries_terminal_status() {
    let server = TestServer::start().await;
    let white = server.register("term_white").await;
    let black = server.register("term_black").await;
    let id = server.active_game(&white, &black).await;

    let mut ws_white = server.connect(id, &white).await;
    let mut ws_black = server.connect(id, &black).await;
    next_frame(&mut ws_white).await;
    next_frame(&mut ws_black).await;

    send_move(&mut ws_white, "f2f3").await;
    next_frame(&mut ws_black).await;
    send_move(&mut ws_black, "e7e5").await;
    next_frame(&mut ws_black).await;
    send_move(&mut ws_white, "g2g4").await;
    next_frame(&mut ws_black).await;
    send_move(&mut ws_black, "d8h4").await;

    let last = loop {
        let frame = next_frame(&mut ws_white).await;
        if str_at(&frame, "/move/moveNotation") == "d8h4" {
            break frame;
        }
    };
    assert_eq!(str_at(&last, "/status"), "finished");
    assert_eq!(str_at(&last, "/result"), "black_wins");
}

#[tokio::test]
async fn rejected_moves_stay_private() {
    let server = TestServer::start().await;
    let white = server.register("priv_white").await;
    let black = server.register("priv_black").await;
    let id = server.active_game(&white, &black).await;

    let mut ws_white = server.connect(id, &white).await;
    let mut ws_black = server.connect(id, &black).await;
    next_frame(&mut ws_white).await;
    next_frame(&mut ws_black).await;

    // Black moves first, then sends garbage and an unknown frame type.
    send_move(&mut ws_black, "e7e5").await;
    let err = next_frame(&mut ws_black).await;
    assert_eq!(str_at(&err, "/type"), "error");
    send_move(&mut ws_black, "zz99").await;
    assert_eq!(str_at(&next_frame(&mut ws_black).await, "/type"), "error");
    send_json(&mut ws_black, json!({ "type": "chat", "text": "hello" })).await;

    // White's first frame after the snapshot is its own move, not black's errors.
    send_move(&mut ws_white, "e2e4").await;
    let frame = next_frame(&mut ws_white).await;
    assert_eq!(str_at(&frame, "/type"), "move");
    assert_eq!(frame.pointer("/move/plyNumber").and_then(Value::as_u64), Some(1));
    assert_eq!(str_at(&next_frame(&mut ws_black).await, "/type"), "move");

    // Out of turn: white again.
    send_move(&mut ws_white, "e4e5").await;
    assert_eq!(str_at(&next_frame(&mut ws_white).await, "/type"), "error");

    let history = json_body(server.get(&format!("/api/games/{id}/history"), &white).await).await;
    assert_eq!(history.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn upgrade_checks_identity_and_membership() {
    let server = TestServer::start().await;
    let white = server.register("gate_white").await;
    let black = server.register("gate_black").await;
    let outsider = server.register("gate_outsider").await;
    let id = server.active_game(&white, &black).await;

    assert_eq!(server.reject_status(&format!("/api/ws/games/{id}")).await, 401);
    assert_eq!(
        server
            .reject_status(&format!("/api/ws/games/{id}?token=garbage"))
            .await,
        401
    );
    assert_eq!(
        server
            .reject_status(&format!("/api/ws/games/{id}?token={}", outsider.access_token))
            .await,
        403
    );
    assert_eq!(
        server
            .reject_status(&format!(
                "/api/ws/games/999999?token={}",
                white.access_token
            ))
            .await,
        404
    );
}

#[tokio::test]
async fn refresh_token_cannot_open_a_session() {
    let server = TestServer::start().await;
    let white = server.register("rt_white").await;
    let black = server.register("rt_black").await;
    let id = server.active_game(&white, &black).await;
    assert_eq!(
        server
            .reject_status(&format!("/api/ws/games/{id}?token={}", white.refresh_token))
            .await,
        401
    );
}

#[tokio::test]
async fn waiting_game_rejects_moves() {
    let server = TestServer::start().await;
    let owner = server.register("lonely").await;
    let created = json_body(server.post("/api/games", &owner).await).await;
    let id = created.get("id").and_then(Value::as_i64).unwrap_or_default();

    let mut session = server.connect(id, &owner).await;
    let snapshot = next_frame(&mut session).await;
    assert_eq!(str_at(&snapshot, "/status"), "waiting");
    assert_eq!(snapshot.get("isWhite").and_then(Value::as_bool), Some(true));

    send_move(&mut session, "e2e4").await;
    assert_eq!(str_at(&next_frame(&mut session).await, "/type"), "error");
    assert_eq!(server.store.move_count(id.into()).await, 0);
}
