use serde_json::json;

use super::test_helpers::{Fixture, actor, cursor_frame, drain_events, postit_at};
use super::*;

// =============================================================================
// open
// =============================================================================

#[tokio::test]
async fn open_loads_snapshot_in_creation_order() {
    let fx = Fixture::new();
    let first = fx.seed(0.0, 0.0).await;
    let second = fx.seed(10.0, 10.0).await;

    let session = fx.open("ada").await;

    let ids: Vec<_> = session.elements().ordered().map(|e| e.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(session.topic(), fx.topic());
    assert_eq!(fx.hub.subscriber_count(&fx.topic()), 1);
}

#[tokio::test]
async fn open_arms_the_presence_sweep() {
    let fx = Fixture::new();
    fx.clock.set(500);
    let session = fx.open("ada").await;
    assert_eq!(session.next_deadline(), Some(1_500));
}

#[tokio::test]
async fn load_failure_is_fatal_and_releases_subscription() {
    let fx = Fixture::new();
    fx.store.fail_reads(true);

    let result = BoardSession::open(fx.board_id, actor("ada"), SyncConfig::default(), fx.deps()).await;

    let Err(err) = result else { panic!("open should fail") };
    assert!(matches!(err, SessionError::Load(_)));
    assert_eq!(err.error_code(), "E_BOARD_LOAD");
    assert_eq!(fx.hub.subscriber_count(&fx.topic()), 0);
}

// =============================================================================
// handle_frame
// =============================================================================

#[tokio::test]
async fn own_frames_are_filtered_before_dispatch() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;
    let own = cursor_frame(&fx.topic(), &session.actor().id, 1.0, 2.0);

    assert_eq!(session.handle_frame(own), Inbound::SelfEcho);
    assert!(session.roster().is_empty());
}

#[tokio::test]
async fn peer_frames_are_applied() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;

    assert_eq!(session.handle_frame(cursor_frame(&fx.topic(), "actor-bob", 1.0, 2.0)), Inbound::Applied);
    assert_eq!(session.roster().len(), 1);
}

#[tokio::test]
async fn frames_for_other_topics_are_ignored() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;

    let frame = cursor_frame("board:elsewhere", "actor-bob", 1.0, 2.0);
    assert_eq!(session.handle_frame(frame), Inbound::Ignored);
    assert!(session.roster().is_empty());
}

#[tokio::test]
async fn malformed_frames_are_reported_not_applied() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;

    let unknown = Frame::new(fx.topic(), "presence_join", json!({}));
    let bad_payload = Frame::new(fx.topic(), "cursor_move", json!({"x": "left"}));

    assert_eq!(session.handle_frame(unknown), Inbound::Malformed);
    assert_eq!(session.handle_frame(bad_payload), Inbound::Malformed);
    assert!(session.roster().is_empty());
}

#[tokio::test]
async fn drain_inbound_takes_everything_queued() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;
    let (peer, _rx) = fx.observe();
    for n in 0..3 {
        let frame = cursor_frame(&fx.topic(), &format!("actor-{n}"), 0.0, 0.0);
        peer.publish(&fx.topic(), &frame).expect("publish");
    }

    assert_eq!(session.drain_inbound(), 3);
    assert_eq!(session.roster().len(), 3);
    assert_eq!(session.drain_inbound(), 0);
}

// =============================================================================
// snapshot and viewport
// =============================================================================

#[tokio::test]
async fn snapshot_reflects_session_state() {
    let fx = Fixture::new();
    let seeded = fx.seed(0.0, 0.0).await;
    let mut session = fx.open("ada").await;
    session.handle_frame(cursor_frame(&fx.topic(), "actor-bob", 5.0, 5.0));
    session.pan_by(40.0, -10.0);

    let snap = session.snapshot();

    assert_eq!(snap.board_id, fx.board_id);
    assert_eq!(snap.actor.id, "actor-ada");
    assert_eq!(snap.elements, vec![seeded]);
    assert_eq!(snap.cursors.len(), 1);
    assert_eq!(snap.viewport.offset(), Point::new(40.0, -10.0));
    assert_eq!(snap.dragging, None);
}

#[tokio::test]
async fn zoom_keeps_anchor_and_clamps() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;
    let anchor = Point::new(200.0, 100.0);
    let before = session.viewport().to_logical(anchor);

    session.zoom_at(anchor, 10.0);

    let viewport = session.viewport();
    assert!((viewport.scale() - 3.0).abs() < 1e-9);
    let after = viewport.to_logical(anchor);
    assert!((after.x - before.x).abs() < 1e-9 && (after.y - before.y).abs() < 1e-9);
}

// =============================================================================
// close
// =============================================================================

#[tokio::test]
async fn close_unsubscribes_and_stops_timers() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;

    session.close();

    assert!(session.is_closed());
    assert_eq!(session.next_deadline(), None);
    assert_eq!(fx.hub.subscriber_count(&fx.topic()), 0);
    assert_eq!(session.handle_frame(cursor_frame(&fx.topic(), "actor-bob", 0.0, 0.0)), Inbound::Ignored);
    assert!(matches!(session.create_element(postit_at(0.0, 0.0)), Err(SessionError::Closed)));
}

#[tokio::test]
async fn close_commits_an_active_drag() {
    let fx = Fixture::new();
    let element = fx.seed(0.0, 0.0).await;
    let (_observer, mut rx) = fx.observe();
    let mut session = fx.open("ada").await;

    assert!(session.pointer_down_on(element.id, Point::new(10.0, 10.0)));
    session.pointer_move(Point::new(60.0, 60.0));
    session.close();
    session.settle().await;

    assert_eq!(fx.store.get(element.id).map(|e| e.position), Some(Point::new(50.0, 50.0)));
    let last = drain_events(&mut rx).pop().expect("commit published");
    assert!(matches!(last, BoardEvent::ElementUpdate { element_id, .. } if element_id == element.id));
}

#[tokio::test]
async fn notices_carry_error_codes() {
    let fx = Fixture::new();
    let mut session = fx.open("ada").await;
    session.report(&SessionError::BoardFull { limit: 3 });

    let notices = session.take_notices();
    assert_eq!(notices, vec![Notice { code: "E_BOARD_FULL", message: "board is full (3 elements)".into() }]);
    assert!(session.take_notices().is_empty());
}

// =============================================================================
// transport failure
// =============================================================================

/// Transport that refuses every subscription and publish.
struct DeadTransport;

impl Transport for DeadTransport {
    fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Frame>, crate::transport::TransportError> {
        Err(crate::transport::TransportError::Closed(topic.to_string()))
    }

    fn publish(&self, topic: &str, _frame: &Frame) -> Result<(), crate::transport::TransportError> {
        Err(crate::transport::TransportError::NotSubscribed(topic.to_string()))
    }

    fn unsubscribe(&self, _topic: &str) {}
}

#[tokio::test]
async fn dead_transport_degrades_to_no_peers() {
    let fx = Fixture::new();
    let kept = fx.seed(0.0, 0.0).await;
    let doomed = fx.seed(50.0, 50.0).await;
    let deps = SessionDeps { transport: Arc::new(DeadTransport), ..fx.deps() };

    let mut session =
        BoardSession::open(fx.board_id, actor("ada"), SyncConfig::default(), deps).await.expect("open without peers");
    assert_eq!(session.elements().len(), 2);

    session.move_cursor(Point::new(1.0, 1.0));
    session.update_element(kept.id, canvas::doc::ElementPatch::position(Point::new(5.0, 5.0))).expect("update");
    session.delete_element(doomed.id).expect("delete");
    session.settle().await;

    assert_eq!(session.element(&kept.id).map(|e| e.position), Some(Point::new(5.0, 5.0)));
    assert_eq!(fx.store.get(kept.id).map(|e| e.position), Some(Point::new(5.0, 5.0)));
    assert_eq!(session.element(&doomed.id), None);
    assert_eq!(fx.store.get(doomed.id), None);
    assert_eq!(session.drain_inbound(), 0);
    assert!(session.take_notices().is_empty());
}
