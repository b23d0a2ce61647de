use uuid::Uuid;

use super::*;

fn grab(machine: &mut DragMachine) -> ElementId {
    let id = Uuid::new_v4();
    machine.pick_up(id, Point::new(110.0, 120.0), Point::new(100.0, 100.0));
    id
}

// =============================================================
// State transitions
// =============================================================

#[test]
fn default_is_idle_with_standard_throttle() {
    let machine = DragMachine::default();
    assert_eq!(machine.state(), DragState::Idle);
    assert!(!machine.is_dragging());
    assert_eq!(machine.dragging_element(), None);
}

#[test]
fn pick_up_captures_pointer_offset() {
    let mut machine = DragMachine::default();
    let id = grab(&mut machine);
    assert_eq!(machine.state(), DragState::Dragging { element_id: id, pointer_offset: Point::new(10.0, 20.0) });
}

#[test]
fn move_keeps_element_under_grab_point() {
    let mut machine = DragMachine::default();
    let id = grab(&mut machine);
    let step = machine.move_to(Point::new(210.0, 320.0), 0);
    assert_eq!(step, Some(DragStep { element_id: id, position: Point::new(200.0, 300.0), broadcast: true }));
    assert_eq!(machine.last_position(), Some(Point::new(200.0, 300.0)));
}

#[test]
fn move_while_idle_is_ignored() {
    let mut machine = DragMachine::default();
    assert_eq!(machine.move_to(Point::new(1.0, 1.0), 0), None);
    assert_eq!(machine.last_position(), None);
}

#[test]
fn release_returns_dragged_id_and_goes_idle() {
    let mut machine = DragMachine::default();
    let id = grab(&mut machine);
    assert_eq!(machine.release(), Some(id));
    assert!(!machine.is_dragging());
    assert_eq!(machine.release(), None);
}

#[test]
fn reset_drops_gesture_without_commit() {
    let mut machine = DragMachine::default();
    grab(&mut machine);
    machine.move_to(Point::new(0.0, 0.0), 0);
    machine.reset();
    assert_eq!(machine.state(), DragState::Idle);
    assert_eq!(machine.last_position(), None);
    assert_eq!(machine.release(), None);
}

#[test]
fn pick_up_during_drag_switches_element() {
    let mut machine = DragMachine::default();
    grab(&mut machine);
    let other = Uuid::new_v4();
    machine.pick_up(other, Point::new(5.0, 5.0), Point::new(0.0, 0.0));
    assert_eq!(machine.dragging_element(), Some(other));
    assert_eq!(machine.last_position(), None);
}

// =============================================================
// Throttle
// =============================================================

#[test]
fn first_move_always_broadcasts() {
    let mut machine = DragMachine::new(50);
    grab(&mut machine);
    assert!(machine.move_to(Point::new(0.0, 0.0), 1_000).is_some_and(|s| s.broadcast));
}

#[test]
fn moves_inside_window_are_local_only() {
    let mut machine = DragMachine::new(50);
    grab(&mut machine);
    let flags: Vec<bool> =
        [0, 10, 50, 51, 101, 102].iter().filter_map(|t| machine.move_to(Point::new(0.0, 0.0), *t)).map(|s| s.broadcast).collect();
    assert_eq!(flags, vec![true, false, false, true, false, true]);
}

#[test]
fn continuous_drag_over_500ms_broadcasts_at_most_ten_times() {
    let mut machine = DragMachine::new(50);
    grab(&mut machine);
    let broadcasts = (0..=500u64)
        .filter_map(|t| {
            #[allow(clippy::cast_precision_loss)]
            let x = t as f64;
            machine.move_to(Point::new(x, x), t)
        })
        .filter(|s| s.broadcast)
        .count();
    assert!(broadcasts <= 10, "got {broadcasts} broadcasts");
    assert_eq!(broadcasts, 10);
}

#[test]
fn zero_throttle_broadcasts_every_move() {
    let mut machine = DragMachine::new(0);
    grab(&mut machine);
    assert!((0..5u64).filter_map(|t| machine.move_to(Point::new(0.0, 0.0), t)).all(|s| s.broadcast));
}

#[test]
fn new_gesture_restarts_throttle_window() {
    let mut machine = DragMachine::new(50);
    grab(&mut machine);
    machine.move_to(Point::new(0.0, 0.0), 100);
    machine.release();
    grab(&mut machine);
    assert!(machine.move_to(Point::new(0.0, 0.0), 110).is_some_and(|s| s.broadcast));
}
