//! Touchpad mode: the touch surface drives an indirect pointer
//!
//! # Gestures
//!
//! - One finger moves the pointer.
//! - Two fingers scroll, using natural-scrolling direction (content follows
//!   the fingers, so a downward drag scrolls up).
//! - A short one-finger tap is a left click.
//! - A short two-finger tap is a right click.
//!
//! A tap is a touch that ends within [`TAP_THRESHOLD_PX`] on both axes and
//! [`TAP_THRESHOLD_MS`] of where and when it started. Both tap kinds share
//! the same thresholds.
//!
//! Only the first two fingers of a sequence are tracked. A third finger is
//! ignored, and is only picked up if one of the tracked fingers lifts while
//! it is still down.

use evdev::Key;

use crate::event::{port_time, TouchAction, TouchEvent, TouchPointer};
use crate::port::{Axis, EventInjectionPort, Injector};

/// Maximum travel on either axis for a touch to count as a tap.
pub const TAP_THRESHOLD_PX: f64 = 10.0;

/// Maximum duration of a tap.
pub const TAP_THRESHOLD_MS: u64 = 300;

/// Position with the time it was sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchSample {
    pub x: f64,
    pub y: f64,
    pub time_ms: u64,
}

impl TouchSample {
    /// Whether a finger lifting at `(x, y)` at `time_ms` ends a tap that
    /// started at this sample.
    fn is_tap_end(&self, x: f64, y: f64, time_ms: u64) -> bool {
        (x - self.x).abs() <= TAP_THRESHOLD_PX
            && (y - self.y).abs() <= TAP_THRESHOLD_PX
            && time_ms.saturating_sub(self.time_ms) <= TAP_THRESHOLD_MS
    }
}

/// Per-sequence gesture data, created at first finger down and dropped at
/// the end of the sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchpadGestureState {
    pub first_down: TouchSample,
    pub two_finger_center: TouchSample,
    pub had_two_fingers: bool,
    /// Last two-finger midpoint, for scroll deltas
    pub last_center: (f64, f64),
    /// Pointer ids of the tracked fingers, at most two
    tracked: Vec<i32>,
    /// False when the sequence started without a first-finger down, in
    /// which case `first_down` is not a real origin
    saw_first_down: bool,
}

impl TouchpadGestureState {
    fn starting_at(pointer: &TouchPointer, time_ms: u64) -> Self {
        Self {
            first_down: TouchSample {
                x: pointer.x,
                y: pointer.y,
                time_ms,
            },
            last_center: (pointer.x, pointer.y),
            tracked: vec![pointer.id],
            saw_first_down: true,
            ..Self::default()
        }
    }

    pub fn tracked_ids(&self) -> &[i32] {
        &self.tracked
    }

    /// Positions of the tracked fingers that are present in `event`.
    fn tracked_positions(&self, event: &TouchEvent) -> Vec<(f64, f64)> {
        self.tracked
            .iter()
            .filter_map(|id| event.pointer(*id))
            .map(|p| (p.x, p.y))
            .collect()
    }

    /// Start tracking fingers from `event` (other than `skip`) until two are
    /// tracked. Returns true if this brought the count to two.
    fn adopt(&mut self, event: &TouchEvent, skip: Option<i32>) -> bool {
        let before = self.tracked.len();
        for pointer in &event.pointers {
            if self.tracked.len() >= 2 {
                break;
            }
            if Some(pointer.id) != skip && !self.tracked.contains(&pointer.id) {
                self.tracked.push(pointer.id);
            }
        }
        before < 2 && self.tracked.len() == 2
    }
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

/// Classifies touch sequences into pointer motion, scroll and clicks.
#[derive(Debug, Default)]
pub struct GestureRecognizer {
    session: Option<TouchpadGestureState>,
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of the sequence in progress, if any.
    pub fn session(&self) -> Option<&TouchpadGestureState> {
        self.session.as_ref()
    }

    /// Discard the sequence in progress without emitting anything.
    pub fn reset(&mut self) {
        self.session = None;
    }

    pub fn handle<P: EventInjectionPort + ?Sized>(&mut self, port: &mut P, event: &TouchEvent) {
        let mut out = Injector::new(port);
        let time = port_time(event.time_ms);

        match event.action {
            TouchAction::Down => {
                let Some(pointer) = event.action_pointer() else {
                    tracing::debug!("Touch down without pointers");
                    return;
                };
                tracing::trace!("touchpad down at ({}, {})", pointer.x, pointer.y);
                self.session = Some(TouchpadGestureState::starting_at(pointer, event.time_ms));
                out.pointer_enter(pointer.x, pointer.y, time);
                out.pointer_motion(pointer.x, pointer.y, time);
            }

            TouchAction::PointerDown => {
                let session = self.session.get_or_insert_with(|| {
                    tracing::debug!("Finger down without a touch sequence, starting fresh");
                    TouchpadGestureState::default()
                });
                if session.adopt(event, None) {
                    let positions = session.tracked_positions(event);
                    if let [a, b] = positions[..] {
                        let (cx, cy) = midpoint(a, b);
                        session.had_two_fingers = true;
                        session.two_finger_center = TouchSample {
                            x: cx,
                            y: cy,
                            time_ms: event.time_ms,
                        };
                        session.last_center = (cx, cy);
                        tracing::trace!("two-finger start at ({}, {})", cx, cy);
                    }
                }
            }

            TouchAction::Move => {
                let Some(session) = self.session.as_mut() else {
                    // No sequence: only a lone finger can still be followed
                    if let [pointer] = event.pointers[..] {
                        out.pointer_motion(pointer.x, pointer.y, time);
                    }
                    return;
                };

                match session.tracked_positions(event)[..] {
                    [(x, y)] => out.pointer_motion(x, y, time),
                    [a, b] => {
                        if let Some(scroll) = event.scroll.filter(|s| !s.is_zero()) {
                            if scroll.vertical != 0.0 {
                                out.pointer_axis(Axis::Vertical, scroll.vertical, time);
                            }
                            if scroll.horizontal != 0.0 {
                                out.pointer_axis(Axis::Horizontal, scroll.horizontal, time);
                            }
                            return;
                        }

                        let (cx, cy) = midpoint(a, b);
                        let dx = cx - session.last_center.0;
                        let dy = cy - session.last_center.1;
                        session.last_center = (cx, cy);
                        if dx != 0.0 || dy != 0.0 {
                            tracing::trace!("two-finger scroll dx={} dy={}", dx, dy);
                            out.pointer_axis(Axis::Vertical, -dy, time);
                            out.pointer_axis(Axis::Horizontal, dx, time);
                        }
                    }
                    _ => tracing::trace!("Move without tracked fingers ignored"),
                }
            }

            TouchAction::PointerUp => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let Some(lifted) = event.action_pointer().map(|p| p.id) else {
                    return;
                };
                if !session.tracked.contains(&lifted) {
                    return;
                }
                session.tracked.retain(|id| *id != lifted);
                session.adopt(event, Some(lifted));

                match session.tracked_positions(event)[..] {
                    [remaining] => session.last_center = remaining,
                    [a, b] => session.last_center = midpoint(a, b),
                    _ => {}
                }
            }

            TouchAction::Up => {
                out.pointer_leave(time);

                let Some(session) = self.session.take() else {
                    return;
                };
                let Some(pointer) = event.action_pointer() else {
                    return;
                };

                let (origin, button) = if session.had_two_fingers {
                    (session.two_finger_center, Key::BTN_RIGHT)
                } else if session.saw_first_down {
                    (session.first_down, Key::BTN_LEFT)
                } else {
                    tracing::debug!("Sequence had no first finger down, not classifying a tap");
                    return;
                };
                if origin.is_tap_end(pointer.x, pointer.y, event.time_ms) {
                    tracing::debug!("touchpad tap: {:?}", button);
                    out.click(button, time);
                }
            }

            TouchAction::Cancel => {
                out.pointer_leave(time);
                self.session = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{ButtonState, PortCall, RecordingPort};

    fn finger(id: i32, x: f64, y: f64) -> TouchPointer {
        TouchPointer { id, x, y }
    }

    fn axis_calls(port: &RecordingPort) -> Vec<(Axis, f64)> {
        port.calls()
            .iter()
            .filter_map(|c| match c {
                PortCall::PointerAxis { axis, value, .. } => Some((*axis, *value)),
                _ => None,
            })
            .collect()
    }

    fn button_calls(port: &RecordingPort) -> Vec<(u16, ButtonState, u32)> {
        port.calls()
            .iter()
            .filter_map(|c| match c {
                PortCall::PointerButton {
                    button,
                    state,
                    time_ms,
                } => Some((*button, *state, *time_ms)),
                _ => None,
            })
            .collect()
    }

    /// Two fingers down at (100,100) and (200,100) at t=0/10.
    fn two_finger_session(recognizer: &mut GestureRecognizer, port: &mut RecordingPort) {
        recognizer.handle(
            port,
            &TouchEvent::new(TouchAction::Down, vec![finger(0, 100.0, 100.0)], 0),
        );
        recognizer.handle(
            port,
            &TouchEvent::new(
                TouchAction::PointerDown,
                vec![finger(0, 100.0, 100.0), finger(1, 200.0, 100.0)],
                10,
            )
            .with_action_index(1),
        );
    }

    #[test]
    fn test_single_finger_tap_is_left_click() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();

        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Down, vec![finger(0, 100.0, 100.0)], 1000),
        );
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(0, 102.0, 101.0)], 1150),
        );

        assert_eq!(
            port.calls(),
            &[
                PortCall::PointerEnter {
                    x: 100.0,
                    y: 100.0,
                    time_ms: 1000
                },
                PortCall::PointerMotion {
                    x: 100.0,
                    y: 100.0,
                    time_ms: 1000
                },
                PortCall::PointerLeave { time_ms: 1150 },
                PortCall::PointerButton {
                    button: 0x110,
                    state: ButtonState::Pressed,
                    time_ms: 1150
                },
                PortCall::PointerButton {
                    button: 0x110,
                    state: ButtonState::Released,
                    time_ms: 1151
                },
            ]
        );
        assert!(recognizer.session().is_none());
    }

    #[test]
    fn test_tap_thresholds_are_inclusive() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();

        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Down, vec![finger(0, 0.0, 0.0)], 0),
        );
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(0, 10.0, -10.0)], 300),
        );

        assert_eq!(button_calls(&port).len(), 2);
    }

    #[test]
    fn test_slow_or_far_touch_is_not_a_tap() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();

        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Down, vec![finger(0, 0.0, 0.0)], 0),
        );
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(0, 0.0, 0.0)], 301),
        );

        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Down, vec![finger(0, 0.0, 0.0)], 1000),
        );
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(0, 10.5, 0.0)], 1010),
        );

        assert!(button_calls(&port).is_empty());
    }

    #[test]
    fn test_one_finger_move_is_pointer_motion() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();

        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Down, vec![finger(7, 5.0, 5.0)], 0),
        );
        port.take();
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Move, vec![finger(7, 40.0, 50.0)], 16),
        );

        assert_eq!(
            port.calls(),
            &[PortCall::PointerMotion {
                x: 40.0,
                y: 50.0,
                time_ms: 16
            }]
        );
    }

    #[test]
    fn test_two_finger_move_scrolls_once_per_sample() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);
        port.take();

        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::Move,
                vec![finger(0, 105.0, 105.0), finger(1, 205.0, 105.0)],
                30,
            ),
        );

        assert_eq!(
            axis_calls(&port),
            vec![(Axis::Vertical, -5.0), (Axis::Horizontal, 5.0)]
        );
        assert_eq!(port.calls().len(), 2);
    }

    #[test]
    fn test_two_finger_move_without_delta_is_silent() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);
        port.take();

        // Fingers move apart symmetrically, midpoint stays put
        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::Move,
                vec![finger(0, 90.0, 100.0), finger(1, 210.0, 100.0)],
                30,
            ),
        );

        assert!(port.calls().is_empty());
    }

    #[test]
    fn test_explicit_scroll_axes_win() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);
        port.take();

        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::Move,
                vec![finger(0, 150.0, 150.0), finger(1, 250.0, 150.0)],
                30,
            )
            .with_scroll(0.0, -2.0),
        );

        assert_eq!(axis_calls(&port), vec![(Axis::Horizontal, -2.0)]);
    }

    #[test]
    fn test_two_finger_tap_is_right_click() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);

        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::PointerUp,
                vec![finger(0, 100.0, 100.0), finger(1, 200.0, 100.0)],
                100,
            )
            .with_action_index(0),
        );
        assert_eq!(
            recognizer.session().map(|s| s.last_center),
            Some((200.0, 100.0))
        );

        // Last finger lifts near the two-finger midpoint
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(1, 155.0, 104.0)], 150),
        );

        assert_eq!(
            button_calls(&port),
            vec![
                (0x111, ButtonState::Pressed, 150),
                (0x111, ButtonState::Released, 151)
            ]
        );
    }

    #[test]
    fn test_two_finger_session_never_left_clicks() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);

        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::PointerUp,
                vec![finger(0, 100.0, 100.0), finger(1, 200.0, 100.0)],
                100,
            )
            .with_action_index(1),
        );
        // Back where the first finger started, but far from the midpoint
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(0, 100.0, 100.0)], 120),
        );

        assert!(button_calls(&port).is_empty());
    }

    #[test]
    fn test_third_finger_is_ignored() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);

        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::PointerDown,
                vec![
                    finger(0, 100.0, 100.0),
                    finger(1, 200.0, 100.0),
                    finger(2, 500.0, 500.0),
                ],
                20,
            )
            .with_action_index(2),
        );
        let session = recognizer.session().expect("should have a session");
        assert_eq!(session.tracked_ids(), &[0, 1]);
        assert_eq!(session.two_finger_center.time_ms, 10);
        port.take();

        // Only the tracked pair contributes to the scroll delta
        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::Move,
                vec![
                    finger(0, 100.0, 110.0),
                    finger(1, 200.0, 110.0),
                    finger(2, 900.0, 900.0),
                ],
                30,
            ),
        );
        assert_eq!(
            axis_calls(&port),
            vec![(Axis::Vertical, -10.0), (Axis::Horizontal, 0.0)]
        );
    }

    #[test]
    fn test_untracked_finger_promoted_when_tracked_lifts() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);

        let three = vec![
            finger(0, 100.0, 100.0),
            finger(1, 200.0, 100.0),
            finger(2, 300.0, 100.0),
        ];
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::PointerDown, three.clone(), 20).with_action_index(2),
        );
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::PointerUp, three, 40).with_action_index(0),
        );

        let session = recognizer.session().expect("should have a session");
        assert_eq!(session.tracked_ids(), &[1, 2]);
        assert_eq!(session.last_center, (250.0, 100.0));
    }

    #[test]
    fn test_cancel_leaves_and_discards() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();
        two_finger_session(&mut recognizer, &mut port);
        port.take();

        recognizer.handle(&mut port, &TouchEvent::new(TouchAction::Cancel, vec![], 50));

        assert_eq!(port.calls(), &[PortCall::PointerLeave { time_ms: 50 }]);
        assert!(recognizer.session().is_none());
    }

    #[test]
    fn test_missing_session_is_tolerated() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();

        // Up without a sequence only leaves
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(0, 1.0, 1.0)], 5),
        );
        assert_eq!(port.take(), vec![PortCall::PointerLeave { time_ms: 5 }]);

        // Multi-finger move without a sequence is ignored
        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::Move,
                vec![finger(0, 1.0, 1.0), finger(1, 2.0, 2.0)],
                6,
            ),
        );
        assert!(port.calls().is_empty());

        // Second finger without a first starts a fresh two-finger session
        recognizer.handle(
            &mut port,
            &TouchEvent::new(
                TouchAction::PointerDown,
                vec![finger(0, 0.0, 0.0), finger(1, 20.0, 0.0)],
                7,
            )
            .with_action_index(1),
        );
        let session = recognizer.session().expect("should start a session");
        assert!(session.had_two_fingers);
        assert_eq!(session.two_finger_center.x, 10.0);
        assert!(port.calls().is_empty());
    }

    #[test]
    fn test_lone_pointer_down_without_sequence_never_left_clicks() {
        let mut port = RecordingPort::new();
        let mut recognizer = GestureRecognizer::new();

        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::PointerDown, vec![finger(3, 4.0, 4.0)], 100),
        );
        recognizer.handle(
            &mut port,
            &TouchEvent::new(TouchAction::Up, vec![finger(3, 4.0, 4.0)], 120),
        );

        assert_eq!(port.calls(), &[PortCall::PointerLeave { time_ms: 120 }]);
        assert!(recognizer.session().is_none());
    }
}
