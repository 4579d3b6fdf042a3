//! Direct multi-touch forwarding, used when touchpad mode is off

use crate::event::{port_time, TouchAction, TouchEvent};
use crate::port::{EventInjectionPort, Injector};

/// Forwards platform touch events 1:1, keyed by platform pointer id.
///
/// Every platform callback ends with one `touch_frame`, except cancel,
/// which is not framed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughMultitouch;

impl PassthroughMultitouch {
    pub fn new() -> Self {
        Self
    }

    pub fn handle<P: EventInjectionPort + ?Sized>(&self, port: &mut P, event: &TouchEvent) {
        let mut out = Injector::new(port);
        let time = port_time(event.time_ms);

        match event.action {
            TouchAction::Down | TouchAction::PointerDown => {
                let Some(pointer) = event.action_pointer() else {
                    return;
                };
                out.touch_down(pointer.id, pointer.x, pointer.y, time);
                out.touch_frame();
            }
            TouchAction::Move => {
                for pointer in &event.pointers {
                    out.touch_motion(pointer.id, pointer.x, pointer.y, time);
                }
                out.touch_frame();
            }
            TouchAction::Up | TouchAction::PointerUp => {
                let Some(pointer) = event.action_pointer() else {
                    return;
                };
                out.touch_up(pointer.id, time);
                out.touch_frame();
            }
            TouchAction::Cancel => out.touch_cancel(),
        }
    }
}
