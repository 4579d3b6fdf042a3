//! Port backed by a uinput virtual device
//!
//! Lets a replayed session drive a real Linux input stack. Only what a
//! keyboard plus wheel mouse can express is supported: keys, pointer buttons
//! and scroll. Text-input, absolute pointer and touch calls report
//! [`PortError::Unsupported`], which the input layer logs and skips.

use anyhow::{Context, Result};
use evdev::{uinput::VirtualDeviceBuilder, AttributeSet, EventType, InputEvent, Key, RelativeAxisType};
use wl_input_core::{Axis, ButtonState, CursorRect, EventInjectionPort, PortError, PortResult};

/// Translate a port scroll value into a wheel event.
///
/// Values are rounded to whole detents; anything that rounds to zero yields
/// no event. Port axes follow Wayland, where positive vertical scrolls down,
/// while `REL_WHEEL` counts upward, so the vertical sign flips.
fn wheel_event(axis: Axis, value: f64) -> Option<InputEvent> {
    let detents = value.round() as i32;
    if detents == 0 {
        return None;
    }
    let (code, value) = match axis {
        Axis::Vertical => (RelativeAxisType::REL_WHEEL, -detents),
        Axis::Horizontal => (RelativeAxisType::REL_HWHEEL, detents),
    };
    Some(InputEvent::new(EventType::RELATIVE, code.0, value))
}

fn syn() -> InputEvent {
    InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
}

pub struct UinputPort {
    device: evdev::uinput::VirtualDevice,
}

impl UinputPort {
    /// Create the virtual device. Needs write access to `/dev/uinput`.
    pub fn new(name: &str) -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 0..256u16 {
            keys.insert(Key::new(code));
        }
        keys.insert(Key::BTN_LEFT);
        keys.insert(Key::BTN_RIGHT);
        keys.insert(Key::BTN_MIDDLE);

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_WHEEL);
        axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()
            .context("failed to open /dev/uinput")?
            .name(name)
            .with_keys(&keys)?
            .with_relative_axes(&axes)?
            .build()
            .context("failed to create virtual input device")?;

        tracing::info!("Created uinput device '{}'", name);
        Ok(Self { device })
    }

    fn emit(&mut self, events: &[InputEvent]) -> PortResult {
        self.device.emit(events)?;
        Ok(())
    }

    fn key(&mut self, key: Key, value: i32) -> PortResult {
        let event = InputEvent::new(EventType::KEY, key.code(), value);
        self.emit(&[event, syn()])
    }
}

impl EventInjectionPort for UinputPort {
    fn inject_key(&mut self, key: Key, pressed: bool, _time_ms: u32) -> PortResult {
        self.key(key, pressed as i32)
    }

    fn commit_text(&mut self, _text: &str) -> PortResult {
        Err(PortError::Unsupported {
            call: "commit_text",
        })
    }

    fn preedit_text(&mut self, _text: &str, _begin: usize, _end: usize) -> PortResult {
        Err(PortError::Unsupported {
            call: "preedit_text",
        })
    }

    fn delete_surrounding_text(&mut self, _before: usize, _after: usize) -> PortResult {
        Err(PortError::Unsupported {
            call: "delete_surrounding_text",
        })
    }

    fn pointer_motion(&mut self, _x: f64, _y: f64, _time_ms: u32) -> PortResult {
        Err(PortError::Unsupported {
            call: "pointer_motion",
        })
    }

    fn pointer_button(&mut self, button: Key, state: ButtonState, _time_ms: u32) -> PortResult {
        self.key(button, state as i32)
    }

    fn pointer_axis(&mut self, axis: Axis, value: f64, _time_ms: u32) -> PortResult {
        match wheel_event(axis, value) {
            Some(event) => self.emit(&[event, syn()]),
            None => Ok(()),
        }
    }

    fn pointer_enter(&mut self, _x: f64, _y: f64, _time_ms: u32) -> PortResult {
        Err(PortError::Unsupported {
            call: "pointer_enter",
        })
    }

    fn pointer_leave(&mut self, _time_ms: u32) -> PortResult {
        Err(PortError::Unsupported {
            call: "pointer_leave",
        })
    }

    fn touch_down(&mut self, _id: i32, _x: f64, _y: f64, _time_ms: u32) -> PortResult {
        Err(PortError::Unsupported { call: "touch_down" })
    }

    fn touch_motion(&mut self, _id: i32, _x: f64, _y: f64, _time_ms: u32) -> PortResult {
        Err(PortError::Unsupported {
            call: "touch_motion",
        })
    }

    fn touch_up(&mut self, _id: i32, _time_ms: u32) -> PortResult {
        Err(PortError::Unsupported { call: "touch_up" })
    }

    fn touch_cancel(&mut self) -> PortResult {
        Err(PortError::Unsupported {
            call: "touch_cancel",
        })
    }

    fn touch_frame(&mut self) -> PortResult {
        Err(PortError::Unsupported {
            call: "touch_frame",
        })
    }

    fn keyboard_focus(&mut self, focused: bool) -> PortResult {
        // A virtual device is always "focused"
        tracing::trace!("uinput ignores keyboard focus ({})", focused);
        Ok(())
    }

    fn cursor_rect(&mut self) -> PortResult<CursorRect> {
        Err(PortError::Unsupported {
            call: "cursor_rect",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertical_scroll_flips_sign() {
        let event = wheel_event(Axis::Vertical, 5.0).expect("should produce an event");
        assert_eq!(event.event_type(), EventType::RELATIVE);
        assert_eq!(event.code(), RelativeAxisType::REL_WHEEL.0);
        assert_eq!(event.value(), -5);
    }

    #[test]
    fn test_horizontal_scroll_keeps_sign() {
        let event = wheel_event(Axis::Horizontal, -2.4).expect("should produce an event");
        assert_eq!(event.code(), RelativeAxisType::REL_HWHEEL.0);
        assert_eq!(event.value(), -2);
    }

    #[test]
    fn test_sub_detent_scroll_is_dropped() {
        assert!(wheel_event(Axis::Vertical, 0.3).is_none());
        assert!(wheel_event(Axis::Horizontal, -0.49).is_none());
    }
}
