//! Input abstraction layer.
//!
//! Normalizes mouse, touch, and stylus events plus container resizes into
//! a single `InputEvent` enum consumed by the signing session. Positions
//! are logical (CSS) pixels relative to the canvas origin.

use serde::{Deserialize, Serialize};
use sigdoc_core::StrokePoint;

/// A normalized input event from any pointing device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InputEvent {
    /// Pointer pressed (mouse down, touch start, pen contact).
    PointerDown {
        x: f32,
        y: f32,
        /// Pressure from 0.0 to 1.0. Devices without pressure report 0 or 1.
        #[serde(default = "full_pressure")]
        pressure: f32,
        timestamp_ms: u64,
    },

    PointerMove {
        x: f32,
        y: f32,
        #[serde(default = "full_pressure")]
        pressure: f32,
        timestamp_ms: u64,
    },

    /// Pointer released. The release position is the stroke's last sample.
    PointerUp { x: f32, y: f32, timestamp_ms: u64 },

    /// The browser took the pointer away (scroll gesture, palm rejection).
    PointerCancel,

    /// Container or pixel ratio changed.
    Resize {
        width: f32,
        height: f32,
        device_pixel_ratio: f32,
    },
}

fn full_pressure() -> f32 {
    1.0
}

impl InputEvent {
    pub fn pointer_down(x: f32, y: f32, pressure: f32, timestamp_ms: u64) -> Self {
        Self::PointerDown {
            x,
            y,
            pressure,
            timestamp_ms,
        }
    }

    pub fn pointer_move(x: f32, y: f32, pressure: f32, timestamp_ms: u64) -> Self {
        Self::PointerMove {
            x,
            y,
            pressure,
            timestamp_ms,
        }
    }

    pub fn pointer_up(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::PointerUp { x, y, timestamp_ms }
    }

    /// The sample this event contributes to a stroke, if any.
    pub fn sample(&self) -> Option<StrokePoint> {
        match *self {
            Self::PointerDown {
                x,
                y,
                pressure,
                timestamp_ms,
            }
            | Self::PointerMove {
                x,
                y,
                pressure,
                timestamp_ms,
            } => Some(StrokePoint::new(x, y, timestamp_ms).with_pressure(pressure)),
            Self::PointerUp { x, y, timestamp_ms } => Some(StrokePoint::new(x, y, timestamp_ms)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn events_parse_from_camel_case_json() {
        let events: Vec<InputEvent> = serde_json::from_str(
            r#"[
                {"type":"pointerDown","x":1,"y":2,"timestampMs":0},
                {"type":"pointerMove","x":3,"y":4,"pressure":0.5,"timestampMs":16},
                {"type":"pointerUp","x":3,"y":4,"timestampMs":20},
                {"type":"pointerCancel"},
                {"type":"resize","width":600,"height":256,"devicePixelRatio":2}
            ]"#,
        )
        .unwrap();
        assert_eq!(events[0], InputEvent::pointer_down(1.0, 2.0, 1.0, 0));
        assert_eq!(events[1], InputEvent::pointer_move(3.0, 4.0, 0.5, 16));
        assert_eq!(events[3], InputEvent::PointerCancel);
        assert_eq!(events[4].sample(), None);
    }

    #[test]
    fn up_samples_at_full_pressure() {
        let p = InputEvent::pointer_up(5.0, 6.0, 9).sample().unwrap();
        assert_eq!(p, StrokePoint::new(5.0, 6.0, 9));
    }
}
