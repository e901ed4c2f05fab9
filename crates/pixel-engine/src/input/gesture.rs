//! Tap vs. pan vs. zoom classification of raw pointer, touch and wheel input.
//!
//! State machine: `Idle → Tracking → Idle` for single-pointer presses, with `Pinching`
//! entered whenever two touches are down and left once fewer than two remain.
//! A press only becomes a tap if its travel never exceeded the drag threshold.

use glam::Vec2;

use crate::api::config::CanvasConfig;
use crate::core::viewport::Viewport;
use crate::input::queue::{InputEvent, PointerTarget, TouchSet};

/// Classified output. Pan and zoom variants carry the proposed (already clamped) transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Pan { offset: Vec2 },
    PinchZoom { offset: Vec2, scale: f32 },
    WheelZoom { offset: Vec2, scale: f32 },
    Tap { screen: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressSource {
    Mouse,
    Touch,
}

/// Per-press record, created on down and discarded on release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub source: PressSource,
    pub start_screen: Vec2,
    pub start_offset: Vec2,
    /// Latest known position. Touch releases carry no coordinates, so taps use this.
    pub last_screen: Vec2,
    pub travel_distance: f32,
    pub has_exceeded_threshold: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchState {
    pub start_distance: f32,
    pub start_scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Tracking(DragState),
    Pinching(PinchState),
}

pub struct GestureClassifier {
    state: GestureState,
    drag_threshold: f32,
    wheel_step: f32,
}

impl GestureClassifier {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            state: GestureState::Idle,
            drag_threshold: config.drag_threshold,
            wheel_step: config.wheel_zoom_step,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// True while a press has turned into a pan (for the host's cursor style).
    pub fn is_panning(&self) -> bool {
        matches!(self.state, GestureState::Tracking(d) if d.has_exceeded_threshold)
    }

    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
    }

    /// Feed one event. Returns the gesture it completes or advances, if any.
    pub fn handle(&mut self, event: &InputEvent, viewport: &Viewport) -> Option<Gesture> {
        match *event {
            InputEvent::PointerDown { x, y, button, target } => {
                if target == PointerTarget::Chrome || button > 1 {
                    return None;
                }
                if matches!(self.state, GestureState::Pinching(_)) {
                    return None;
                }
                self.begin_press(PressSource::Mouse, Vec2::new(x, y), viewport);
                None
            }
            InputEvent::PointerMove { x, y } => {
                self.track_move(PressSource::Mouse, Vec2::new(x, y), viewport)
            }
            InputEvent::PointerUp { x, y, target } => {
                let state = std::mem::take(&mut self.state);
                if target == PointerTarget::Chrome {
                    return None;
                }
                match state {
                    GestureState::Tracking(drag) if drag.source == PressSource::Mouse => {
                        self.tap_if_still(&drag, Vec2::new(x, y))
                    }
                    other => {
                        // touch gestures are not ended by a mouse release
                        self.state = other;
                        None
                    }
                }
            }
            InputEvent::TouchStart { touches, target } => {
                if target == PointerTarget::Chrome {
                    return None;
                }
                self.touch_start(touches, viewport);
                None
            }
            InputEvent::TouchMove { touches } => self.touch_move(touches, viewport),
            InputEvent::TouchEnd { touches, target } => self.touch_end(touches, target),
            InputEvent::Wheel { x, y, delta_y, target } => {
                if target == PointerTarget::Chrome || delta_y == 0.0 {
                    return None;
                }
                let factor = if delta_y > 0.0 { 1.0 / self.wheel_step } else { self.wheel_step };
                let (offset, scale) = viewport.zoomed_at(Vec2::new(x, y), viewport.scale() * factor);
                Some(Gesture::WheelZoom { offset, scale })
            }
        }
    }

    fn begin_press(&mut self, source: PressSource, at: Vec2, viewport: &Viewport) {
        self.state = GestureState::Tracking(DragState {
            source,
            start_screen: at,
            start_offset: viewport.offset(),
            last_screen: at,
            travel_distance: 0.0,
            has_exceeded_threshold: false,
        });
    }

    fn track_move(&mut self, source: PressSource, at: Vec2, viewport: &Viewport) -> Option<Gesture> {
        let threshold = self.drag_threshold;
        let GestureState::Tracking(drag) = &mut self.state else {
            return None;
        };
        if drag.source != source {
            return None;
        }
        let delta = at - drag.start_screen;
        drag.travel_distance = delta.length();
        drag.last_screen = at;
        if drag.travel_distance > threshold {
            drag.has_exceeded_threshold = true;
        }
        if !drag.has_exceeded_threshold {
            return None;
        }
        let offset = viewport.clamped(drag.start_offset + delta, viewport.scale());
        Some(Gesture::Pan { offset })
    }

    fn tap_if_still(&self, drag: &DragState, at: Vec2) -> Option<Gesture> {
        if drag.has_exceeded_threshold || drag.travel_distance > self.drag_threshold {
            return None;
        }
        Some(Gesture::Tap { screen: at })
    }

    fn touch_start(&mut self, touches: TouchSet, viewport: &Viewport) {
        if let Some((a, b)) = touches.pair() {
            self.state = GestureState::Pinching(PinchState {
                start_distance: a.distance(b).max(1.0),
                start_scale: viewport.scale(),
            });
            return;
        }
        if matches!(self.state, GestureState::Pinching(_)) {
            return;
        }
        if let Some(p) = touches.first() {
            self.begin_press(PressSource::Touch, p, viewport);
        }
    }

    fn touch_move(&mut self, touches: TouchSet, viewport: &Viewport) -> Option<Gesture> {
        match self.state {
            GestureState::Pinching(pinch) => {
                let (a, b) = touches.pair()?;
                let ratio = a.distance(b) / pinch.start_distance;
                let midpoint = (a + b) * 0.5;
                let (offset, scale) = viewport.zoomed_at(midpoint, pinch.start_scale * ratio);
                Some(Gesture::PinchZoom { offset, scale })
            }
            GestureState::Tracking(_) if touches.count == 1 => {
                let p = touches.first()?;
                self.track_move(PressSource::Touch, p, viewport)
            }
            _ => None,
        }
    }

    fn touch_end(&mut self, remaining: TouchSet, target: PointerTarget) -> Option<Gesture> {
        if target == PointerTarget::Chrome {
            self.state = GestureState::Idle;
            return None;
        }
        match self.state {
            GestureState::Pinching(_) => {
                if remaining.count < 2 {
                    self.state = GestureState::Idle;
                }
                None
            }
            GestureState::Tracking(drag) if drag.source == PressSource::Touch => {
                self.state = GestureState::Idle;
                self.tap_if_still(&drag, drag.last_screen)
            }
            _ => None,
        }
    }
}
