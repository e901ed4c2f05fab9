use glam::Vec2;

/// What the pointer was over when the host saw the event.
/// Events over UI chrome (buttons, panels) never become canvas taps or drags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerTarget {
    #[default]
    Canvas,
    Chrome,
}

/// The first two active touch points of a touch event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchSet {
    /// Number of active touches reported by the host (may exceed 2).
    pub count: u8,
    pub points: [Vec2; 2],
}

impl TouchSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn one(p: Vec2) -> Self {
        Self { count: 1, points: [p, Vec2::ZERO] }
    }

    pub fn two(a: Vec2, b: Vec2) -> Self {
        Self { count: 2, points: [a, b] }
    }

    pub fn first(&self) -> Option<Vec2> {
        (self.count >= 1).then_some(self.points[0])
    }

    pub fn pair(&self) -> Option<(Vec2, Vec2)> {
        (self.count >= 2).then_some((self.points[0], self.points[1]))
    }
}

/// Input event types the engine understands, in screen coordinates relative to the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Mouse/pen press. `button` follows DOM numbering (0 primary, 1 middle).
    PointerDown { x: f32, y: f32, button: u8, target: PointerTarget },
    /// Mouse/pen moved.
    PointerMove { x: f32, y: f32 },
    /// Mouse/pen released.
    PointerUp { x: f32, y: f32, target: PointerTarget },
    /// Touches began; `touches` is the full set of active touches.
    TouchStart { touches: TouchSet, target: PointerTarget },
    /// Touches moved.
    TouchMove { touches: TouchSet },
    /// Touches ended; `touches` is the set still on the surface.
    TouchEnd { touches: TouchSet, target: PointerTarget },
    /// Wheel notch. Positive `delta_y` scrolls down (zooms out).
    Wheel { x: f32, y: f32, delta_y: f32, target: PointerTarget },
}

impl InputEvent {
    /// Whether every coordinate in the event is finite.
    pub fn is_finite(&self) -> bool {
        let touches_ok = |t: &TouchSet| t.points.iter().all(|p| p.is_finite());
        match self {
            InputEvent::PointerDown { x, y, .. }
            | InputEvent::PointerMove { x, y }
            | InputEvent::PointerUp { x, y, .. } => x.is_finite() && y.is_finite(),
            InputEvent::TouchStart { touches, .. }
            | InputEvent::TouchMove { touches }
            | InputEvent::TouchEnd { touches, .. } => touches_ok(touches),
            InputEvent::Wheel { x, y, delta_y, .. } => {
                x.is_finite() && y.is_finite() && delta_y.is_finite()
            }
        }
    }
}

/// A queue of input events.
/// The host pushes events as they arrive; the engine drains them in order.
pub struct InputQueue {
    events: Vec<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(32),
        }
    }

    /// Push a new input event. Events with non-finite coordinates are dropped.
    pub fn push(&mut self, event: InputEvent) {
        if event.is_finite() {
            self.events.push(event);
        } else {
            log::debug!("dropping non-finite input event {:?}", event);
        }
    }

    /// Drain all pending events. Returns a Vec and clears the queue.
    pub fn drain(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Check if there are pending events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain() {
        let mut q = InputQueue::new();
        q.push(InputEvent::PointerDown { x: 10.0, y: 20.0, button: 0, target: PointerTarget::Canvas });
        q.push(InputEvent::Wheel { x: 1.0, y: 1.0, delta_y: 120.0, target: PointerTarget::Canvas });
        assert_eq!(q.len(), 2);
        let events = q.drain();
        assert_eq!(events.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn non_finite_events_are_dropped() {
        let mut q = InputQueue::new();
        q.push(InputEvent::PointerMove { x: f32::NAN, y: 0.0 });
        q.push(InputEvent::TouchMove {
            touches: TouchSet::two(Vec2::ZERO, Vec2::new(f32::INFINITY, 0.0)),
        });
        assert!(q.is_empty());
    }

    #[test]
    fn touch_set_accessors() {
        let set = TouchSet::one(Vec2::new(3.0, 4.0));
        assert_eq!(set.first(), Some(Vec2::new(3.0, 4.0)));
        assert_eq!(set.pair(), None);
        assert_eq!(TouchSet::none().first(), None);
        let pair = TouchSet::two(Vec2::ZERO, Vec2::ONE);
        assert_eq!(pair.pair(), Some((Vec2::ZERO, Vec2::ONE)));
    }
}
