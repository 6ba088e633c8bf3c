//! Touchpad gesture decoding
//!
//! The pad reports a position while a finger rests on it and (0, 0) otherwise.
//! Small jitter between frames is swallowed by the move threshold.

use serde::Serialize;

use crate::daydream::types::TouchPoint;

/// Default minimum distance between frames for a move to be reported
pub const DEFAULT_MOVE_THRESHOLD: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TouchEvent {
    Begin(TouchPoint),
    Move(TouchPoint),
    /// Finger lifted; carries the last known position
    End(TouchPoint),
}

/// Event for the change from `prev` to `curr`, if any
pub fn touch_transition(
    prev: Option<TouchPoint>,
    curr: Option<TouchPoint>,
    threshold: f32,
) -> Option<TouchEvent> {
    match (prev, curr) {
        (None, Some(point)) => Some(TouchEvent::Begin(point)),
        (Some(last), None) => Some(TouchEvent::End(last)),
        (Some(last), Some(point)) if last.distance(point) >= threshold => {
            Some(TouchEvent::Move(point))
        }
        _ => None,
    }
}

/// Touchpad tracker
///
/// Moves are measured from the last reported position, so a slow drag
/// still produces a move once it has covered `threshold` in total.
#[derive(Debug, Clone)]
pub struct Touchpad {
    threshold: f32,
    /// Position of the last `Begin` or `Move` sent
    reported: Option<TouchPoint>,
    /// Latest position seen, carried by `End`
    last: Option<TouchPoint>,
}

impl Touchpad {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            reported: None,
            last: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Current finger position, if touching
    pub fn point(&self) -> Option<TouchPoint> {
        self.last
    }

    pub fn update(&mut self, curr: Option<TouchPoint>) -> Option<TouchEvent> {
        let event = match (self.reported, curr) {
            (Some(_), None) => self.last.map(TouchEvent::End),
            (reported, curr) => touch_transition(reported, curr, self.threshold),
        };

        match event {
            Some(TouchEvent::Begin(point)) | Some(TouchEvent::Move(point)) => {
                self.reported = Some(point);
            }
            Some(TouchEvent::End(_)) => self.reported = None,
            None => {}
        }
        self.last = curr;
        event
    }

    /// Lift an active touch, returning the `End` it owes subscribers
    pub fn release(&mut self) -> Option<TouchEvent> {
        self.update(None)
    }
}

impl Default for Touchpad {
    fn default() -> Self {
        Self::new(DEFAULT_MOVE_THRESHOLD)
    }
}
