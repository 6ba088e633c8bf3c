//! Edge-triggered button decoding

use serde::Serialize;

use crate::daydream::types::{ButtonId, ButtonSet};

/// A single press or release transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ButtonEvent {
    Down(ButtonId),
    Up(ButtonId),
}

impl ButtonEvent {
    pub fn button(self) -> ButtonId {
        match self {
            ButtonEvent::Down(id) | ButtonEvent::Up(id) => id,
        }
    }
}

/// Transitions between two consecutive frames, in `ButtonId::ALL` order
pub fn button_edges(prev: ButtonSet, curr: ButtonSet) -> Vec<ButtonEvent> {
    ButtonId::ALL
        .into_iter()
        .filter_map(|id| edge(id, prev.is_pressed(id), curr.is_pressed(id)))
        .collect()
}

fn edge(id: ButtonId, was_pressed: bool, is_pressed: bool) -> Option<ButtonEvent> {
    match (was_pressed, is_pressed) {
        (false, true) => Some(ButtonEvent::Down(id)),
        (true, false) => Some(ButtonEvent::Up(id)),
        _ => None,
    }
}

/// Tracks one physical button across frames
#[derive(Debug, Clone, Copy)]
pub struct ControllerButton {
    id: ButtonId,
    pressed: bool,
}

impl ControllerButton {
    pub fn new(id: ButtonId) -> Self {
        Self { id, pressed: false }
    }

    pub fn id(&self) -> ButtonId {
        self.id
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Feed this frame's raw state, returning the transition if there was one
    pub fn update(&mut self, pressed: bool) -> Option<ButtonEvent> {
        let event = edge(self.id, self.pressed, pressed);
        self.pressed = pressed;
        event
    }

    /// Let go of a held button, returning the `Up` it owes subscribers
    pub fn release(&mut self) -> Option<ButtonEvent> {
        self.update(false)
    }
}
