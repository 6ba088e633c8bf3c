//! Controller input snapshots
//!
//! A `ControllerState` is decoded from one 20-byte input notification and never
//! changes afterwards. The next notification produces a new snapshot.
//!
//! Frame layout (bit offsets, MSB first):
//! - 0..9     controller time
//! - 9..14    sequence number
//! - 14..53   orientation x/y/z (13-bit signed, axis-angle)
//! - 53..92   accelerometer x/y/z (13-bit signed)
//! - 92..131  gyroscope x/y/z (13-bit signed)
//! - 131..147 touch x/y (8-bit unsigned, 0/0 = no touch)
//! - byte 18  button bits (low 5 bits)

use serde::Serialize;

use crate::daydream::constants::*;
use crate::daydream::types::{ButtonId, ButtonSet, TouchPoint};
use crate::error::{DaydreamError, Result};
use crate::math::{Quaternion, Vect3};

const TIME_OFFSET: usize = 0;
const SEQUENCE_OFFSET: usize = 9;
const ORIENTATION_OFFSET: usize = 14;
const ACCEL_OFFSET: usize = 53;
const GYRO_OFFSET: usize = 92;
const TOUCH_OFFSET: usize = 131;
const AXIS_BITS: usize = 13;

/// Immutable snapshot of one controller's inputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerState {
    timestamp_us: u64,
    sequence: u8,
    controller_time: u16,
    orientation: Quaternion,
    accelerometer: Vect3,
    gyroscope: Vect3,
    buttons: ButtonSet,
    touch: Option<TouchPoint>,
}

impl ControllerState {
    /// Decode an input frame received at `timestamp_us` (host monotonic clock)
    pub fn decode(frame: &[u8], timestamp_us: u64) -> Result<Self> {
        if frame.len() < FRAME_LEN {
            return Err(DaydreamError::Decode {
                expected: FRAME_LEN,
                actual: frame.len(),
            });
        }

        let controller_time = read_bits(frame, TIME_OFFSET, 9) as u16;
        let sequence = read_bits(frame, SEQUENCE_OFFSET, 5) as u8;

        let rotation = read_vect3(frame, ORIENTATION_OFFSET, ORIENTATION_SCALE);
        let accelerometer = read_vect3(frame, ACCEL_OFFSET, ACCEL_SCALE);
        let gyroscope = read_vect3(frame, GYRO_OFFSET, GYRO_SCALE);

        let touch_x = read_bits(frame, TOUCH_OFFSET, 8);
        let touch_y = read_bits(frame, TOUCH_OFFSET + 8, 8);
        let touch = if touch_x == 0 && touch_y == 0 {
            None
        } else {
            Some(TouchPoint::new(
                touch_x as f32 * TOUCH_SCALE,
                touch_y as f32 * TOUCH_SCALE,
            ))
        };

        Ok(Self {
            timestamp_us,
            sequence,
            controller_time,
            orientation: Quaternion::from_rotation_vector(rotation),
            accelerometer,
            gyroscope,
            buttons: ButtonSet::from_bits(frame[BUTTON_BYTE_INDEX]),
            touch,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_inputs(
        timestamp_us: u64,
        orientation: Quaternion,
        buttons: ButtonSet,
        touch: Option<TouchPoint>,
    ) -> Self {
        Self {
            timestamp_us,
            sequence: 0,
            controller_time: 0,
            orientation,
            accelerometer: Vect3::zero(),
            gyroscope: Vect3::zero(),
            buttons,
            touch,
        }
    }

    /// Host receive time in microseconds
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// 5-bit rolling sequence number from the controller
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// 9-bit rolling controller clock
    pub fn controller_time(&self) -> u16 {
        self.controller_time
    }

    pub fn orientation(&self) -> Quaternion {
        self.orientation
    }

    /// Linear acceleration in m/s²
    pub fn accelerometer(&self) -> Vect3 {
        self.accelerometer
    }

    /// Angular velocity in rad/s
    pub fn gyroscope(&self) -> Vect3 {
        self.gyroscope
    }

    pub fn buttons(&self) -> ButtonSet {
        self.buttons
    }

    pub fn is_pressed(&self, id: ButtonId) -> bool {
        self.buttons.is_pressed(id)
    }

    pub fn touch(&self) -> Option<TouchPoint> {
        self.touch
    }

    pub fn touching(&self) -> bool {
        self.touch.is_some()
    }

    /// Buttons that went from released in `prev` to pressed here
    pub fn pressed_since(&self, prev: &ControllerState) -> ButtonSet {
        ButtonSet::from_bits(self.buttons.bits() & !prev.buttons.bits())
    }

    /// Buttons that went from pressed in `prev` to released here
    pub fn released_since(&self, prev: &ControllerState) -> ButtonSet {
        ButtonSet::from_bits(prev.buttons.bits() & !self.buttons.bits())
    }
}

/// Read `len` bits starting at bit `offset`, most significant bit first
fn read_bits(frame: &[u8], offset: usize, len: usize) -> u32 {
    (offset..offset + len).fold(0u32, |acc, pos| {
        let bit = (frame[pos / 8] >> (7 - pos % 8)) & 1;
        (acc << 1) | bit as u32
    })
}

fn read_signed_axis(frame: &[u8], offset: usize) -> i32 {
    let raw = read_bits(frame, offset, AXIS_BITS) as i32;
    (raw << (32 - AXIS_BITS)) >> (32 - AXIS_BITS)
}

fn read_vect3(frame: &[u8], offset: usize, scale: f64) -> Vect3 {
    Vect3::new(
        read_signed_axis(frame, offset) as f64 * scale,
        read_signed_axis(frame, offset + AXIS_BITS) as f64 * scale,
        read_signed_axis(frame, offset + 2 * AXIS_BITS) as f64 * scale,
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn write_bits(frame: &mut [u8], offset: usize, len: usize, value: u32) {
        for i in 0..len {
            let pos = offset + i;
            let bit = ((value >> (len - 1 - i)) & 1) as u8;
            frame[pos / 8] |= bit << (7 - pos % 8);
        }
    }

    /// Raw frame with the given orientation axes, touch and button byte
    pub(crate) fn frame(orientation: [i32; 3], touch: (u8, u8), buttons: u8) -> Vec<u8> {
        let mut frame = vec![0u8; FRAME_LEN];
        write_bits(&mut frame, TIME_OFFSET, 9, 0x155);
        write_bits(&mut frame, SEQUENCE_OFFSET, 5, 7);
        for (i, v) in orientation.iter().enumerate() {
            write_bits(&mut frame, ORIENTATION_OFFSET + i * AXIS_BITS, AXIS_BITS, (*v as u32) & 0x1FFF);
        }
        write_bits(&mut frame, TOUCH_OFFSET, 8, touch.0 as u32);
        write_bits(&mut frame, TOUCH_OFFSET + 8, 8, touch.1 as u32);
        frame[BUTTON_BYTE_INDEX] |= buttons;
        frame
    }

    #[test]
    fn test_decode_header_and_buttons() {
        let data = frame([0, 0, 0], (0, 0), BUTTON_MASK_HOME | BUTTON_MASK_VOLUME_DOWN);
        let state = ControllerState::decode(&data, 42).unwrap();

        assert_eq!(state.timestamp_us(), 42);
        assert_eq!(state.controller_time(), 0x155);
        assert_eq!(state.sequence(), 7);
        assert!(state.is_pressed(ButtonId::Home));
        assert!(state.is_pressed(ButtonId::VolumeDown));
        assert!(!state.is_pressed(ButtonId::Click));
        assert!(!state.touching());
        assert_eq!(state.orientation(), Quaternion::identity());
    }

    #[test]
    fn test_decode_touch_does_not_leak_into_buttons() {
        // touch y ends in the top bits of byte 18, next to the buttons
        let data = frame([0, 0, 0], (255, 255), 0);
        let state = ControllerState::decode(&data, 0).unwrap();

        let touch = state.touch().unwrap();
        assert!((touch.x - 1.0).abs() < 1e-6);
        assert!((touch.y - 1.0).abs() < 1e-6);
        assert!(state.buttons().is_empty());
    }

    #[test]
    fn test_decode_signed_orientation() {
        // -4095 * 2pi/4095 = -2pi around y; 1000 units around x
        let data = frame([1000, -4095, 0], (0, 0), 0);
        let state = ControllerState::decode(&data, 0).unwrap();

        let expected = Quaternion::from_rotation_vector(Vect3::new(
            1000.0 * ORIENTATION_SCALE,
            -4095.0 * ORIENTATION_SCALE,
            0.0,
        ));
        assert!(state.orientation().approx_eq(expected, 1e-9));
        assert!((state.orientation().magnitude() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let err = ControllerState::decode(&[0u8; 12], 0).unwrap_err();
        assert!(matches!(err, DaydreamError::Decode { expected: 20, actual: 12 }));
    }

    #[test]
    fn test_edges_between_snapshots() {
        let prev = ControllerState::from_inputs(
            1,
            Quaternion::identity(),
            ButtonSet::from_bits(BUTTON_MASK_APP | BUTTON_MASK_HOME),
            None,
        );
        let curr = ControllerState::from_inputs(
            2,
            Quaternion::identity(),
            ButtonSet::from_bits(BUTTON_MASK_HOME | BUTTON_MASK_CLICK),
            None,
        );

        assert_eq!(curr.pressed_since(&prev), ButtonSet::from_bits(BUTTON_MASK_CLICK));
        assert_eq!(curr.released_since(&prev), ButtonSet::from_bits(BUTTON_MASK_APP));
        assert!(curr.pressed_since(&curr).is_empty());
    }
}
