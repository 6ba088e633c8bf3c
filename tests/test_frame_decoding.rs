//! Decoding raw input frames into controller snapshots

mod common;

use common::FrameBuilder;
use daydream_rs::daydream::constants::*;
use daydream_rs::{ButtonId, ControllerState, DaydreamError, Quaternion, Vect3};

#[test]
fn test_orientation_is_axis_angle() {
    // 1024 steps of 2*pi/4095 is a quarter turn about x
    let data = FrameBuilder::new().orientation([1024, 0, 0]).build();
    let state = ControllerState::decode(&data, 1).unwrap();

    let expected = Quaternion::from_axis_angle(Vect3::new(1.0, 0.0, 0.0), 1024.0 * ORIENTATION_SCALE).unwrap();
    assert!(state.orientation().approx_eq(expected, 1e-9));

    let rotated = state.orientation().rotate(Vect3::new(0.0, 1.0, 0.0));
    assert!(rotated.approx_eq(Vect3::new(0.0, 0.0, 1.0), 1e-3));
}

#[test]
fn test_motion_axes_are_signed() {
    let data = FrameBuilder::new()
        .accelerometer([500, -500, 0])
        .gyroscope([-1, 0, 4095])
        .build();
    let state = ControllerState::decode(&data, 1).unwrap();

    let accel = state.accelerometer();
    assert!((accel.x - 500.0 * ACCEL_SCALE).abs() < 1e-9);
    assert!((accel.y + 500.0 * ACCEL_SCALE).abs() < 1e-9);
    assert_eq!(accel.z, 0.0);

    let gyro = state.gyroscope();
    assert!((gyro.x + GYRO_SCALE).abs() < 1e-9);
    assert!((gyro.z - 4095.0 * GYRO_SCALE).abs() < 1e-9);
}

#[test]
fn test_touch_and_buttons() {
    let data = FrameBuilder::new()
        .touch(255, 0)
        .buttons(BUTTON_MASK_CLICK | BUTTON_MASK_VOLUME_UP)
        .build();
    let state = ControllerState::decode(&data, 1).unwrap();

    let touch = state.touch().unwrap();
    assert!((touch.x - 1.0).abs() < 1e-6);
    assert_eq!(touch.y, 0.0);

    let pressed: Vec<ButtonId> = state.buttons().pressed().collect();
    assert_eq!(pressed, vec![ButtonId::Click, ButtonId::VolumeUp]);
}

#[test]
fn test_short_frame_is_rejected() {
    let data = FrameBuilder::new().build();
    assert!(matches!(
        ControllerState::decode(&data[..12], 1),
        Err(DaydreamError::Decode { expected: 20, actual: 12 })
    ));
}
