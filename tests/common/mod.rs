//! Helpers for building raw Daydream input frames

#![allow(dead_code)]

/// Builder for 20-byte input notifications
#[derive(Default)]
pub struct FrameBuilder {
    orientation: [i32; 3],
    accelerometer: [i32; 3],
    gyroscope: [i32; 3],
    touch: (u8, u8),
    buttons: u8,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orientation(mut self, raw: [i32; 3]) -> Self {
        self.orientation = raw;
        self
    }

    pub fn accelerometer(mut self, raw: [i32; 3]) -> Self {
        self.accelerometer = raw;
        self
    }

    pub fn gyroscope(mut self, raw: [i32; 3]) -> Self {
        self.gyroscope = raw;
        self
    }

    pub fn touch(mut self, x: u8, y: u8) -> Self {
        self.touch = (x, y);
        self
    }

    pub fn buttons(mut self, mask: u8) -> Self {
        self.buttons = mask;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frame = vec![0u8; 20];
        write_bits(&mut frame, 0, 9, 1);
        write_bits(&mut frame, 9, 5, 1);
        write_axes(&mut frame, 14, self.orientation);
        write_axes(&mut frame, 53, self.accelerometer);
        write_axes(&mut frame, 92, self.gyroscope);
        write_bits(&mut frame, 131, 8, self.touch.0 as u32);
        write_bits(&mut frame, 139, 8, self.touch.1 as u32);
        frame[18] |= self.buttons;
        frame
    }
}

fn write_axes(frame: &mut [u8], offset: usize, values: [i32; 3]) {
    for (i, value) in values.iter().enumerate() {
        write_bits(frame, offset + i * 13, 13, (*value as u32) & 0x1FFF);
    }
}

/// Write `len` bits of `value` MSB first starting at bit `offset`
fn write_bits(frame: &mut [u8], offset: usize, len: usize, value: u32) {
    for i in 0..len {
        if (value >> (len - 1 - i)) & 1 == 1 {
            let bit = offset + i;
            frame[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
}
