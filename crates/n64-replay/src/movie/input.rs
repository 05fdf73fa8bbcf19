/// Controller button bits as polled from the PIF.
pub mod buttons {
    pub const R_DPAD: u16 = 1 << 0;
    pub const L_DPAD: u16 = 1 << 1;
    pub const D_DPAD: u16 = 1 << 2;
    pub const U_DPAD: u16 = 1 << 3;
    pub const START: u16 = 1 << 4;
    pub const Z: u16 = 1 << 5;
    pub const B: u16 = 1 << 6;
    pub const A: u16 = 1 << 7;
    pub const R_CBUTTON: u16 = 1 << 8;
    pub const L_CBUTTON: u16 = 1 << 9;
    pub const D_CBUTTON: u16 = 1 << 10;
    pub const U_CBUTTON: u16 = 1 << 11;
    pub const R_TRIG: u16 = 1 << 12;
    pub const L_TRIG: u16 = 1 << 13;
}

/// One polled controller state: buttons plus analog stick.
///
/// Stored in movies and freeze buffers as a little-endian u32:
/// buttons in the low half, stick X in byte 2, stick Y in byte 3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputSample {
    pub buttons: u16,
    pub stick_x: i8,
    pub stick_y: i8,
}

impl InputSample {
    pub const SIZE: usize = 4;

    pub fn from_raw(raw: u32) -> Self {
        Self {
            buttons: raw as u16,
            stick_x: (raw >> 16) as u8 as i8,
            stick_y: (raw >> 24) as u8 as i8,
        }
    }

    pub fn to_raw(self) -> u32 {
        self.buttons as u32 | (self.stick_x as u8 as u32) << 16 | (self.stick_y as u8 as u32) << 24
    }

    pub fn is_pressed(self, mask: u16) -> bool {
        self.buttons & mask != 0
    }

    /// Decode a packed run of samples; trailing partial bytes are ignored.
    pub fn parse_all(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(Self::SIZE)
            .map(|c| Self::from_raw(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect()
    }
}
