/// Bounds-checked little-endian cursors over savestate buffers.
///
/// Every read goes through `read_exact`, which fails with
/// `StateError::Truncated` instead of walking off the end of the buffer.
/// `Wire` describes fixed-size values that know their own encoding.
use super::StateError;

// ─── Binary Writer ───────────────────────────────────────────

pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write exactly `len` bytes: `data` truncated or zero-extended to fit.
    pub fn write_exact(&mut self, data: &[u8], len: usize) {
        let take = data.len().min(len);
        self.buf.extend_from_slice(&data[..take]);
        self.buf.resize(self.buf.len() + (len - take), 0);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ─── Binary Reader ───────────────────────────────────────────

pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail early when fewer than `len` bytes are left.
    pub fn require(&self, len: usize) -> Result<(), StateError> {
        if self.remaining() < len {
            return Err(StateError::Truncated {
                needed: self.pos + len,
                available: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8], StateError> {
        self.require(len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StateError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    pub fn read_u16(&mut self) -> Result<u16, StateError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, StateError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, StateError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, StateError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn skip(&mut self, len: usize) -> Result<(), StateError> {
        self.read_exact(len).map(|_| ())
    }
}

// ─── Fixed-size wire values ──────────────────────────────────

/// A value with a fixed-size little-endian encoding.
pub trait Wire: Sized {
    const SIZE: usize;

    fn put(&self, w: &mut StateWriter);
    fn get(r: &mut StateReader<'_>) -> Result<Self, StateError>;
}

impl Wire for u16 {
    const SIZE: usize = 2;

    fn put(&self, w: &mut StateWriter) {
        w.write_u16(*self);
    }

    fn get(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        r.read_u16()
    }
}

impl Wire for u8 {
    const SIZE: usize = 1;

    fn put(&self, w: &mut StateWriter) {
        w.write_bytes(&[*self]);
    }

    fn get(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        Ok(r.read_exact(1)?[0])
    }
}

impl Wire for u32 {
    const SIZE: usize = 4;

    fn put(&self, w: &mut StateWriter) {
        w.write_u32(*self);
    }

    fn get(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        r.read_u32()
    }
}

impl Wire for u64 {
    const SIZE: usize = 8;

    fn put(&self, w: &mut StateWriter) {
        w.write_u64(*self);
    }

    fn get(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        r.read_u64()
    }
}

impl<const N: usize> Wire for [u8; N] {
    const SIZE: usize = N;

    fn put(&self, w: &mut StateWriter) {
        w.write_bytes(self);
    }

    fn get(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        r.read_array()
    }
}

impl<const N: usize> Wire for [u64; N] {
    const SIZE: usize = 8 * N;

    fn put(&self, w: &mut StateWriter) {
        for v in self {
            w.write_u64(*v);
        }
    }

    fn get(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        let mut out = [0u64; N];
        for v in &mut out {
            *v = r.read_u64()?;
        }
        Ok(out)
    }
}

/// Declare a register block whose wire layout is its field order.
///
/// Padding that the legacy layout inherited from C struct alignment is
/// spelled out as explicit `[u8; N]` fields.
macro_rules! register_block {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* pub $field:ident: $ty:ty, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::savestate::cursor::Wire for $name {
            const SIZE: usize = 0 $( + <$ty as $crate::savestate::cursor::Wire>::SIZE )*;

            fn put(&self, w: &mut $crate::savestate::cursor::StateWriter) {
                $( $crate::savestate::cursor::Wire::put(&self.$field, w); )*
            }

            fn get(
                r: &mut $crate::savestate::cursor::StateReader<'_>,
            ) -> Result<Self, $crate::savestate::StateError> {
                Ok(Self {
                    $( $field: <$ty as $crate::savestate::cursor::Wire>::get(r)?, )*
                })
            }
        }
    };
}

pub(crate) use register_block;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_refuses_to_read_past_end() {
        let data = [1u8, 2, 3];
        let mut r = StateReader::new(&data);
        assert_eq!(r.read_exact(2).expect("two bytes"), &[1, 2]);
        let err = r.read_u32().expect_err("only one byte left");
        assert!(matches!(
            err,
            StateError::Truncated {
                needed: 6,
                available: 3
            }
        ));
        // A failed read does not advance the cursor.
        assert_eq!(r.position(), 2);
    }

    #[test]
    fn write_exact_pads_and_truncates() {
        let mut w = StateWriter::with_capacity(8);
        w.write_exact(&[0xAA, 0xBB], 4);
        w.write_exact(&[1, 2, 3, 4, 5], 3);
        assert_eq!(w.into_bytes(), vec![0xAA, 0xBB, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn values_are_little_endian() {
        let mut w = StateWriter::with_capacity(16);
        w.write_u32(0x1234_5678);
        w.write_u64(0x0102_0304_0506_0708);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..4], &[0x78, 0x56, 0x34, 0x12]);

        let mut r = StateReader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(r.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.remaining(), 0);
    }
}
