/// Movie freeze buffer: the movie position embedded in a savestate.
///
/// Wire layout (little-endian):
///   size u32, uid u32, current_sample u32, current_vi u32,
///   length_samples u32, then length_samples + 1 raw input samples.
use super::{InputSample, MovieError};
use crate::savestate::cursor::{StateReader, StateWriter};
use crate::savestate::StateError;

/// Bytes of the four fields `size` counts before the inputs.
pub const FREEZE_FIELDS_SIZE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieFreeze {
    /// Byte count of everything after this field.
    pub size: u32,
    pub uid: u32,
    pub current_sample: u32,
    pub current_vi: u32,
    pub length_samples: u32,
    /// `length_samples + 1` samples; the last is lookahead.
    pub inputs: Vec<InputSample>,
}

/// How a validated freeze is applied to the active movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Read-write: truncate at the freeze position, switch to recording
    /// and count a rerecord.
    Rerecord,
    /// Read-only: keep the buffer and continue as playback.
    ReadOnly,
    /// Move the cursor only; task and buffer are left alone.
    Reposition,
}

impl MovieFreeze {
    pub fn new(
        uid: u32,
        current_sample: u32,
        current_vi: u32,
        mut inputs: Vec<InputSample>,
    ) -> Self {
        let length_samples = inputs.len() as u32;
        inputs.push(InputSample::default());
        Self {
            size: expected_size(length_samples),
            uid,
            current_sample,
            current_vi,
            length_samples,
            inputs,
        }
    }

    /// Validate against the active movie's uid without touching anything.
    pub fn check(&self, movie_uid: u32) -> Result<(), MovieError> {
        if self.size < FREEZE_FIELDS_SIZE {
            return Err(MovieError::InvalidFormat);
        }
        if self.uid != movie_uid {
            return Err(MovieError::NotFromThisMovie);
        }
        if self.current_sample > self.length_samples {
            return Err(MovieError::InvalidFrame);
        }
        if (self.size as u64) < expected_size(self.length_samples) as u64
            || self.inputs.len() != self.length_samples as usize + 1
        {
            return Err(MovieError::InvalidFormat);
        }
        Ok(())
    }

    /// The recorded samples without the lookahead entry.
    pub fn samples(&self) -> &[InputSample] {
        let len = (self.length_samples as usize).min(self.inputs.len());
        &self.inputs[..len]
    }

    pub(crate) fn write(&self, w: &mut StateWriter) {
        w.write_u32(self.size);
        w.write_u32(self.uid);
        w.write_u32(self.current_sample);
        w.write_u32(self.current_vi);
        w.write_u32(self.length_samples);
        for sample in &self.inputs {
            w.write_u32(sample.to_raw());
        }
    }

    pub(crate) fn read(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        let size = r.read_u32()?;
        let uid = r.read_u32()?;
        let current_sample = r.read_u32()?;
        let current_vi = r.read_u32()?;
        let length_samples = r.read_u32()?;

        // Bound the allocation by what the buffer actually holds.
        let bytes = (length_samples as usize)
            .checked_add(1)
            .and_then(|count| count.checked_mul(InputSample::SIZE))
            .ok_or(StateError::Malformed("freeze length overflows"))?;
        let inputs = InputSample::parse_all(r.read_exact(bytes)?);

        Ok(Self {
            size,
            uid,
            current_sample,
            current_vi,
            length_samples,
            inputs,
        })
    }
}

fn expected_size(length_samples: u32) -> u32 {
    let inputs = (length_samples as u64 + 1) * InputSample::SIZE as u64;
    (FREEZE_FIELDS_SIZE as u64 + inputs).min(u32::MAX as u64) as u32
}
