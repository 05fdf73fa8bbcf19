/// Warp-modify: replacing input history behind (or around) the cursor.
///
/// `plan` decides how much of the past has to be replayed. The session
/// carries out a rollback by loading a checkpoint and seeking back to
/// where the cursor was.
use crate::movie::InputSample;
use crate::seek::SeekError;

#[derive(Debug, thiserror::Error)]
pub enum WarpError {
    #[error("the new input buffer is empty")]
    EmptyInput,
    #[error("no movie is running")]
    NoMovie,
    #[error("a warp modify operation is already in progress")]
    AlreadyWarping,
    #[error(transparent)]
    Seek(#[from] SeekError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarpStatus {
    #[default]
    None,
    Warping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpPlan {
    /// Same length and content; nothing to do.
    Identical,
    /// Longer, and nothing before the cursor changed: swap the buffer in.
    Extend { common: usize },
    /// Load a checkpoint at or before `rollback_to` and replay to `resume_at`.
    Rollback {
        common: usize,
        rollback_to: usize,
        resume_at: usize,
    },
}

/// Length of the longest shared prefix.
pub fn common_prefix(a: &[InputSample], b: &[InputSample]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

pub fn plan(
    current: &[InputSample],
    candidate: &[InputSample],
    current_sample: usize,
) -> Result<WarpPlan, WarpError> {
    if candidate.is_empty() {
        return Err(WarpError::EmptyInput);
    }
    let common = common_prefix(current, candidate);

    if common == current.len() && common == candidate.len() {
        return Ok(WarpPlan::Identical);
    }
    if candidate.len() > current.len() && common >= current_sample {
        return Ok(WarpPlan::Extend { common });
    }
    Ok(WarpPlan::Rollback {
        common,
        rollback_to: common.min(current_sample),
        resume_at: current_sample.min(candidate.len()),
    })
}

#[derive(Debug, Default)]
pub struct WarpController {
    status: WarpStatus,
    first_difference: Option<usize>,
}

impl WarpController {
    pub fn status(&self) -> WarpStatus {
        self.status
    }

    pub fn is_warping(&self) -> bool {
        self.status == WarpStatus::Warping
    }

    /// First sample that differed in the last edit, or `usize::MAX`.
    pub fn first_difference_frame(&self) -> usize {
        self.first_difference.unwrap_or(usize::MAX)
    }

    pub(crate) fn record(&mut self, plan: WarpPlan) {
        self.first_difference = match plan {
            WarpPlan::Identical => None,
            WarpPlan::Extend { common } | WarpPlan::Rollback { common, .. } => Some(common),
        };
    }

    /// Returns whether the status changed.
    pub(crate) fn set_status(&mut self, status: WarpStatus) -> bool {
        if self.status == status {
            return false;
        }
        log::info!("[VCR] Warp modify status {:?} -> {:?}", self.status, status);
        self.status = status;
        true
    }

    pub(crate) fn reset(&mut self) {
        self.status = WarpStatus::None;
        self.first_difference = None;
    }
}
