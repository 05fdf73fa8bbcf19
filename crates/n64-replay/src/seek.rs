use std::str::FromStr;

use crate::savestate::StateError;

#[derive(Debug, thiserror::Error)]
pub enum SeekError {
    #[error("no movie is running")]
    NoMovie,
    #[error("invalid seek target {0:?}")]
    Parse(String),
    #[error("seek target {target} is outside the movie (0..={length})")]
    OutOfRange { target: i64, length: usize },
    #[error("a seek is already in progress")]
    AlreadySeeking,
    #[error("no seek savestate at or before sample {0}")]
    NoCheckpoint(usize),
    #[error("failed to queue checkpoint load: {0}")]
    Queue(#[from] StateError),
}

/// A parsed seek string: `N`, `+N`, `-N` or `^N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    Absolute(u64),
    Forward(u64),
    Backward(u64),
    /// Samples before the end of the movie.
    FromEnd(u64),
}

impl FromStr for SeekTarget {
    type Err = SeekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (ctor, digits): (fn(u64) -> SeekTarget, &str) = match s.chars().next() {
            Some('+') => (SeekTarget::Forward, &s[1..]),
            Some('-') => (SeekTarget::Backward, &s[1..]),
            Some('^') => (SeekTarget::FromEnd, &s[1..]),
            _ => (SeekTarget::Absolute, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SeekError::Parse(s.to_string()));
        }
        digits
            .parse()
            .map(ctor)
            .map_err(|_| SeekError::Parse(s.to_string()))
    }
}

impl SeekTarget {
    /// Resolve against the cursor and movie length; the result lies in `0..=length`.
    pub fn resolve(self, current: usize, length: usize) -> Result<usize, SeekError> {
        let (current, len) = (current as i64, length as i64);
        let offset = |n: u64, overflow: i64| {
            i64::try_from(n).map_err(|_| SeekError::OutOfRange {
                target: overflow,
                length,
            })
        };
        let target = match self {
            SeekTarget::Absolute(n) => offset(n, i64::MAX)?,
            SeekTarget::Forward(n) => current.saturating_add(offset(n, i64::MAX)?),
            SeekTarget::Backward(n) => current.saturating_sub(offset(n, i64::MIN)?),
            SeekTarget::FromEnd(n) => len.saturating_sub(offset(n, i64::MIN)?),
        };
        if !(0..=len).contains(&target) {
            return Err(SeekError::OutOfRange { target, length });
        }
        Ok(target as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOperation {
    pub target: usize,
    pub pause_at_end: bool,
    /// A checkpoint load is queued and the cursor is not yet meaningful.
    pub awaiting_rollback: bool,
}

/// At most one seek at a time. Replay itself is driven by the session.
#[derive(Debug, Default)]
pub struct SeekController {
    active: Option<SeekOperation>,
}

impl SeekController {
    pub fn is_seeking(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&SeekOperation> {
        self.active.as_ref()
    }

    pub(crate) fn begin(
        &mut self,
        target: usize,
        pause_at_end: bool,
        rollback: bool,
    ) -> Result<(), SeekError> {
        if self.active.is_some() {
            return Err(SeekError::AlreadySeeking);
        }
        log::info!("[VCR] Seeking to sample {}", target);
        self.active = Some(SeekOperation {
            target,
            pause_at_end,
            awaiting_rollback: rollback,
        });
        Ok(())
    }

    pub(crate) fn rollback_done(&mut self) {
        if let Some(op) = &mut self.active {
            op.awaiting_rollback = false;
        }
    }

    /// `(current, target)`, or `(current, usize::MAX)` with no seek running.
    pub fn completion(&self, current: usize) -> (usize, usize) {
        match &self.active {
            Some(op) => (current, op.target),
            None => (current, usize::MAX),
        }
    }

    /// Finish the seek if `current` reached the target.
    pub(crate) fn poll_complete(&mut self, current: usize) -> Option<SeekOperation> {
        let op = self.active?;
        if op.awaiting_rollback || current < op.target {
            return None;
        }
        log::info!("[VCR] Seek finished at sample {}", current);
        self.active = None;
        Some(op)
    }

    pub(crate) fn stop(&mut self) -> Option<SeekOperation> {
        let op = self.active.take();
        if op.is_some() {
            log::info!("[VCR] Seek stopped");
        }
        op
    }
}
