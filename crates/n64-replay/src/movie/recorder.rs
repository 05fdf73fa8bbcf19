/// The active movie's header, input buffer and cursor.
///
/// Recording appends polled input past the end of the buffer; a sample
/// already buffered at the cursor (left there by a warp-modify) is fed back
/// instead. Playback feeds buffered samples until the buffer runs out.
use std::path::{Path, PathBuf};

use super::{file, InputSample, MovieError, MovieFreeze, MovieHeader, RestoreMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Idle,
    StartRecordingFromReset,
    StartRecordingFromSnapshot,
    StartRecordingFromExistingSnapshot,
    Recording,
    StartPlaybackFromReset,
    StartPlaybackFromSnapshot,
    Playback,
}

impl Task {
    pub fn is_recording(self) -> bool {
        matches!(
            self,
            Task::StartRecordingFromReset
                | Task::StartRecordingFromSnapshot
                | Task::StartRecordingFromExistingSnapshot
                | Task::Recording
        )
    }

    pub fn is_playback(self) -> bool {
        matches!(
            self,
            Task::StartPlaybackFromReset | Task::StartPlaybackFromSnapshot | Task::Playback
        )
    }

    /// Recording or playing back, not waiting on a start condition.
    pub fn is_running(self) -> bool {
        matches!(self, Task::Recording | Task::Playback)
    }
}

/// What a controller poll did with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No movie sample involved; live input goes through.
    Passthrough,
    /// Live input was appended to the buffer.
    Recorded,
    /// A buffered sample replaced the live input.
    Played,
    /// Playback reached the end of the buffer.
    Ended,
}

#[derive(Debug)]
pub struct MovieLog {
    task: Task,
    path: Option<PathBuf>,
    header: MovieHeader,
    inputs: Vec<InputSample>,
    current_sample: usize,
    current_vi: usize,
}

impl Default for MovieLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MovieLog {
    pub fn new() -> Self {
        Self {
            task: Task::Idle,
            path: None,
            header: MovieHeader::default(),
            inputs: Vec::new(),
            current_sample: 0,
            current_vi: 0,
        }
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn is_active(&self) -> bool {
        self.task != Task::Idle
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn header(&self) -> &MovieHeader {
        &self.header
    }

    pub fn inputs(&self) -> &[InputSample] {
        &self.inputs
    }

    pub fn uid(&self) -> u32 {
        self.header.uid
    }

    pub fn current_sample(&self) -> usize {
        self.current_sample
    }

    pub fn current_vi(&self) -> usize {
        self.current_vi
    }

    pub fn length_samples(&self) -> usize {
        self.inputs.len()
    }

    pub fn length_vis(&self) -> u32 {
        self.header.length_vis
    }

    pub fn rerecord_count(&self) -> u64 {
        self.header.rerecord_count
    }

    pub(crate) fn set_task(&mut self, task: Task) {
        if task != self.task {
            log::info!("[VCR] Task {:?} -> {:?}", self.task, task);
            self.task = task;
        }
    }

    /// Take ownership of a movie. The cursor starts at sample 0.
    pub(crate) fn begin(
        &mut self,
        path: PathBuf,
        header: MovieHeader,
        inputs: Vec<InputSample>,
        task: Task,
    ) -> Result<(), MovieError> {
        if self.is_active() {
            return Err(MovieError::AlreadyActive);
        }
        log::info!(
            "[VCR] Movie {:?}: {} samples, {} rerecords",
            path,
            inputs.len(),
            header.rerecord_count
        );
        self.path = Some(path);
        self.header = header;
        self.inputs = inputs;
        self.current_sample = 0;
        self.current_vi = 0;
        self.set_task(task);
        Ok(())
    }

    /// Drop the movie and go idle. The caller saves first if it must.
    pub(crate) fn end(&mut self) {
        self.set_task(Task::Idle);
        self.path = None;
        self.inputs.clear();
        self.current_sample = 0;
        self.current_vi = 0;
    }

    /// Swap in a new buffer, keeping the cursor.
    pub(crate) fn replace_inputs(&mut self, inputs: Vec<InputSample>) {
        self.inputs = inputs;
        self.header.length_samples = self.inputs.len() as u32;
    }

    pub(crate) fn set_author_info(&mut self, author: &str, description: &str) {
        self.header.author = author.to_string();
        self.header.description = description.to_string();
    }

    /// Write header and buffer to the movie's file.
    pub fn save(&mut self) -> Result<(), MovieError> {
        let path = self.path.clone().ok_or(MovieError::NoMovie)?;
        self.header.length_samples = self.inputs.len() as u32;
        file::write_movie(&path, &self.header, &self.inputs)?;
        log::debug!("[VCR] Wrote {} samples to {:?}", self.inputs.len(), path);
        Ok(())
    }

    /// Movie position for embedding in a savestate; `None` while idle.
    pub fn freeze(&self) -> Option<MovieFreeze> {
        if !self.is_active() {
            return None;
        }
        Some(MovieFreeze::new(
            self.header.uid,
            self.current_sample as u32,
            self.current_vi as u32,
            self.inputs.clone(),
        ))
    }

    /// Validate `freeze` against this movie without changing anything.
    ///
    /// Modes that keep the active buffer also need the cursor to land inside it.
    pub fn check_freeze(&self, freeze: &MovieFreeze, mode: RestoreMode) -> Result<(), MovieError> {
        if !self.is_active() {
            return Err(MovieError::NoMovie);
        }
        freeze.check(self.header.uid)?;
        match mode {
            RestoreMode::Rerecord => Ok(()),
            RestoreMode::ReadOnly | RestoreMode::Reposition => {
                if freeze.current_sample as usize > self.inputs.len() {
                    return Err(MovieError::InvalidFrame);
                }
                Ok(())
            }
        }
    }

    /// Restore the movie position carried by a savestate.
    pub fn unfreeze(&mut self, freeze: &MovieFreeze, mode: RestoreMode) -> Result<(), MovieError> {
        self.check_freeze(freeze, mode)?;
        let current = freeze.current_sample as usize;

        match mode {
            RestoreMode::Rerecord => {
                self.inputs = freeze.samples()[..current].to_vec();
                self.header.length_samples = current as u32;
                self.header.length_vis = freeze.current_vi;
                self.header.rerecord_count = self.header.rerecord_count.wrapping_add(1);
                self.set_task(Task::Recording);
            }
            RestoreMode::ReadOnly => self.set_task(Task::Playback),
            RestoreMode::Reposition => {}
        }

        self.current_sample = current;
        self.current_vi = freeze.current_vi as usize;
        log::debug!(
            "[VCR] Unfrozen at sample {} (vi {}) in {:?} mode",
            self.current_sample,
            self.current_vi,
            mode
        );
        Ok(())
    }

    /// Feed or capture one controller poll.
    ///
    /// Mirrors the PIF's view: `input` holds the live state on entry and
    /// whatever the core should see on return.
    pub fn on_controller_poll(&mut self, index: usize, input: &mut InputSample) -> PollOutcome {
        match self.task {
            Task::StartRecordingFromReset => self.set_task(Task::Recording),
            Task::StartPlaybackFromReset => self.set_task(Task::Playback),
            _ => {}
        }

        if !self.task.is_running() || !self.header.controller_present(index) {
            return PollOutcome::Passthrough;
        }

        if self.task == Task::Playback {
            let Some(sample) = self.inputs.get(self.current_sample) else {
                return PollOutcome::Ended;
            };
            *input = *sample;
            self.current_sample += 1;
            return PollOutcome::Played;
        }

        if let Some(sample) = self.inputs.get(self.current_sample) {
            *input = *sample;
            self.current_sample += 1;
            return PollOutcome::Played;
        }
        self.inputs.push(*input);
        self.current_sample += 1;
        self.header.length_samples = self.inputs.len() as u32;
        PollOutcome::Recorded
    }

    pub fn on_vi(&mut self) {
        if !self.task.is_running() {
            return;
        }
        self.current_vi += 1;
        if self.task == Task::Recording && self.current_sample >= self.inputs.len() {
            self.header.length_vis = self.current_vi as u32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n: u32) -> Vec<InputSample> {
        (0..n).map(|i| InputSample::from_raw(i + 1)).collect()
    }

    fn active(task: Task, inputs: Vec<InputSample>) -> MovieLog {
        let mut log = MovieLog::new();
        let header = MovieHeader {
            uid: 1234,
            ..MovieHeader::default()
        };
        log.begin(PathBuf::from("test.m64"), header, inputs, task)
            .expect("idle log accepts a movie");
        log
    }

    #[test]
    fn playback_feeds_buffer_then_ends() {
        let mut log = active(Task::StartPlaybackFromReset, samples(2));
        let mut input = InputSample::default();
        assert_eq!(log.on_controller_poll(0, &mut input), PollOutcome::Played);
        assert_eq!(log.task(), Task::Playback);
        assert_eq!(input.to_raw(), 1);
        assert_eq!(log.on_controller_poll(1, &mut input), PollOutcome::Passthrough);
        assert_eq!(log.on_controller_poll(0, &mut input), PollOutcome::Played);
        assert_eq!(log.on_controller_poll(0, &mut input), PollOutcome::Ended);
        assert_eq!(log.current_sample(), 2);
    }

    #[test]
    fn recording_prefers_buffered_future() {
        let mut log = active(Task::Recording, samples(1));
        let mut live = InputSample::from_raw(0xAA);
        assert_eq!(log.on_controller_poll(0, &mut live), PollOutcome::Played);
        assert_eq!(live.to_raw(), 1);

        let mut live = InputSample::from_raw(0xBB);
        assert_eq!(log.on_controller_poll(0, &mut live), PollOutcome::Recorded);
        assert_eq!(live.to_raw(), 0xBB);
        assert_eq!(log.length_samples(), 2);
        assert_eq!(log.header().length_samples, 2);
    }

    #[test]
    fn freeze_and_unfreeze_modes() {
        let mut log = active(Task::Recording, samples(10));
        log.current_sample = 4;
        log.current_vi = 8;
        let frozen = log.freeze().expect("active movie freezes");
        assert_eq!(frozen.inputs.len(), 11);

        log.current_sample = 9;
        log.unfreeze(&frozen, RestoreMode::Reposition).expect("reposition");
        assert_eq!((log.current_sample(), log.length_samples()), (4, 10));
        assert_eq!(log.task(), Task::Recording);

        log.unfreeze(&frozen, RestoreMode::ReadOnly).expect("read-only");
        assert_eq!(log.task(), Task::Playback);
        assert_eq!(log.length_samples(), 10);

        log.unfreeze(&frozen, RestoreMode::Rerecord).expect("rerecord");
        assert_eq!(log.task(), Task::Recording);
        assert_eq!(log.length_samples(), 4);
        assert_eq!(log.rerecord_count(), 1);
        assert_eq!(log.current_vi(), 8);
    }

    #[test]
    fn failed_unfreeze_changes_nothing() {
        let mut log = active(Task::Playback, samples(5));
        let mut foreign = log.freeze().expect("freeze");
        foreign.uid = 1;
        log.current_sample = 3;
        assert!(matches!(
            log.unfreeze(&foreign, RestoreMode::Rerecord),
            Err(MovieError::NotFromThisMovie)
        ));
        assert_eq!(log.current_sample(), 3);
        assert_eq!(log.task(), Task::Playback);
        assert_eq!(log.rerecord_count(), 0);
    }

    #[test]
    fn idle_log_has_no_freeze() {
        let log = MovieLog::new();
        assert!(log.freeze().is_none());
        let freeze = MovieFreeze::new(0, 0, 0, Vec::new());
        assert!(matches!(
            log.check_freeze(&freeze, RestoreMode::Rerecord),
            Err(MovieError::NoMovie)
        ));
    }

    #[test]
    fn cursor_past_a_shorter_buffer_is_only_accepted_for_rerecords() {
        let mut log = active(Task::Playback, samples(10));
        log.current_sample = 8;
        let late = log.freeze().expect("freeze");
        log.replace_inputs(samples(5));
        log.current_sample = 2;

        for mode in [RestoreMode::ReadOnly, RestoreMode::Reposition] {
            assert!(matches!(
                log.unfreeze(&late, mode),
                Err(MovieError::InvalidFrame)
            ));
            assert_eq!(log.current_sample(), 2);
            assert_eq!(log.task(), Task::Playback);
        }

        log.unfreeze(&late, RestoreMode::Rerecord).expect("rerecord");
        assert_eq!((log.current_sample(), log.length_samples()), (8, 8));
    }
}
