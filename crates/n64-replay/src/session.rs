/// Owns every piece of savestate and movie state.
///
/// All machine mutation happens in `do_work`, on the thread that also runs
/// the core. Other threads only push requests through a `QueueHandle`.
/// Seeks and warp-modifies never touch the machine directly: they queue
/// checkpoint loads and let the core replay forward, with the session
/// watching the movie cursor from the controller-poll hook.
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::checkpoint::CheckpointStore;
use crate::config::ReplayConfig;
use crate::engine::{ExecutionCore, NullHooks, ReplayEvent, ReplayHooks, LEGACY_ENTRY_PC};
use crate::movie::header::{controller, start_flags};
use crate::movie::{
    file, InputSample, MovieError, MovieHeader, MovieLog, PollOutcome, RestoreMode, Task,
};
use crate::savestate::codec::{self, Decoded};
use crate::savestate::queue::{self, Job, Medium, QueueHandle, SavestateTask, TaskOutcome, TaskTag};
use crate::savestate::{compress, StateError};
use crate::seek::{SeekController, SeekError, SeekTarget};
use crate::warp::{self, WarpController, WarpError, WarpPlan, WarpStatus};

pub const SLOT_COUNT: usize = 10;

pub struct ReplaySession<H: ReplayHooks = NullHooks> {
    config: ReplayConfig,
    hooks: H,
    queue: QueueHandle,
    movie: MovieLog,
    checkpoints: CheckpointStore,
    seek: SeekController,
    warp: WarpController,
    undo: Option<Vec<u8>>,
    selected_slot: usize,
}

impl<H: ReplayHooks> ReplaySession<H> {
    pub fn new(config: ReplayConfig, hooks: H) -> Self {
        let checkpoints = CheckpointStore::new(
            config.seek_savestate_interval,
            config.seek_savestate_max_count,
        );
        Self {
            config,
            hooks,
            queue: QueueHandle::new(),
            movie: MovieLog::new(),
            checkpoints,
            seek: SeekController::default(),
            warp: WarpController::default(),
            undo: None,
            selected_slot: 0,
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.config.read_only = read_only;
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// A handle other threads can enqueue through.
    pub fn queue(&self) -> QueueHandle {
        self.queue.clone()
    }

    pub fn movie(&self) -> &MovieLog {
        &self.movie
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn undo_savestate(&self) -> Option<&[u8]> {
        self.undo.as_deref()
    }

    /// Called when emulation starts or stops. Stopping drops pending tasks.
    pub fn set_core_launched(&mut self, launched: bool) {
        self.queue.set_launched(launched);
        if !launched {
            self.stop_seek();
        }
    }

    fn confirm(&mut self, message: &str) -> bool {
        if self.config.silent {
            log::info!("[ST] Auto-confirming: {}", message);
            return true;
        }
        self.hooks.confirm(message)
    }

    fn notify_task_change(&mut self, before: Task) {
        let now = self.movie.task();
        if now != before {
            self.hooks.notify(ReplayEvent::TaskChanged(now));
        }
    }

    // ─── Savestate requests ──────────────────────────────────

    pub fn selected_slot(&self) -> usize {
        self.selected_slot
    }

    pub fn select_slot(&mut self, slot: usize) {
        self.selected_slot = slot % SLOT_COUNT;
        self.hooks.notify(ReplayEvent::SlotChanged(self.selected_slot));
    }

    pub fn save_slot(&mut self, slot: usize) -> Result<(), StateError> {
        self.queue
            .enqueue(SavestateTask::new(Job::Save, Medium::Slot(slot)))?;
        self.select_slot(slot);
        if self.config.increment_slot {
            self.select_slot(slot + 1);
        }
        Ok(())
    }

    pub fn load_slot(&mut self, slot: usize) -> Result<(), StateError> {
        self.queue
            .enqueue(SavestateTask::new(Job::Load, Medium::Slot(slot)))?;
        self.select_slot(slot);
        Ok(())
    }

    pub fn save_file(&self, path: &Path) -> Result<(), StateError> {
        self.queue
            .enqueue(SavestateTask::new(Job::Save, Medium::Path(path.to_path_buf())))
    }

    pub fn load_file(&self, path: &Path, ignore_warnings: bool) -> Result<(), StateError> {
        let mut task = SavestateTask::new(Job::Load, Medium::Path(path.to_path_buf()));
        task.ignore_warnings = ignore_warnings;
        self.queue.enqueue(task)
    }

    /// Capture into memory; the bytes come back from `do_work` tagged `id`.
    pub fn save_memory(&self, id: u64) -> Result<(), StateError> {
        self.queue.enqueue(
            SavestateTask::new(Job::Save, Medium::Memory(Vec::new())).tagged(TaskTag::Caller(id)),
        )
    }

    pub fn load_memory(&self, state: Vec<u8>, id: u64) -> Result<(), StateError> {
        self.queue
            .enqueue(SavestateTask::new(Job::Load, Medium::Memory(state)).tagged(TaskTag::Caller(id)))
    }

    /// Load the state captured before the most recent load.
    pub fn undo_load(&self) -> Result<(), StateError> {
        let undo = self.undo.clone().ok_or(StateError::NotFound)?;
        self.queue
            .enqueue(SavestateTask::new(Job::Load, Medium::Memory(undo)))
    }

    // ─── Drain ───────────────────────────────────────────────

    /// Run every pending task. Tasks queued while draining (checkpoints,
    /// movie starts) run before this returns.
    ///
    /// Returns the outcomes of caller-issued tasks; internal ones are
    /// consumed here.
    pub fn do_work(&mut self, core: &mut dyn ExecutionCore) -> Vec<TaskOutcome> {
        let mut finished = Vec::new();
        loop {
            let tasks = self.queue.take();
            if tasks.is_empty() {
                break;
            }
            for task in queue::prepare(tasks, self.config.undo_on_load) {
                let outcome = self.execute(core, task);
                if let Some(outcome) = self.dispatch(outcome) {
                    finished.push(outcome);
                }
            }
        }
        finished
    }

    fn execute(&mut self, core: &mut dyn ExecutionCore, task: SavestateTask) -> TaskOutcome {
        let label = match &task.medium {
            Medium::Slot(slot) => format!("slot {}", slot),
            Medium::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Medium::Memory(_) => "memory".to_string(),
        };

        let result = match task.job {
            Job::Save => self.save_state(core, &task.medium),
            Job::Load => {
                let mode = self.restore_mode(task.tag);
                self.load_state(core, task.medium, task.ignore_warnings, mode)
            }
        };

        let verb = match task.job {
            Job::Save => "save",
            Job::Load => "load",
        };
        match &result {
            Ok(_) => log::debug!("[ST] {} {} done", verb, label),
            Err(StateError::Cancelled) => log::info!("[ST] Cancelled {} of {}", verb, label),
            Err(e) => log::error!("[ST] Failed to {} {}: {}", verb, label, e),
        }

        TaskOutcome {
            job: task.job,
            tag: task.tag,
            label,
            result,
        }
    }

    fn restore_mode(&self, tag: Option<TaskTag>) -> Option<RestoreMode> {
        match tag {
            Some(TaskTag::MovieStart) => None,
            Some(TaskTag::SeekRollback | TaskTag::Checkpoint) => Some(RestoreMode::Reposition),
            _ if self.config.read_only => Some(RestoreMode::ReadOnly),
            _ => Some(RestoreMode::Rerecord),
        }
    }

    fn state_path(&self, core: &dyn ExecutionCore, medium: &Medium) -> Option<PathBuf> {
        match medium {
            Medium::Slot(slot) => Some(queue::slot_path(
                &self.config.saves_dir,
                &core.rom_identity(),
                *slot,
            )),
            Medium::Path(path) => Some(path.clone()),
            Medium::Memory(_) => None,
        }
    }

    fn save_state(
        &mut self,
        core: &mut dyn ExecutionCore,
        medium: &Medium,
    ) -> Result<Vec<u8>, StateError> {
        let mut snapshot = core.capture();
        snapshot.movie = self.movie.freeze();
        snapshot.screenshot = if self.config.st_screenshot {
            self.hooks.capture_screen()
        } else {
            None
        };

        let encoded = codec::encode(&mut snapshot)?;
        if encoded.fixup_applied {
            core.apply(&snapshot);
            core.skip_next_si_dma();
        }

        if let Some(path) = self.state_path(core, medium) {
            self.write_state_file(&path, &encoded.bytes)?;
            log::info!("[ST] Saved {:?}", path);
        }

        self.hooks.notify(ReplayEvent::StateSaved);
        Ok(encoded.bytes)
    }

    fn write_state_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StateError> {
        let data = if self.config.compress_savestates {
            Cow::Owned(compress::compress(bytes, self.config.compression_level)?)
        } else {
            Cow::Borrowed(bytes)
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(StateError::FileWrite)?;
        }
        fs::write(path, &data).map_err(StateError::FileWrite)
    }

    fn load_state(
        &mut self,
        core: &mut dyn ExecutionCore,
        medium: Medium,
        ignore_warnings: bool,
        mode: Option<RestoreMode>,
    ) -> Result<Vec<u8>, StateError> {
        let raw = match self.state_path(core, &medium) {
            Some(path) => read_state_file(&path)?,
            None => match medium {
                Medium::Memory(buf) => buf,
                _ => Vec::new(),
            },
        };
        if raw.is_empty() {
            return Err(StateError::NotFound);
        }

        let inflated = match compress::decompress(&raw)? {
            Cow::Owned(data) => Some(data),
            Cow::Borrowed(_) => None,
        };
        let data = inflated.unwrap_or(raw);

        let hash = codec::read_rom_hash(&data)?;
        if !ignore_warnings && hash != core.rom_identity().md5 {
            let message = format!(
                "The savestate was created on a rom with hash {}, but is being loaded on another rom.\nThe emulator may crash. Are you sure you want to continue?",
                String::from_utf8_lossy(&hash)
            );
            if !self.confirm(&message) {
                return Err(StateError::Cancelled);
            }
        }

        let result = match codec::decode(&data) {
            Ok(decoded) => self.apply_decoded(core, decoded, ignore_warnings, mode),
            Err(e) => Err(e),
        };

        // Runs whether or not the state was applied.
        let pc = core.program_counter();
        core.set_legacy_entry(pc == LEGACY_ENTRY_PC);

        result.map(|()| data)
    }

    fn apply_decoded(
        &mut self,
        core: &mut dyn ExecutionCore,
        decoded: Decoded,
        ignore_warnings: bool,
        mode: Option<RestoreMode>,
    ) -> Result<(), StateError> {
        let Decoded {
            snapshot,
            skip_si_dma,
        } = decoded;

        let mut restore = None;
        if let Some(mode) = mode {
            match &snapshot.movie {
                Some(freeze) => match self.movie.check_freeze(freeze, mode) {
                    Ok(()) => restore = Some(mode),
                    Err(err) => {
                        log::warn!("[ST] Movie freeze not restored: {}", err);
                        if !ignore_warnings && self.movie.is_active() {
                            let message = format!(
                                "Failed to restore movie, {}. Loading the savestate might desynchronize the movie.\nAre you sure you want to continue?",
                                err
                            );
                            if !self.confirm(&message) {
                                return Err(StateError::Cancelled);
                            }
                        }
                    }
                },
                None => {
                    if !ignore_warnings && self.movie.task().is_running() {
                        let message = "The savestate is not from a movie. Loading it might desynchronize the movie.\nAre you sure you want to continue?";
                        if !self.confirm(message) {
                            return Err(StateError::Cancelled);
                        }
                    }
                }
            }
        }

        core.apply(&snapshot);
        if skip_si_dma {
            core.skip_next_si_dma();
        }

        if let (Some(mode), Some(freeze)) = (restore, &snapshot.movie) {
            let before = self.movie.task();
            let diverged_at = warp::common_prefix(self.movie.inputs(), freeze.samples());
            if let Err(e) = self.movie.unfreeze(freeze, mode) {
                log::error!("[VCR] Unfreeze failed after validation: {}", e);
            } else if mode == RestoreMode::Rerecord {
                let current = self.movie.current_sample();
                if self.checkpoints.invalidate_after(diverged_at.min(current)) > 0 {
                    self.hooks.notify(ReplayEvent::SeekSavestatesChanged);
                }
                if let Err(e) = self.movie.save() {
                    log::warn!("[VCR] Failed to write movie after rerecord: {}", e);
                }
                self.hooks
                    .notify(ReplayEvent::RerecordsChanged(self.movie.rerecord_count()));
            }
            self.notify_task_change(before);
        }

        // Restoring the frame mid-seek flickers; the replay redraws anyway.
        if let Some(shot) = &snapshot.screenshot {
            if !self.seek.is_seeking() && self.hooks.video_size() == Some((shot.width, shot.height))
            {
                log::debug!("[ST] Restoring screen buffer...");
                self.hooks.restore_screen(shot);
            }
        }

        self.hooks.notify(ReplayEvent::StateLoaded);
        Ok(())
    }

    /// Consume internal outcomes; hand caller outcomes back.
    fn dispatch(&mut self, outcome: TaskOutcome) -> Option<TaskOutcome> {
        let tag = outcome.tag;
        match tag {
            Some(TaskTag::Undo) => {
                if let Ok(state) = outcome.result {
                    self.undo = Some(state);
                }
                None
            }
            Some(TaskTag::Checkpoint) => {
                if let Ok(state) = outcome.result {
                    if self.movie.is_active() {
                        let sample = self.movie.current_sample();
                        log::debug!("[VCR] Seek savestate at sample {}", sample);
                        self.checkpoints.insert(sample, state);
                        self.hooks.notify(ReplayEvent::SeekSavestatesChanged);
                    }
                }
                None
            }
            Some(TaskTag::MovieStart) => {
                self.finish_movie_start(outcome.result.map(|_| ()));
                None
            }
            Some(TaskTag::SeekRollback) => {
                match outcome.result {
                    Ok(_) => {
                        self.seek.rollback_done();
                        self.check_seek_completion();
                    }
                    Err(e) => {
                        log::error!("[VCR] Seek rollback failed: {}", e);
                        if self.warp.is_warping() {
                            log::error!(
                                "[VCR] Warp modify aborted; inputs from sample {} were not replayed",
                                self.warp.first_difference_frame()
                            );
                            self.hooks.notify(ReplayEvent::WarpModifyFailed);
                        }
                        self.stop_seek();
                    }
                }
                None
            }
            Some(TaskTag::Caller(_)) | None => Some(outcome),
        }
    }

    // ─── Movie lifecycle ─────────────────────────────────────

    pub fn start_record(
        &mut self,
        core: &mut dyn ExecutionCore,
        path: &Path,
        flags: u16,
        author: &str,
        description: &str,
    ) -> Result<(), MovieError> {
        if self.movie.is_active() {
            return Err(MovieError::AlreadyActive);
        }

        let rom = core.rom_identity();
        let controller_flags = core.controller_flags();
        let from_existing = flags & start_flags::FROM_EXISTING_SNAPSHOT != 0;
        let header = MovieHeader {
            uid: unix_time(),
            vis_per_second: rom.vis_per_second(),
            num_controllers: (0..4)
                .filter(|&i| controller_flags & controller::present(i) != 0)
                .count() as u8,
            start_flags: if from_existing {
                start_flags::FROM_SNAPSHOT
            } else {
                flags
            },
            controller_flags,
            rom_name: rom.name.clone(),
            rom_crc1: rom.crc1,
            rom_country: rom.country_code,
            plugins: core.plugin_names(),
            author: author.to_string(),
            description: description.to_string(),
            ..MovieHeader::default()
        };

        let snapshot = path.with_extension("st");
        let (task, start) = if flags & start_flags::FROM_SNAPSHOT != 0 {
            (
                Task::StartRecordingFromSnapshot,
                Some(SavestateTask::new(Job::Save, Medium::Path(snapshot))),
            )
        } else if from_existing {
            (
                Task::StartRecordingFromExistingSnapshot,
                Some(SavestateTask::new(Job::Load, Medium::Path(snapshot))),
            )
        } else {
            (Task::StartRecordingFromReset, None)
        };

        self.begin_movie(core, path, header, Vec::new(), task, start)?;
        if let Err(e) = self.movie.save() {
            self.abort_movie();
            return Err(e);
        }
        log::info!("[VCR] Recording {:?}", path);
        Ok(())
    }

    pub fn start_playback(
        &mut self,
        core: &mut dyn ExecutionCore,
        path: &Path,
    ) -> Result<(), MovieError> {
        if self.movie.is_active() {
            return Err(MovieError::AlreadyActive);
        }

        let movie = file::read_movie(path)?;
        let rom = core.rom_identity();
        if movie.header.rom_crc1 != rom.crc1 || movie.header.rom_name.trim_end() != rom.name.trim_end()
        {
            let message = format!(
                "The movie was recorded on \"{}\" (CRC {:08X}) but \"{}\" (CRC {:08X}) is loaded.\nPlayback might desynchronize. Are you sure you want to continue?",
                movie.header.rom_name, movie.header.rom_crc1, rom.name, rom.crc1
            );
            if !self.confirm(&message) {
                return Err(MovieError::Cancelled);
            }
        }

        let from_snapshot = movie.header.start_flags
            & (start_flags::FROM_SNAPSHOT | start_flags::FROM_EXISTING_SNAPSHOT)
            != 0;
        let (task, start) = if from_snapshot {
            (
                Task::StartPlaybackFromSnapshot,
                Some(SavestateTask::new(
                    Job::Load,
                    Medium::Path(path.with_extension("st")),
                )),
            )
        } else {
            (Task::StartPlaybackFromReset, None)
        };

        self.begin_movie(core, path, movie.header, movie.inputs, task, start)?;
        log::info!("[VCR] Playing back {:?}", path);
        Ok(())
    }

    fn begin_movie(
        &mut self,
        core: &mut dyn ExecutionCore,
        path: &Path,
        header: MovieHeader,
        inputs: Vec<InputSample>,
        task: Task,
        start: Option<SavestateTask>,
    ) -> Result<(), MovieError> {
        if start.is_some() && !self.queue.is_launched() {
            return Err(StateError::CoreNotLaunched.into());
        }

        self.checkpoints.clear();
        self.warp.reset();
        self.movie.begin(path.to_path_buf(), header, inputs, task)?;

        match start {
            Some(start) => {
                let start = start.ignore_warnings().tagged(TaskTag::MovieStart);
                if let Err(e) = self.queue.enqueue(start) {
                    self.abort_movie();
                    return Err(e.into());
                }
            }
            None => {
                core.reset();
                self.queue_checkpoint();
            }
        }
        self.hooks.notify(ReplayEvent::TaskChanged(task));
        Ok(())
    }

    fn finish_movie_start(&mut self, result: Result<(), StateError>) {
        let next = match self.movie.task() {
            Task::StartRecordingFromSnapshot | Task::StartRecordingFromExistingSnapshot => {
                Task::Recording
            }
            Task::StartPlaybackFromSnapshot => Task::Playback,
            other => {
                log::warn!("[VCR] Movie start snapshot finished in task {:?}", other);
                return;
            }
        };

        if let Err(e) = result {
            log::error!("[VCR] Movie start snapshot failed: {}", e);
            self.abort_movie();
            return;
        }

        self.movie.set_task(next);
        self.hooks.notify(ReplayEvent::TaskChanged(next));
        self.queue_checkpoint();
    }

    fn abort_movie(&mut self) {
        self.movie.end();
        self.checkpoints.clear();
        self.warp.reset();
        self.hooks.notify(ReplayEvent::TaskChanged(Task::Idle));
    }

    /// Stop recording or playback. Recordings are written out first.
    pub fn stop_all(&mut self) -> Result<(), MovieError> {
        self.stop_seek();
        let task = self.movie.task();
        if task == Task::Idle {
            return Ok(());
        }

        let saved = if task.is_recording() {
            self.movie.save()
        } else {
            Ok(())
        };
        log::info!("[VCR] Stopped {:?}", task);
        self.abort_movie();
        self.hooks.notify(ReplayEvent::SeekSavestatesChanged);
        saved
    }

    /// Edit author info of a movie file, and of the active movie if it is that file.
    pub fn replace_author_info(
        &mut self,
        path: &Path,
        author: &str,
        description: &str,
    ) -> Result<(), MovieError> {
        file::replace_author_info(path, author, description)?;
        if self.movie.path() == Some(path) {
            self.movie.set_author_info(author, description);
        }
        Ok(())
    }

    fn queue_checkpoint(&mut self) {
        let task = SavestateTask::new(Job::Save, Medium::Memory(Vec::new()))
            .ignore_warnings()
            .tagged(TaskTag::Checkpoint);
        if let Err(e) = self.queue.enqueue(task) {
            log::debug!("[VCR] Skipping seek savestate: {}", e);
        }
    }

    // ─── Core hooks ──────────────────────────────────────────

    /// Controller poll from the PIF. `input` holds the live state and is
    /// replaced with the movie's sample when one applies.
    pub fn on_controller_poll(&mut self, index: usize, input: &mut InputSample) -> PollOutcome {
        let before = self.movie.task();
        let outcome = self.movie.on_controller_poll(index, input);
        self.notify_task_change(before);

        match outcome {
            PollOutcome::Recorded | PollOutcome::Played => {
                if self.checkpoints.is_due(self.movie.current_sample()) {
                    self.queue_checkpoint();
                }
                self.check_seek_completion();
            }
            PollOutcome::Ended => {
                log::info!(
                    "[VCR] Playback finished at sample {}",
                    self.movie.current_sample()
                );
                if self.config.pause_at_last_sample {
                    self.hooks.pause();
                }
                if let Err(e) = self.stop_all() {
                    log::warn!("[VCR] {}", e);
                }
            }
            PollOutcome::Passthrough => {}
        }
        outcome
    }

    pub fn on_vi(&mut self) {
        self.movie.on_vi();
    }

    /// Whether the frontend should render, play audio and pace this frame.
    pub fn should_present(&self) -> bool {
        !self.seek.is_seeking()
    }

    /// Pausing mid warp-modify would expose a half-replayed machine.
    pub fn allows_core_pause(&self) -> bool {
        !self.warp.is_warping()
    }

    // ─── Seek ────────────────────────────────────────────────

    pub fn begin_seek(&mut self, spec: &str, pause_at_end: bool) -> Result<(), SeekError> {
        if !self.movie.task().is_running() {
            return Err(SeekError::NoMovie);
        }
        let target = spec
            .parse::<SeekTarget>()?
            .resolve(self.movie.current_sample(), self.movie.length_samples())?;
        self.seek_to(target, target, pause_at_end, false)
    }

    fn seek_to(
        &mut self,
        target: usize,
        rollback_point: usize,
        pause_at_end: bool,
        force_rollback: bool,
    ) -> Result<(), SeekError> {
        if self.seek.is_seeking() {
            return Err(SeekError::AlreadySeeking);
        }

        let rollback = force_rollback || target < self.movie.current_sample();
        if rollback {
            let (sample, state) = self
                .checkpoints
                .nearest_at_or_before(rollback_point)
                .ok_or(SeekError::NoCheckpoint(rollback_point))?;
            log::info!("[VCR] Rolling back to seek savestate at sample {}", sample);
            let load = SavestateTask::new(Job::Load, Medium::Memory(state.to_vec()))
                .ignore_warnings()
                .tagged(TaskTag::SeekRollback);
            self.queue.enqueue(load)?;
        }

        self.seek.begin(target, pause_at_end, rollback)?;
        self.check_seek_completion();
        Ok(())
    }

    fn check_seek_completion(&mut self) {
        let Some(op) = self.seek.poll_complete(self.movie.current_sample()) else {
            return;
        };
        self.hooks.notify(ReplayEvent::SeekCompleted);
        if op.pause_at_end {
            self.hooks.pause();
        }
        self.end_warp();
    }

    pub fn stop_seek(&mut self) {
        if self.seek.stop().is_some() {
            self.end_warp();
        }
    }

    pub fn is_seeking(&self) -> bool {
        self.seek.is_seeking()
    }

    /// `(current, target)`; the target is `usize::MAX` when no seek runs.
    pub fn seek_completion(&self) -> (usize, usize) {
        self.seek.completion(self.movie.current_sample())
    }

    // ─── Warp modify ─────────────────────────────────────────

    pub fn begin_warp_modify(&mut self, inputs: Vec<InputSample>) -> Result<(), WarpError> {
        if inputs.is_empty() {
            return Err(WarpError::EmptyInput);
        }
        if !self.movie.task().is_running() {
            return Err(WarpError::NoMovie);
        }
        if self.warp.is_warping() {
            return Err(WarpError::AlreadyWarping);
        }
        if self.seek.is_seeking() {
            return Err(SeekError::AlreadySeeking.into());
        }

        let current = self.movie.current_sample();
        let plan = warp::plan(self.movie.inputs(), &inputs, current)?;
        log::info!("[VCR] Warp modify at sample {}: {:?}", current, plan);

        match plan {
            WarpPlan::Identical => {}
            WarpPlan::Extend { .. } => self.movie.replace_inputs(inputs),
            WarpPlan::Rollback {
                rollback_to,
                resume_at,
                ..
            } => {
                if self.checkpoints.nearest_at_or_before(rollback_to).is_none() {
                    return Err(SeekError::NoCheckpoint(rollback_to).into());
                }
                if !self.queue.is_launched() {
                    return Err(SeekError::Queue(StateError::CoreNotLaunched).into());
                }

                if self.warp.set_status(WarpStatus::Warping) {
                    self.hooks
                        .notify(ReplayEvent::WarpModifyStatusChanged(WarpStatus::Warping));
                }
                let before = self.movie.task();
                self.movie.replace_inputs(inputs);
                self.movie.set_task(Task::Recording);
                self.notify_task_change(before);
                if self.checkpoints.invalidate_after(rollback_to) > 0 {
                    self.hooks.notify(ReplayEvent::SeekSavestatesChanged);
                }

                if let Err(e) = self.seek_to(resume_at, rollback_to, false, true) {
                    self.end_warp();
                    return Err(e.into());
                }
            }
        }

        self.warp.record(plan);
        Ok(())
    }

    fn end_warp(&mut self) {
        if self.warp.set_status(WarpStatus::None) {
            self.hooks
                .notify(ReplayEvent::WarpModifyStatusChanged(WarpStatus::None));
        }
    }

    pub fn warp_modify_status(&self) -> WarpStatus {
        self.warp.status()
    }

    /// First differing sample of the last warp-modify, or `usize::MAX`.
    pub fn warp_modify_first_difference_frame(&self) -> usize {
        self.warp.first_difference_frame()
    }
}

fn read_state_file(path: &Path) -> Result<Vec<u8>, StateError> {
    match fs::read(path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StateError::NotFound),
        Err(e) => Err(StateError::Io(e)),
    }
}

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}
