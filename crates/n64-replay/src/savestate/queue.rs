/// Savestate task queue.
///
/// Requests from any thread are pushed to the front of a shared list.
/// The execution thread drains it with `take`, then runs the pure
/// `prepare` pipeline (simplify, undo injection, simplify) on its own copy,
/// so the lock is never held while tasks run or re-entered while they are
/// rearranged.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::StateError;
use crate::engine::RomIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Save,
    Load,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Medium {
    Slot(usize),
    Path(PathBuf),
    /// In-memory state. Loads read the buffer; saves ignore it and hand
    /// the encoded bytes back in the outcome.
    Memory(Vec<u8>),
}

impl fmt::Debug for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Medium::Slot(slot) => write!(f, "Slot({})", slot),
            Medium::Path(path) => write!(f, "Path({:?})", path),
            Medium::Memory(buf) => write!(f, "Memory({} bytes)", buf.len()),
        }
    }
}

/// Who asked for a task; decides what the session does with the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTag {
    /// Undo point injected ahead of a load.
    Undo,
    /// Periodic seek checkpoint.
    Checkpoint,
    /// Snapshot a movie starts from.
    MovieStart,
    /// Checkpoint load rewinding a seek or warp-modify.
    SeekRollback,
    /// Caller-chosen id, echoed back in the outcome.
    Caller(u64),
}

#[derive(Debug, Clone)]
pub struct SavestateTask {
    pub job: Job,
    pub medium: Medium,
    /// Skip ROM and movie mismatch prompts, proceeding as if confirmed.
    pub ignore_warnings: bool,
    pub tag: Option<TaskTag>,
}

impl SavestateTask {
    pub fn new(job: Job, medium: Medium) -> Self {
        Self {
            job,
            medium,
            ignore_warnings: false,
            tag: None,
        }
    }

    pub fn ignore_warnings(mut self) -> Self {
        self.ignore_warnings = true;
        self
    }

    pub fn tagged(mut self, tag: TaskTag) -> Self {
        self.tag = Some(tag);
        self
    }

    fn is_slot_save(&self, slot: usize) -> bool {
        self.job == Job::Save && self.medium == Medium::Slot(slot)
    }
}

/// Result of one executed task.
#[derive(Debug)]
pub struct TaskOutcome {
    pub job: Job,
    pub tag: Option<TaskTag>,
    /// Human-readable target, e.g. "slot 3" or a file name.
    pub label: String,
    /// Uncompressed state bytes on success.
    pub result: Result<Vec<u8>, StateError>,
}

struct Shared {
    tasks: Mutex<Vec<SavestateTask>>,
    launched: AtomicBool,
}

/// Cloneable handle for enqueueing from any thread.
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

impl Default for QueueHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueHandle {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tasks: Mutex::new(Vec::new()),
                launched: AtomicBool::new(false),
            }),
        }
    }

    pub fn set_launched(&self, launched: bool) {
        self.shared.launched.store(launched, Ordering::SeqCst);
        if !launched {
            self.clear();
        }
    }

    pub fn is_launched(&self) -> bool {
        self.shared.launched.load(Ordering::SeqCst)
    }

    /// Queue `task` ahead of everything already pending.
    pub fn enqueue(&self, task: SavestateTask) -> Result<(), StateError> {
        let mut tasks = self.shared.tasks.lock();
        if !self.is_launched() {
            log::trace!("[ST] Can't enqueue {:?} {:?}: core not launched", task.job, task.medium);
            return Err(StateError::CoreNotLaunched);
        }
        tasks.insert(0, task);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.shared.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.tasks.lock().is_empty()
    }

    pub fn clear(&self) {
        self.shared.tasks.lock().clear();
    }

    /// Snapshot of pending tasks, front first.
    pub fn pending(&self) -> Vec<SavestateTask> {
        self.shared.tasks.lock().clone()
    }

    pub(crate) fn take(&self) -> Vec<SavestateTask> {
        std::mem::take(&mut *self.shared.tasks.lock())
    }
}

/// Drop later saves to a slot that a nearer save already targets.
///
/// A load ends the window: saves on either side of it capture different
/// states and both must run.
pub fn simplify(tasks: &mut Vec<SavestateTask>) {
    let mut i = 0;
    while i < tasks.len() {
        let slot = match (tasks[i].job, &tasks[i].medium) {
            (Job::Save, Medium::Slot(slot)) => Some(*slot),
            _ => None,
        };
        if let Some(slot) = slot {
            let mut j = i + 1;
            while j < tasks.len() && tasks[j].job != Job::Load {
                if tasks[j].is_slot_save(slot) {
                    log::info!("[ST] Found duplicate slot task at index {}", j);
                    tasks.remove(j);
                } else {
                    j += 1;
                }
            }
        }
        i += 1;
    }
}

/// Put an undo capture in front when any load is queued.
pub fn inject_undo(tasks: &mut Vec<SavestateTask>) -> bool {
    if !tasks.iter().any(|t| t.job == Job::Load) {
        log::trace!("[ST] Skipping undo point creation: no load in queue.");
        return false;
    }
    log::trace!("[ST] Inserting undo point creation into task queue...");
    tasks.insert(
        0,
        SavestateTask::new(Job::Save, Medium::Memory(Vec::new()))
            .ignore_warnings()
            .tagged(TaskTag::Undo),
    );
    true
}

/// A save that runs after a load captures the loaded state.
pub fn has_save_after_load(tasks: &[SavestateTask]) -> bool {
    let mut seen_load = false;
    for task in tasks {
        match task.job {
            Job::Save if seen_load => return true,
            Job::Load => seen_load = true,
            Job::Save => {}
        }
    }
    false
}

/// Order a drained batch for execution.
pub fn prepare(mut tasks: Vec<SavestateTask>, undo_on_load: bool) -> Vec<SavestateTask> {
    log::info!("[ST] Simplifying task queue...");
    simplify(&mut tasks);
    if undo_on_load {
        inject_undo(&mut tasks);
    }
    simplify(&mut tasks);

    log::info!("[ST] Begin task dump");
    if has_save_after_load(&tasks) {
        log::warn!(
            "[ST] A savestate save task is scheduled after a load task. This may cause unexpected behavior for the caller."
        );
    }
    for task in &tasks {
        log::info!("[ST] \tTask: Job = {:?}, Medium = {:?}", task.job, task.medium);
    }
    log::info!("[ST] End task dump");
    tasks
}

/// `<saves_dir>/<rom name> <country>.st<slot>`
pub fn slot_path(saves_dir: &Path, rom: &RomIdentity, slot: usize) -> PathBuf {
    saves_dir.join(format!(
        "{} {}.st{}",
        rom.name.trim_end(),
        rom.country_name(),
        slot
    ))
}
