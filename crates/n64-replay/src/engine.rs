/// Seams between the replay session and the rest of the emulator.
///
/// `ExecutionCore` is the machine: it hands out and accepts snapshots and
/// is told about DMA and PC adjustments after a load. `ReplayHooks` is the
/// frontend: prompts, notifications, pausing and the video plugin.
use crate::movie::header::controller;
use crate::movie::{PluginNames, Task};
use crate::savestate::snapshot::{MachineSnapshot, Screenshot, ROM_HASH_SIZE};
use crate::warp::WarpStatus;

/// Exception vector legacy savestates resume at.
pub const LEGACY_ENTRY_PC: u32 = 0x8000_0180;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomIdentity {
    /// Internal name from the cart header.
    pub name: String,
    pub crc1: u32,
    pub country_code: u16,
    /// ASCII MD5 of the ROM image.
    pub md5: [u8; ROM_HASH_SIZE],
}

impl RomIdentity {
    pub fn country_name(&self) -> String {
        country_name(self.country_code)
    }

    pub fn vis_per_second(&self) -> u8 {
        vis_per_second(self.country_code)
    }
}

pub fn country_name(country_code: u16) -> String {
    match (country_code & 0xFF) as u8 {
        0 => "Demo".to_string(),
        b'7' => "Beta".to_string(),
        0x41 => "USA/Japan".to_string(),
        0x44 => "Germany".to_string(),
        0x45 => "USA".to_string(),
        0x46 => "France".to_string(),
        b'I' => "Italy".to_string(),
        0x4A => "Japan".to_string(),
        b'S' => "Spain".to_string(),
        0x55 | 0x59 => "Australia".to_string(),
        0x50 | 0x58 | 0x20 | 0x21 | 0x38 | 0x70 => "Europe".to_string(),
        other => format!("Unknown ({})", other),
    }
}

/// PAL regions run at 50 VI/s, everything else at 60.
pub fn vis_per_second(country_code: u16) -> u8 {
    match country_code & 0xFF {
        0x44 | 0x46 | 0x49 | 0x50 | 0x53 | 0x55 | 0x58 | 0x59 => 50,
        _ => 60,
    }
}

pub trait ExecutionCore {
    fn rom_identity(&self) -> RomIdentity;

    /// Copy out the whole machine. Movie and screenshot fields are left empty.
    fn capture(&mut self) -> MachineSnapshot;

    /// Overwrite the machine with `snapshot`.
    fn apply(&mut self, snapshot: &MachineSnapshot);

    /// Skip the next SI DMA; the state already completed it.
    fn skip_next_si_dma(&mut self);

    /// Hard reset, used when a movie starts from power-on.
    fn reset(&mut self);

    fn program_counter(&self) -> u32;

    /// After a load: whether execution resumes at `LEGACY_ENTRY_PC`.
    fn set_legacy_entry(&mut self, legacy: bool) {
        let _ = legacy;
    }

    fn controller_flags(&self) -> u32 {
        controller::present(0)
    }

    fn plugin_names(&self) -> PluginNames {
        PluginNames::default()
    }
}

/// Notifications for scripting hooks and the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayEvent {
    StateSaved,
    StateLoaded,
    SlotChanged(usize),
    TaskChanged(Task),
    RerecordsChanged(u64),
    SeekCompleted,
    SeekSavestatesChanged,
    WarpModifyStatusChanged(WarpStatus),
    /// The rollback behind a warp-modify failed. The edited buffer stays in
    /// place but the machine was not replayed onto it.
    WarpModifyFailed,
}

pub trait ReplayHooks {
    /// Ask the user to go ahead despite `message`. Declining cancels.
    fn confirm(&mut self, message: &str) -> bool {
        log::warn!("{}", message);
        true
    }

    fn notify(&mut self, event: ReplayEvent) {
        let _ = event;
    }

    fn pause(&mut self) {}

    fn capture_screen(&mut self) -> Option<Screenshot> {
        None
    }

    fn video_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn restore_screen(&mut self, screenshot: &Screenshot) {
        let _ = screenshot;
    }
}

/// Hooks that accept every prompt and ignore everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHooks;

impl ReplayHooks for NullHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_names() {
        assert_eq!(country_name(0x45), "USA");
        assert_eq!(country_name(0x4A), "Japan");
        assert_eq!(country_name(0x1058), "Europe");
        assert_eq!(country_name(b'I' as u16), "Italy");
        assert_eq!(country_name(0x99), "Unknown (153)");
    }

    #[test]
    fn pal_regions_run_at_50() {
        assert_eq!(vis_per_second(0x50), 50);
        assert_eq!(vis_per_second(0x45), 60);
        assert_eq!(vis_per_second(0x00), 60);
    }
}
