/// The complete machine state captured by a savestate.
///
/// Register blocks mirror the legacy in-memory structs byte for byte,
/// including the alignment padding those structs carried, because the
/// savestate format is a raw dump of them. All multi-byte values are
/// little-endian.
use super::cursor::{register_block, StateReader, StateWriter, Wire};
use super::StateError;
use crate::movie::MovieFreeze;

pub const ROM_HASH_SIZE: usize = 32;
pub const RDRAM_SIZE: usize = 0x80_0000;
pub const SP_MEM_SIZE: usize = 0x1000;
pub const PIF_RAM_SIZE: usize = 0x40;
pub const FLASHRAM_INFO_SIZE: usize = 24;
/// Each TLB lookup table is 1 MiB of u32 entries.
pub const TLB_LUT_ENTRIES: usize = 0x4_0000;
pub const TLB_ENTRY_COUNT: usize = 32;

/// Interrupt event kinds, as stored in the event list.
pub mod interrupt {
    pub const VI_INT: u32 = 0x001;
    pub const COMPARE_INT: u32 = 0x002;
    pub const CHECK_INT: u32 = 0x004;
    pub const SI_INT: u32 = 0x008;
    pub const PI_INT: u32 = 0x010;
    pub const SPECIAL_INT: u32 = 0x020;
    pub const AI_INT: u32 = 0x040;
    pub const SP_INT: u32 = 0x080;
    pub const DP_INT: u32 = 0x100;
}

/// COP0 register indices used by the codec.
pub mod cop0 {
    pub const COUNT: usize = 9;
}

// ─── Peripheral register blocks ──────────────────────────────

register_block! {
    pub struct RdramRegs {
        pub config: u32,
        pub device_id: u32,
        pub delay: u32,
        pub mode: u32,
        pub ref_interval: u32,
        pub ref_row: u32,
        pub ras_interval: u32,
        pub min_interval: u32,
        pub addr_select: u32,
        /// Bit 31 doubles as the SI fixup marker on the wire.
        pub device_manuf: u32,
    }
}

register_block! {
    pub struct MiRegs {
        pub w_init_mode: u32,
        pub init_mode: u32,
        /// init_length, init_mode, ebus_test_mode, rdram_reg_mode
        pub init_flags: [u8; 4],
        pub version: u32,
        pub intr: u32,
        pub intr_mask: u32,
        pub w_intr_mask: u32,
        /// SP, SI, AI, VI, PI, DP interrupt mask bits
        pub intr_mask_flags: [u8; 6],
        pub _pad: [u8; 2],
    }
}

register_block! {
    pub struct PiRegs {
        pub dram_addr: u32,
        pub cart_addr: u32,
        pub rd_len: u32,
        pub wr_len: u32,
        pub status: u32,
        pub dom1_lat: u32,
        pub dom1_pwd: u32,
        pub dom1_pgs: u32,
        pub dom1_rls: u32,
        pub dom2_lat: u32,
        pub dom2_pwd: u32,
        pub dom2_pgs: u32,
        pub dom2_rls: u32,
    }
}

register_block! {
    pub struct SpRegs {
        pub mem_addr: u32,
        pub dram_addr: u32,
        pub rd_len: u32,
        pub wr_len: u32,
        pub w_status: u32,
        pub status: u32,
        /// halt, broke, dma_busy, dma_full, io_full, single_step,
        /// intr_break, signal0..signal7
        pub status_flags: [u8; 15],
        pub _pad: [u8; 1],
        pub dma_full: u32,
        pub dma_busy: u32,
        pub semaphore: u32,
    }
}

register_block! {
    pub struct RspRegs {
        pub pc: u32,
        pub ibist: u32,
    }
}

register_block! {
    pub struct SiRegs {
        pub dram_addr: u32,
        pub pif_addr_rd64b: u32,
        pub pif_addr_wr64b: u32,
        pub status: u32,
    }
}

register_block! {
    pub struct ViRegs {
        pub status: u32,
        pub origin: u32,
        pub width: u32,
        pub v_intr: u32,
        pub current: u32,
        pub burst: u32,
        pub v_sync: u32,
        pub h_sync: u32,
        pub leap: u32,
        pub h_start: u32,
        pub v_start: u32,
        pub v_burst: u32,
        pub x_scale: u32,
        pub y_scale: u32,
        pub delay: u32,
    }
}

register_block! {
    pub struct RiRegs {
        pub mode: u32,
        pub config: u32,
        pub current_load: u32,
        pub select: u32,
        pub refresh: u32,
        pub latency: u32,
        pub error: u32,
        pub werror: u32,
    }
}

register_block! {
    pub struct AiRegs {
        pub dram_addr: u32,
        pub len: u32,
        pub control: u32,
        pub status: u32,
        pub dacrate: u32,
        pub bitrate: u32,
        pub next_delay: u32,
        pub next_len: u32,
        pub current_delay: u32,
        pub current_len: u32,
    }
}

register_block! {
    pub struct DpcRegs {
        pub start: u32,
        pub end: u32,
        pub current: u32,
        pub w_status: u32,
        pub status: u32,
        /// xbus_dmem_dma, freeze, flush, start_glck, tmem_busy, pipe_busy,
        /// cmd_busy, cbuf_busy, dma_busy, end_valid, start_valid
        pub status_flags: [u8; 11],
        pub _pad: [u8; 1],
        pub clock: u32,
        pub bufbusy: u32,
        pub pipebusy: u32,
        pub tmem: u32,
    }
}

register_block! {
    pub struct DpsRegs {
        pub tbist: u32,
        pub test_mode: u32,
        pub buftest_addr: u32,
        pub buftest_data: u32,
    }
}

register_block! {
    /// Every peripheral register block, in wire order.
    pub struct PeripheralRegs {
        pub rdram: RdramRegs,
        pub mi: MiRegs,
        pub pi: PiRegs,
        pub sp: SpRegs,
        pub rsp: RspRegs,
        pub si: SiRegs,
        pub vi: ViRegs,
        pub ri: RiRegs,
        pub ai: AiRegs,
        pub dpc: DpcRegs,
        pub dps: DpsRegs,
    }
}

// ─── CPU ─────────────────────────────────────────────────────

register_block! {
    /// One TLB entry in the interpreter's decoded form.
    pub struct TlbEntry {
        pub mask: u16,
        pub _pad0: [u8; 2],
        pub vpn2: u32,
        pub g: u8,
        pub asid: u8,
        pub _pad1: [u8; 2],
        pub pfn_even: u32,
        pub c_even: u8,
        pub d_even: u8,
        pub v_even: u8,
        pub _pad2: [u8; 1],
        pub pfn_odd: u32,
        pub c_odd: u8,
        pub d_odd: u8,
        pub v_odd: u8,
        pub r: u8,
        pub start_even: u32,
        pub end_even: u32,
        pub phys_even: u32,
        pub start_odd: u32,
        pub end_odd: u32,
        pub phys_odd: u32,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    pub llbit: u32,
    pub gpr: [u64; 32],
    pub cop0: [u32; 32],
    pub lo: u64,
    pub hi: u64,
    pub fgr: [u64; 32],
    pub fcr0: u32,
    pub fcr31: u32,
    pub tlb: [TlbEntry; TLB_ENTRY_COUNT],
    /// Address of the next instruction to execute.
    pub pc: u32,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            llbit: 0,
            gpr: [0; 32],
            cop0: [0; 32],
            lo: 0,
            hi: 0,
            fgr: [0; 32],
            fcr0: 0,
            fcr31: 0,
            tlb: [TlbEntry::default(); TLB_ENTRY_COUNT],
            pc: 0,
        }
    }
}

impl CpuState {
    pub const SIZE: usize = 4
        + 32 * 8
        + 32 * 8
        + 8
        + 8
        + 32 * 8
        + 4
        + 4
        + TLB_ENTRY_COUNT * TlbEntry::SIZE
        + 4;

    pub(crate) fn write(&self, w: &mut StateWriter) {
        w.write_u32(self.llbit);
        self.gpr.put(w);
        // COP0 slots are 8 bytes wide on disk. The legacy writer copied
        // 8 bytes starting at each 4-byte register, so the pad half holds
        // the following register.
        for i in 0..32 {
            w.write_u32(self.cop0[i]);
            w.write_u32(self.cop0.get(i + 1).copied().unwrap_or(0));
        }
        w.write_u64(self.lo);
        w.write_u64(self.hi);
        self.fgr.put(w);
        w.write_u32(self.fcr0);
        w.write_u32(self.fcr31);
        for entry in &self.tlb {
            entry.put(w);
        }
        w.write_u32(self.pc);
    }

    pub(crate) fn read(r: &mut StateReader<'_>) -> Result<Self, StateError> {
        let llbit = r.read_u32()?;
        let gpr = <[u64; 32]>::get(r)?;
        let mut cop0 = [0u32; 32];
        for reg in &mut cop0 {
            *reg = r.read_u32()?;
            r.skip(4)?;
        }
        let lo = r.read_u64()?;
        let hi = r.read_u64()?;
        let fgr = <[u64; 32]>::get(r)?;
        let fcr0 = r.read_u32()?;
        let fcr31 = r.read_u32()?;
        let mut tlb = [TlbEntry::default(); TLB_ENTRY_COUNT];
        for entry in &mut tlb {
            *entry = TlbEntry::get(r)?;
        }
        let pc = r.read_u32()?;
        Ok(Self {
            llbit,
            gpr,
            cop0,
            lo,
            hi,
            fgr,
            fcr0,
            fcr31,
            tlb,
            pc,
        })
    }
}

// ─── Interrupts ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptEvent {
    pub kind: u32,
    /// Absolute COP0 Count value at which the event fires.
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterruptState {
    pub next_interrupt: u32,
    pub next_vi: u32,
    pub vi_field: u32,
    /// Pending events, soonest first.
    pub events: Vec<InterruptEvent>,
}

impl InterruptState {
    pub fn has_event(&self, kind: u32) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Queue an event `delay` cycles after `now`, keeping soonest-first order.
    pub fn add_event(&mut self, kind: u32, now: u32, delay: u32) {
        let count = now.wrapping_add(delay);
        let pos = self
            .events
            .iter()
            .position(|e| e.count.wrapping_sub(now) > delay)
            .unwrap_or(self.events.len());
        self.events.insert(pos, InterruptEvent { kind, count });
        if let Some(first) = self.events.first() {
            self.next_interrupt = first.count;
        }
    }
}

// ─── Screenshot ──────────────────────────────────────────────

/// Raw RGB24 framebuffer copy embedded after the state data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

// ─── MachineSnapshot ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSnapshot {
    /// Identity of the ROM the state was captured on (ASCII MD5).
    pub rom_hash: [u8; ROM_HASH_SIZE],
    pub regs: PeripheralRegs,
    pub rdram: Vec<u8>,
    pub sp_dmem: Vec<u8>,
    pub sp_imem: Vec<u8>,
    pub pif_ram: [u8; PIF_RAM_SIZE],
    /// Persistent-storage (flashram) controller metadata.
    pub flashram: [u8; FLASHRAM_INFO_SIZE],
    pub tlb_lut_r: Vec<u32>,
    pub tlb_lut_w: Vec<u32>,
    pub cpu: CpuState,
    pub interrupts: InterruptState,
    pub movie: Option<MovieFreeze>,
    pub screenshot: Option<Screenshot>,
}

impl MachineSnapshot {
    /// A zeroed machine with every region at its wire size.
    pub fn new() -> Self {
        Self {
            rom_hash: [0; ROM_HASH_SIZE],
            regs: PeripheralRegs::default(),
            rdram: vec![0; RDRAM_SIZE],
            sp_dmem: vec![0; SP_MEM_SIZE],
            sp_imem: vec![0; SP_MEM_SIZE],
            pif_ram: [0; PIF_RAM_SIZE],
            flashram: [0; FLASHRAM_INFO_SIZE],
            tlb_lut_r: vec![0; TLB_LUT_ENTRIES],
            tlb_lut_w: vec![0; TLB_LUT_ENTRIES],
            cpu: CpuState::default(),
            interrupts: InterruptState::default(),
            movie: None,
            screenshot: None,
        }
    }
}

impl Default for MachineSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
