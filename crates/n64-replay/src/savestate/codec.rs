/// Savestate wire codec.
///
/// Layout (little-endian, no framing between sections):
///   [0..32]      ROM hash (ASCII MD5)
///   peripheral register blocks, RDRAM, SP DMEM/IMEM, PIF RAM,
///   flashram info, TLB lookup tables, CPU block, interrupt scalars
///   event list   (kind, count) pairs terminated by 0xFFFFFFFF
///   movie_active u32, then the movie freeze block when set
///   optional     "SCR\0" + width i32 + height i32 + RGB24 pixels
///
/// The fixed part between the hash and the event list is always
/// `FIXED_BLOCK_SIZE` bytes.
use super::cursor::{StateReader, StateWriter, Wire};
use super::snapshot::{
    cop0, interrupt, CpuState, InterruptEvent, InterruptState, MachineSnapshot, PeripheralRegs,
    Screenshot, FLASHRAM_INFO_SIZE, PIF_RAM_SIZE, RDRAM_SIZE, ROM_HASH_SIZE, SP_MEM_SIZE,
    TLB_LUT_ENTRIES,
};
use super::StateError;
use crate::movie::MovieFreeze;

/// Marks a state whose pending SI DMA was completed at capture time.
pub const SI_FIXUP_BIT: u32 = 1 << 31;

/// Cycles until the synthesized SI interrupt fires.
const SI_FIXUP_DELAY: u32 = 0x900;

const EVENT_TERMINATOR: u32 = 0xFFFF_FFFF;

/// Bytes the decoder scans for the event terminator before giving up.
pub const EVENT_QUEUE_SCAN_LIMIT: usize = 1024;

/// Most events that still leave room for the terminator inside the scan limit.
pub const MAX_EVENTS: usize = (EVENT_QUEUE_SCAN_LIMIT - 4) / 8;

pub const SCREENSHOT_TAG: [u8; 4] = *b"SCR\0";

pub const FIXED_BLOCK_SIZE: usize = PeripheralRegs::SIZE
    + RDRAM_SIZE
    + 2 * SP_MEM_SIZE
    + PIF_RAM_SIZE
    + FLASHRAM_INFO_SIZE
    + 2 * TLB_LUT_ENTRIES * 4
    + CpuState::SIZE
    + 3 * 4;

/// Encoded state plus whether the SI fixup ran while producing it.
#[derive(Debug)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub fixup_applied: bool,
}

#[derive(Debug)]
pub struct Decoded {
    pub snapshot: MachineSnapshot,
    /// The state carried the fixup bit; the next SI DMA must be skipped.
    pub skip_si_dma: bool,
}

/// Finish a pending PIF-to-RDRAM transfer when no SI interrupt is queued.
///
/// Copies the 64-byte PIF RAM into RDRAM at the SI DMA address, byte-swapped
/// per word the way the SI DMA would, and schedules the SI interrupt.
/// Returns whether anything was changed.
pub fn apply_si_fixup(snapshot: &mut MachineSnapshot) -> bool {
    if snapshot.interrupts.has_event(interrupt::SI_INT) {
        return false;
    }

    log::warn!("[ST] No SI interrupt in queue, adding one...");

    let base = (snapshot.regs.si.dram_addr as usize / 4) * 4;
    match base.checked_add(PIF_RAM_SIZE) {
        Some(end) if end <= snapshot.rdram.len() => {
            for (dst, src) in snapshot.rdram[base..end]
                .chunks_exact_mut(4)
                .zip(snapshot.pif_ram.chunks_exact(4))
            {
                dst[0] = src[3];
                dst[1] = src[2];
                dst[2] = src[1];
                dst[3] = src[0];
            }
        }
        _ => log::warn!(
            "[ST] SI DMA address {:#010X} outside RDRAM, skipping PIF copy",
            snapshot.regs.si.dram_addr
        ),
    }

    let now = snapshot.cpu.cop0[cop0::COUNT];
    snapshot
        .interrupts
        .add_event(interrupt::SI_INT, now, SI_FIXUP_DELAY);
    true
}

/// Run the SI fixup and serialize `snapshot`.
///
/// The fixup mutates `snapshot`; callers must hand it back to the core so the
/// live machine matches the bytes. The fixup bit itself exists only on the wire.
pub fn encode(snapshot: &mut MachineSnapshot) -> Result<Encoded, StateError> {
    let fixup_applied = apply_si_fixup(snapshot);
    let bytes = write_snapshot(snapshot, fixup_applied)?;
    Ok(Encoded {
        bytes,
        fixup_applied,
    })
}

fn write_snapshot(s: &MachineSnapshot, fixup_bit: bool) -> Result<Vec<u8>, StateError> {
    if s.interrupts.events.len() > MAX_EVENTS {
        return Err(StateError::TooManyEvents(s.interrupts.events.len()));
    }

    let mut w = StateWriter::with_capacity(ROM_HASH_SIZE + FIXED_BLOCK_SIZE + 0x2000);
    w.write_bytes(&s.rom_hash);

    let mut regs = s.regs;
    if fixup_bit {
        regs.rdram.device_manuf |= SI_FIXUP_BIT;
    }
    regs.put(&mut w);

    w.write_exact(&s.rdram, RDRAM_SIZE);
    w.write_exact(&s.sp_dmem, SP_MEM_SIZE);
    w.write_exact(&s.sp_imem, SP_MEM_SIZE);
    w.write_bytes(&s.pif_ram);
    w.write_bytes(&s.flashram);
    write_lut(&mut w, &s.tlb_lut_r);
    write_lut(&mut w, &s.tlb_lut_w);
    s.cpu.write(&mut w);

    w.write_u32(s.interrupts.next_interrupt);
    w.write_u32(s.interrupts.next_vi);
    w.write_u32(s.interrupts.vi_field);
    for event in &s.interrupts.events {
        w.write_u32(event.kind);
        w.write_u32(event.count);
    }
    w.write_u32(EVENT_TERMINATOR);

    match &s.movie {
        Some(freeze) => {
            w.write_u32(1);
            freeze.write(&mut w);
        }
        None => w.write_u32(0),
    }

    if let Some(shot) = &s.screenshot {
        let pixels = screenshot_len(shot.width, shot.height)
            .ok_or(StateError::Malformed("screenshot dimensions overflow"))?;
        w.write_bytes(&SCREENSHOT_TAG);
        w.write_u32(shot.width);
        w.write_u32(shot.height);
        w.write_exact(&shot.rgb, pixels);
    }

    Ok(w.into_bytes())
}

fn write_lut(w: &mut StateWriter, lut: &[u32]) {
    for i in 0..TLB_LUT_ENTRIES {
        w.write_u32(lut.get(i).copied().unwrap_or(0));
    }
}

fn read_lut(r: &mut StateReader<'_>) -> Result<Vec<u32>, StateError> {
    let raw = r.read_exact(TLB_LUT_ENTRIES * 4)?;
    Ok(raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn screenshot_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
}

/// The ROM hash a state was captured on.
pub fn read_rom_hash(data: &[u8]) -> Result<[u8; ROM_HASH_SIZE], StateError> {
    StateReader::new(data).read_array()
}

/// Parse an uncompressed savestate.
///
/// Nothing is applied anywhere; a failed decode leaves no trace.
pub fn decode(data: &[u8]) -> Result<Decoded, StateError> {
    let mut r = StateReader::new(data);
    let rom_hash = r.read_array()?;
    r.require(FIXED_BLOCK_SIZE)?;

    let mut regs = PeripheralRegs::get(&mut r)?;
    let skip_si_dma = regs.rdram.device_manuf & SI_FIXUP_BIT != 0;
    if skip_si_dma {
        regs.rdram.device_manuf &= !SI_FIXUP_BIT;
    }

    let rdram = r.read_exact(RDRAM_SIZE)?.to_vec();
    let sp_dmem = r.read_exact(SP_MEM_SIZE)?.to_vec();
    let sp_imem = r.read_exact(SP_MEM_SIZE)?.to_vec();
    let pif_ram = r.read_array()?;
    let flashram = r.read_array()?;
    let tlb_lut_r = read_lut(&mut r)?;
    let tlb_lut_w = read_lut(&mut r)?;
    let cpu = CpuState::read(&mut r)?;

    let interrupts = InterruptState {
        next_interrupt: r.read_u32()?,
        next_vi: r.read_u32()?,
        vi_field: r.read_u32()?,
        events: read_events(&mut r)?,
    };

    let movie = match r.read_u32()? {
        0 => None,
        _ => Some(MovieFreeze::read(&mut r)?),
    };

    let screenshot = read_screenshot(&mut r)?;

    Ok(Decoded {
        snapshot: MachineSnapshot {
            rom_hash,
            regs,
            rdram,
            sp_dmem,
            sp_imem,
            pif_ram,
            flashram,
            tlb_lut_r,
            tlb_lut_w,
            cpu,
            interrupts,
            movie,
            screenshot,
        },
        skip_si_dma,
    })
}

fn read_events(r: &mut StateReader<'_>) -> Result<Vec<InterruptEvent>, StateError> {
    let mut events = Vec::new();
    let mut len = 0;
    while len < EVENT_QUEUE_SCAN_LIMIT {
        let kind = r.read_u32()?;
        if kind == EVENT_TERMINATOR {
            return Ok(events);
        }
        let count = r.read_u32()?;
        events.push(InterruptEvent { kind, count });
        len += 8;
    }
    Err(StateError::EventQueueTooLong)
}

fn read_screenshot(r: &mut StateReader<'_>) -> Result<Option<Screenshot>, StateError> {
    log::debug!("[ST] {} bytes remaining after state data", r.remaining());
    if r.remaining() < SCREENSHOT_TAG.len() {
        return Ok(None);
    }
    let tag: [u8; 4] = r.read_array()?;
    if tag != SCREENSHOT_TAG {
        log::debug!("[ST] Ignoring unknown trailing section {:02X?}", tag);
        return Ok(None);
    }

    let width = u32::try_from(r.read_i32()?)
        .map_err(|_| StateError::Malformed("negative screenshot width"))?;
    let height = u32::try_from(r.read_i32()?)
        .map_err(|_| StateError::Malformed("negative screenshot height"))?;
    let len = screenshot_len(width, height)
        .ok_or(StateError::Malformed("screenshot dimensions overflow"))?;
    let rgb = r.read_exact(len)?.to_vec();
    Ok(Some(Screenshot { width, height, rgb }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movie::InputSample;

    fn sample_snapshot() -> MachineSnapshot {
        let mut s = MachineSnapshot::new();
        s.rom_hash.copy_from_slice(b"0123456789abcdef0123456789abcdef");
        s.regs.si.dram_addr = 0x1000;
        s.regs.vi.origin = 0x0010_0000;
        s.regs.sp.status_flags[3] = 1;
        s.rdram[0x40] = 0xAB;
        s.sp_dmem[5] = 9;
        s.pif_ram[0] = 0xFF;
        s.tlb_lut_r[7] = 0x8000_1234;
        s.cpu.gpr[29] = 0xFFFF_FFFF_8040_0000;
        s.cpu.cop0[cop0::COUNT] = 0x1234;
        s.cpu.cop0[12] = 0x3400_0000;
        s.cpu.pc = 0x8000_0400;
        s.interrupts.next_vi = 0x5000;
        s.interrupts.add_event(interrupt::VI_INT, 0x1234, 0x4000);
        s.interrupts.add_event(interrupt::SI_INT, 0x1234, 0x900);
        s
    }

    #[test]
    fn fixed_block_matches_legacy_size() {
        assert_eq!(ROM_HASH_SIZE + FIXED_BLOCK_SIZE, 0xA0_2BB4);
    }

    #[test]
    fn round_trip_without_fixup() {
        let mut s = sample_snapshot();
        s.movie = Some(MovieFreeze {
            size: 16 + 4 * 3,
            uid: 42,
            current_sample: 1,
            current_vi: 2,
            length_samples: 2,
            inputs: vec![InputSample::from_raw(1), InputSample::from_raw(2), InputSample::from_raw(3)],
        });
        s.screenshot = Some(Screenshot {
            width: 2,
            height: 1,
            rgb: vec![1, 2, 3, 4, 5, 6],
        });
        let original = s.clone();

        let encoded = encode(&mut s).expect("encode");
        assert!(!encoded.fixup_applied);
        assert_eq!(s, original);

        let decoded = decode(&encoded.bytes).expect("decode");
        assert!(!decoded.skip_si_dma);
        assert_eq!(decoded.snapshot, original);
    }

    #[test]
    fn fixup_is_deterministic_and_wire_only() {
        let mut a = sample_snapshot();
        a.interrupts.events.retain(|e| e.kind != interrupt::SI_INT);
        let mut b = a.clone();

        let ea = encode(&mut a).expect("encode a");
        let eb = encode(&mut b).expect("encode b");
        assert!(ea.fixup_applied);
        assert_eq!(ea.bytes, eb.bytes);

        // PIF words land byte-swapped at the SI DMA address.
        assert_eq!(a.rdram[0x1003], 0xFF);
        assert!(a.interrupts.has_event(interrupt::SI_INT));
        assert_eq!(a.regs.rdram.device_manuf & SI_FIXUP_BIT, 0);

        let decoded = decode(&ea.bytes).expect("decode");
        assert!(decoded.skip_si_dma);
        assert_eq!(decoded.snapshot, a);

        // A second encode finds the SI interrupt and leaves things alone.
        let again = encode(&mut a).expect("re-encode");
        assert!(!again.fixup_applied);
    }

    #[test]
    fn cop0_padding_holds_next_register() {
        let mut s = sample_snapshot();
        let bytes = encode(&mut s).expect("encode").bytes;
        let cop0_at = ROM_HASH_SIZE
            + PeripheralRegs::SIZE
            + RDRAM_SIZE
            + 2 * SP_MEM_SIZE
            + PIF_RAM_SIZE
            + FLASHRAM_INFO_SIZE
            + 2 * TLB_LUT_ENTRIES * 4
            + 4
            + 32 * 8;
        let slot = |i: usize| {
            let at = cop0_at + i * 8;
            (
                u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()),
                u32::from_le_bytes(bytes[at + 4..at + 8].try_into().unwrap()),
            )
        };
        assert_eq!(slot(11), (0, 0x3400_0000));
        assert_eq!(slot(12), (0x3400_0000, 0));
    }

    #[test]
    fn unterminated_event_queue_is_rejected() {
        let mut s = sample_snapshot();
        let mut bytes = encode(&mut s).expect("encode").bytes;
        let events_at = ROM_HASH_SIZE + FIXED_BLOCK_SIZE;
        bytes.truncate(events_at);
        for i in 0..200u32 {
            bytes.extend_from_slice(&interrupt::VI_INT.to_le_bytes());
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        assert!(matches!(decode(&bytes), Err(StateError::EventQueueTooLong)));
    }

    #[test]
    fn event_count_is_capped_on_encode() {
        let mut s = sample_snapshot();
        s.interrupts.events = (0..MAX_EVENTS as u32)
            .map(|i| InterruptEvent {
                kind: interrupt::VI_INT,
                count: i,
            })
            .collect();
        s.interrupts.events[0].kind = interrupt::SI_INT;
        let bytes = encode(&mut s).expect("127 events fit").bytes;
        assert_eq!(decode(&bytes).expect("decode").snapshot.interrupts.events.len(), MAX_EVENTS);

        s.interrupts.events.push(InterruptEvent {
            kind: interrupt::AI_INT,
            count: 0,
        });
        assert!(matches!(
            encode(&mut s),
            Err(StateError::TooManyEvents(128))
        ));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut s = sample_snapshot();
        let bytes = encode(&mut s).expect("encode").bytes;
        assert!(matches!(
            decode(&bytes[..1000]),
            Err(StateError::Truncated { .. })
        ));
        assert!(matches!(
            decode(&bytes[..bytes.len() - 2]),
            Err(StateError::Truncated { .. })
        ));
    }

    #[test]
    fn unknown_trailer_is_ignored() {
        let mut s = sample_snapshot();
        let mut bytes = encode(&mut s).expect("encode").bytes;
        bytes.extend_from_slice(b"XYZW1234");
        let decoded = decode(&bytes).expect("decode");
        assert!(decoded.snapshot.screenshot.is_none());
    }
}
