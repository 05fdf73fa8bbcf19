#![allow(dead_code)]

use std::path::{Path, PathBuf};

use n64_replay::engine::{ExecutionCore, ReplayEvent, ReplayHooks, RomIdentity};
use n64_replay::movie::header::start_flags;
use n64_replay::movie::{InputSample, PollOutcome};
use n64_replay::savestate::snapshot::interrupt;
use n64_replay::savestate::MachineSnapshot;
use n64_replay::{ReplayConfig, ReplaySession};

/// A machine whose whole behaviour is two registers: a frame counter in
/// GPR 1 and a running hash of every input in GPR 2.
pub struct ToyCore {
    pub machine: MachineSnapshot,
    pub rom: RomIdentity,
    pub resets: usize,
    pub si_skips: usize,
    pub legacy_entry: Option<bool>,
}

impl ToyCore {
    pub fn new() -> Self {
        Self::with_hash(*b"0123456789abcdef0123456789abcdef")
    }

    pub fn with_hash(md5: [u8; 32]) -> Self {
        Self {
            machine: power_on(),
            rom: RomIdentity {
                name: "TOY ROM".to_string(),
                crc1: 0xDEAD_BEEF,
                country_code: 0x45,
                md5,
            },
            resets: 0,
            si_skips: 0,
            legacy_entry: None,
        }
    }

    pub fn frame(&self) -> u64 {
        self.machine.cpu.gpr[1]
    }

    pub fn acc(&self) -> u64 {
        self.machine.cpu.gpr[2]
    }

    pub fn step(&mut self, input: InputSample) {
        let cpu = &mut self.machine.cpu;
        cpu.gpr[1] += 1;
        cpu.gpr[2] = mix(cpu.gpr[2], input);
        cpu.cop0[9] = cpu.cop0[9].wrapping_add(1000);
    }
}

fn power_on() -> MachineSnapshot {
    let mut machine = MachineSnapshot::new();
    machine.cpu.pc = 0x8000_0400;
    machine.interrupts.add_event(interrupt::SI_INT, 0, 0x900);
    machine
}

fn mix(acc: u64, input: InputSample) -> u64 {
    acc.wrapping_mul(31).wrapping_add(input.to_raw() as u64)
}

/// The accumulator a machine reaches after consuming `inputs` from power-on.
pub fn expected_acc(inputs: &[InputSample]) -> u64 {
    inputs.iter().fold(0, |acc, &i| mix(acc, i))
}

impl ExecutionCore for ToyCore {
    fn rom_identity(&self) -> RomIdentity {
        self.rom.clone()
    }

    fn capture(&mut self) -> MachineSnapshot {
        let mut snapshot = self.machine.clone();
        snapshot.rom_hash = self.rom.md5;
        snapshot
    }

    fn apply(&mut self, snapshot: &MachineSnapshot) {
        self.machine = snapshot.clone();
        self.machine.movie = None;
        self.machine.screenshot = None;
    }

    fn skip_next_si_dma(&mut self) {
        self.si_skips += 1;
    }

    fn reset(&mut self) {
        self.machine = power_on();
        self.resets += 1;
    }

    fn program_counter(&self) -> u32 {
        self.machine.cpu.pc
    }

    fn set_legacy_entry(&mut self, legacy: bool) {
        self.legacy_entry = Some(legacy);
    }
}

pub struct RecordingHooks {
    pub accept: bool,
    pub prompts: Vec<String>,
    pub events: Vec<ReplayEvent>,
    pub pauses: usize,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self {
            accept: true,
            prompts: Vec::new(),
            events: Vec::new(),
            pauses: 0,
        }
    }

    pub fn saw(&self, event: &ReplayEvent) -> bool {
        self.events.contains(event)
    }
}

impl ReplayHooks for RecordingHooks {
    fn confirm(&mut self, message: &str) -> bool {
        self.prompts.push(message.to_string());
        self.accept
    }

    fn notify(&mut self, event: ReplayEvent) {
        self.events.push(event);
    }

    fn pause(&mut self) {
        self.pauses += 1;
    }
}

pub type Session = ReplaySession<RecordingHooks>;

pub fn config(dir: &Path) -> ReplayConfig {
    ReplayConfig {
        saves_dir: dir.join("saves"),
        compress_savestates: false,
        seek_savestate_interval: 20,
        seek_savestate_max_count: 8,
        ..ReplayConfig::default()
    }
}

pub fn launched_session(dir: &Path) -> Session {
    let mut session = ReplaySession::new(config(dir), RecordingHooks::new());
    session.set_core_launched(true);
    session
}

pub fn input_for(i: usize) -> InputSample {
    InputSample {
        buttons: (i as u16).wrapping_mul(7),
        stick_x: (i % 100) as i8,
        stick_y: -((i % 50) as i8),
    }
}

/// One emulated frame: drain the queue, poll controller 0, run, VI.
pub fn run_frame(session: &mut Session, core: &mut ToyCore, live: InputSample) -> PollOutcome {
    session.do_work(core);
    let mut input = live;
    let outcome = session.on_controller_poll(0, &mut input);
    core.step(input);
    session.on_vi();
    outcome
}

/// Record `frames` samples from power-on into `<dir>/run.m64` and stop.
pub fn record_movie(dir: &Path, frames: usize) -> (Session, ToyCore, PathBuf) {
    let mut session = launched_session(dir);
    let mut core = ToyCore::new();
    let path = dir.join("run.m64");
    session
        .start_record(&mut core, &path, start_flags::FROM_NOTHING, "tester", "a toy run")
        .expect("start recording");
    for i in 0..frames {
        run_frame(&mut session, &mut core, input_for(i));
    }
    session.stop_all().expect("stop recording");
    (session, core, path)
}

/// Replay `path` from power-on up to sample `frames`.
pub fn play_to(session: &mut Session, core: &mut ToyCore, path: &Path, frames: usize) {
    session.start_playback(core, path).expect("start playback");
    for _ in 0..frames {
        run_frame(session, core, InputSample::default());
    }
    assert_eq!(session.movie().current_sample(), frames);
}
