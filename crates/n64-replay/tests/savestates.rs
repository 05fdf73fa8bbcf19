mod common;

use common::{input_for, launched_session, run_frame, RecordingHooks, ToyCore};
use n64_replay::engine::ReplayEvent;
use n64_replay::savestate::{codec, compress, StateError, TaskTag};
use n64_replay::{ReplayConfig, ReplaySession};

#[test]
fn requests_before_launch_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = ReplaySession::new(common::config(dir.path()), RecordingHooks::new());
    assert!(matches!(session.save_slot(0), Err(StateError::CoreNotLaunched)));
    assert!(matches!(session.load_slot(0), Err(StateError::CoreNotLaunched)));
    assert!(session.queue().is_empty());

    session.set_core_launched(true);
    session.save_slot(0).unwrap();
    session.set_core_launched(false);
    assert!(session.queue().is_empty(), "stopping the core drops pending work");
}

#[test]
fn slot_round_trip_with_undo() {
    let dir = tempfile::tempdir().unwrap();
    let config = ReplayConfig {
        compress_savestates: true,
        compression_level: 1,
        increment_slot: true,
        ..common::config(dir.path())
    };
    let mut session = ReplaySession::new(config, RecordingHooks::new());
    session.set_core_launched(true);
    let mut core = ToyCore::new();

    for i in 0..5 {
        run_frame(&mut session, &mut core, input_for(i));
    }
    session.save_slot(1).unwrap();
    assert_eq!(session.selected_slot(), 2);
    let outcomes = session.do_work(&mut core);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].label, "slot 1");
    assert!(outcomes[0].result.is_ok());

    let file = dir.path().join("saves").join("TOY ROM USA.st1");
    let raw = std::fs::read(&file).unwrap();
    assert!(compress::is_compressed(&raw));
    let saved_acc = core.acc();

    for i in 5..10 {
        run_frame(&mut session, &mut core, input_for(i));
    }
    session.load_slot(1).unwrap();
    session.do_work(&mut core);
    assert_eq!(core.frame(), 5);
    assert_eq!(core.acc(), saved_acc);
    assert_eq!(core.legacy_entry, Some(false));
    assert!(session.hooks().saw(&ReplayEvent::StateSaved));
    assert!(session.hooks().saw(&ReplayEvent::StateLoaded));

    // The undo capture ran before the load.
    let undo = codec::decode(session.undo_savestate().unwrap()).unwrap();
    assert_eq!(undo.snapshot.cpu.gpr[1], 10);

    session.undo_load().unwrap();
    session.do_work(&mut core);
    assert_eq!(core.frame(), 10);
}

#[test]
fn missing_slot_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = launched_session(dir.path());
    let mut core = ToyCore::new();
    session.load_slot(7).unwrap();
    session.do_work(&mut core);
    assert!(!session.hooks().saw(&ReplayEvent::StateLoaded));
    assert_eq!(core.frame(), 0);
}

#[test]
fn memory_states_come_back_tagged() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = launched_session(dir.path());
    let mut core = ToyCore::new();
    for i in 0..3 {
        run_frame(&mut session, &mut core, input_for(i));
    }

    session.save_memory(7).unwrap();
    let outcomes = session.do_work(&mut core);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].tag, Some(TaskTag::Caller(7)));
    let state = outcomes[0].result.as_ref().unwrap().clone();
    assert_eq!(codec::read_rom_hash(&state).unwrap(), core.rom.md5);

    run_frame(&mut session, &mut core, input_for(3));
    session.load_memory(state, 8).unwrap();
    let outcomes = session.do_work(&mut core);
    assert_eq!(outcomes.len(), 1, "the injected undo save stays internal");
    assert!(outcomes[0].result.is_ok());
    assert_eq!(core.frame(), 3);
}

#[test]
fn declining_a_rom_mismatch_cancels_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = launched_session(dir.path());
    let mut core = ToyCore::new();
    run_frame(&mut session, &mut core, input_for(0));
    session.save_memory(1).unwrap();
    let state = session.do_work(&mut core).remove(0).result.unwrap();

    let mut other = ToyCore::with_hash([b'f'; 32]);
    session.hooks_mut().accept = false;
    session.load_memory(state, 2).unwrap();
    let outcome = session.do_work(&mut other).remove(0);

    assert!(matches!(outcome.result, Err(StateError::Cancelled)));
    assert_eq!(session.hooks().prompts.len(), 1);
    assert_eq!(other.frame(), 0, "nothing was applied");
}

#[test]
fn silent_mode_skips_prompts() {
    let dir = tempfile::tempdir().unwrap();
    let config = ReplayConfig {
        silent: true,
        ..common::config(dir.path())
    };
    let mut session = ReplaySession::new(config, RecordingHooks::new());
    session.set_core_launched(true);
    let mut core = ToyCore::new();
    run_frame(&mut session, &mut core, input_for(0));
    session.save_memory(1).unwrap();
    let state = session.do_work(&mut core).remove(0).result.unwrap();

    let mut other = ToyCore::with_hash([b'f'; 32]);
    session.hooks_mut().accept = false;
    session.load_memory(state, 2).unwrap();
    let outcome = session.do_work(&mut other).remove(0);
    assert!(outcome.result.is_ok());
    assert!(session.hooks().prompts.is_empty());
    assert_eq!(other.frame(), 1);
}

#[test]
fn si_fixup_reaches_the_live_machine() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = launched_session(dir.path());
    let mut core = ToyCore::new();
    core.machine.interrupts.events.clear();

    session.save_memory(1).unwrap();
    let state = session.do_work(&mut core).remove(0).result.unwrap();
    assert_eq!(core.si_skips, 1);
    assert!(core.machine.interrupts.has_event(
        n64_replay::savestate::snapshot::interrupt::SI_INT
    ));

    let decoded = codec::decode(&state).unwrap();
    assert!(decoded.skip_si_dma);

    session.load_memory(state, 2).unwrap();
    session.do_work(&mut core);
    assert_eq!(core.si_skips, 2);
}
