// Integration test for clock accuracy and sequencer thread timing
// Time is driven explicitly, so every assertion is deterministic

use std::sync::Arc;

use ringbuf::traits::{Consumer, Producer};
use ssq::messaging::{create_command_channel, create_event_channel};
use ssq::midi::OutputMessage;
use ssq::sequencer::{LineParam, PPQ};
use ssq::{
    Clock, Command, ConnectionRules, ParamAddress, ParamEdit, Pattern, PooledOutput,
    RecordingSink, Sequencer, SequencerEvent, SharedSequencerState,
};

#[test]
fn test_clock_has_no_drift_over_one_beat() {
    for bpm in 30..=250 {
        let mut clock = Clock::new(bpm);
        let period = clock.period_us();
        clock.start(0);

        let mut pulses = Vec::new();
        for k in 1..=u64::from(PPQ) {
            let before = pulses.len();
            clock.update(k * period, |pulse, _| pulses.push(pulse));
            assert_eq!(pulses.len(), before + 1, "bpm {} update {}", bpm, k);
        }

        assert_eq!(pulses, (0..i64::from(PPQ)).collect::<Vec<_>>(), "bpm {}", bpm);
        assert_eq!(clock.current_pulse(), i64::from(PPQ) - 1);
    }
}

#[test]
fn test_clock_catches_up_after_a_stall() {
    let mut clock = Clock::new(120);
    let period = clock.period_us();
    clock.start(5_000);

    let mut pulses = Vec::new();
    clock.update(5_000 + period * u64::from(PPQ), |pulse, ms| pulses.push((pulse, ms)));

    assert_eq!(pulses.len(), PPQ as usize);
    assert_eq!(pulses.first(), Some(&(0, 20)));
    // Elapsed time in the callback is the pulse's own time, not the update time
    assert_eq!(pulses.last(), Some(&(23, 499)));
}

#[test]
fn test_sequencer_plays_one_note_per_quarter() {
    let (mut commands, command_rx) = create_command_channel(32);
    let (event_tx, mut events) = create_event_channel(256);
    let shared = SharedSequencerState::new();
    let pattern = Pattern::with_seed(Arc::new(ConnectionRules::standard()), 1);
    let mut sequencer = Sequencer::new(
        pattern,
        PooledOutput::new(RecordingSink::default(), 16),
        command_rx,
        event_tx,
        Arc::clone(&shared),
    );

    let line = |param| ParamAddress::Line {
        sequence: 2,
        line: 4,
        param,
    };
    commands.try_push(Command::edit(ParamAddress::Tempo, ParamEdit::Set(120))).unwrap();
    commands.try_push(Command::edit(line(LineParam::Mode), ParamEdit::Set(1))).unwrap();
    commands.try_push(Command::edit(line(LineParam::Gate), ParamEdit::Set(3))).unwrap(); // 1/4
    commands.try_push(Command::Start).unwrap();
    sequencer.tick(0);

    // Four beats in uneven slices
    let beat_us = sequencer.clock().period_us() * u64::from(PPQ);
    for now in [1_000, beat_us / 3, beat_us * 2 + 7, beat_us * 4] {
        sequencer.tick(now);
    }

    let note_ons: Vec<u64> = sequencer
        .output()
        .sink()
        .messages()
        .iter()
        .filter_map(|m| match *m {
            OutputMessage::NoteOn { timestamp, .. } => Some(timestamp),
            _ => None,
        })
        .collect();
    assert_eq!(note_ons.len(), 4);
    assert!(note_ons.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(shared.pulse(), 4 * i64::from(PPQ) - 1);
    assert!(shared.is_playing());

    let beats: Vec<i64> = std::iter::from_fn(|| events.try_pop())
        .filter_map(|e| match e {
            SequencerEvent::Beat(pulse) => Some(pulse),
            _ => None,
        })
        .collect();
    assert_eq!(beats, vec![0, 24, 48, 72]);
}

#[test]
fn test_restart_rewinds_lines() {
    let (mut commands, command_rx) = create_command_channel(8);
    let (event_tx, _events) = create_event_channel(256);
    let mut pattern = Pattern::with_seed(Arc::new(ConnectionRules::standard()), 1);
    pattern.edit(
        ParamAddress::Line { sequence: 0, line: 0, param: LineParam::Mode },
        ParamEdit::Set(1),
    );
    let mut sequencer = Sequencer::new(
        pattern,
        PooledOutput::new(RecordingSink::default(), 16),
        command_rx,
        event_tx,
        SharedSequencerState::new(),
    );

    commands.try_push(Command::Start).unwrap();
    sequencer.tick(0);
    let period = sequencer.clock().period_us();
    sequencer.tick(period * 10);
    assert_eq!(sequencer.pattern().sequence(0).unwrap().line(0).unwrap().current_step(), 3);

    // Start while running restarts from the top
    commands.try_push(Command::Start).unwrap();
    sequencer.tick(period * 10 + 1);
    let line = sequencer.pattern().sequence(0).unwrap().line(0).unwrap();
    assert_eq!(line.current_step(), -1);
    assert!(line.held_note().is_none());
    assert_eq!(sequencer.clock().current_pulse(), -1);
}
