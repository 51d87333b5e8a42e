// Integration test for parameter connections and step range invariants

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ssq::midi::NullSink;
use ssq::sequencer::{LineParam, NUM_LINES, NUM_STEPS};
use ssq::{ConnectionRules, ParamAddress, ParamClass, ParamEdit, Pattern, PooledOutput};

fn line(line: usize, param: LineParam) -> ParamAddress {
    ParamAddress::Line {
        sequence: 0,
        line,
        param,
    }
}

fn step(line: usize, step: usize) -> ParamAddress {
    ParamAddress::StepValue {
        sequence: 0,
        line,
        step,
    }
}

/// Raw value selecting `source` (0-based line), optionally step synchronised
fn connection(class: ParamClass, source: usize, sync: bool) -> i32 {
    let selector = source + if sync { NUM_LINES } else { 0 };
    class.def().max + 1 + selector as i32
}

/// Velocity source on line 2 with a distinct value on each of the first steps
fn velocity_source(pattern: &mut Pattern) {
    pattern.edit(line(2, LineParam::Mode), ParamEdit::Set(2));
    pattern.edit(line(2, LineParam::Gate), ParamEdit::Set(9));
    for s in 0..4 {
        pattern.edit(step(2, s), ParamEdit::Set(100 + s as i32));
    }
}

fn pattern() -> Pattern {
    Pattern::with_seed(Arc::new(ConnectionRules::standard()), 11)
}

#[test]
fn test_plain_connection_ignores_reader_position() {
    let mut p = pattern();
    velocity_source(&mut p);
    p.edit(line(0, LineParam::Mode), ParamEdit::Set(1));
    p.edit(
        line(0, LineParam::Velocity),
        ParamEdit::Set(connection(ParamClass::Velocity, 2, false)),
    );

    let mut out = PooledOutput::new(NullSink, 16);
    for pulse in 0..10 {
        p.pulse(pulse, pulse as u64, &mut out);
    }

    // Source committed step 0 once and never advanced again
    let seq = p.sequence(0).unwrap();
    assert_eq!(seq.line(0).unwrap().current_step(), 3);
    assert_eq!(seq.resolve(0, LineParam::Velocity), Some(100));
}

#[test]
fn test_sync_connection_follows_reader_position() {
    let mut p = pattern();
    velocity_source(&mut p);
    p.edit(line(0, LineParam::Mode), ParamEdit::Set(1));
    p.edit(
        line(0, LineParam::Velocity),
        ParamEdit::Set(connection(ParamClass::Velocity, 2, true)),
    );

    let mut out = PooledOutput::new(NullSink, 16);
    let mut seen = Vec::new();
    for pulse in 0..10 {
        p.pulse(pulse, pulse as u64, &mut out);
        if pulse % 3 == 0 {
            seen.push(p.sequence(0).unwrap().resolve(0, LineParam::Velocity));
        }
    }
    assert_eq!(seen, vec![Some(100), Some(101), Some(102), Some(103)]);
}

#[test]
fn test_connection_display_and_selector() {
    let p = {
        let mut p = pattern();
        p.edit(line(0, LineParam::Mode), ParamEdit::Set(1));
        p.edit(
            line(0, LineParam::Gate),
            ParamEdit::Set(connection(ParamClass::Gate, 5, true)),
        );
        p
    };
    let gate = p.param(line(0, LineParam::Gate)).unwrap();
    assert!(gate.is_connected());
    assert_eq!(gate.connection_selector(), Some(NUM_LINES + 5));
    assert_eq!(gate.display(), "L6s");
}

#[test]
fn test_wiring_not_in_rules_reads_default() {
    let mut p = Pattern::with_seed(Arc::new(ConnectionRules::empty()), 0);
    velocity_source(&mut p);
    p.edit(line(0, LineParam::Mode), ParamEdit::Set(1));
    p.edit(
        line(0, LineParam::Velocity),
        ParamEdit::Set(connection(ParamClass::Velocity, 2, false)),
    );
    assert_eq!(
        p.sequence(0).unwrap().resolve(0, LineParam::Velocity),
        Some(ParamClass::Velocity.def().default_value())
    );
}

#[test]
fn test_first_never_exceeds_last_under_random_edits() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut p = pattern();
    p.edit(line(0, LineParam::Mode), ParamEdit::Set(1));
    let mut out = PooledOutput::new(NullSink, 16);

    for pulse in 0..2_000 {
        let param = if rng.gen_bool(0.5) {
            LineParam::FirstStep
        } else {
            LineParam::LastStep
        };
        let edit = match rng.gen_range(0..4) {
            0 => ParamEdit::Set(rng.gen_range(-5..40)),
            1 => ParamEdit::Increment,
            2 => ParamEdit::Decrement,
            _ => ParamEdit::RelativeController(rng.gen_range(0..128)),
        };
        p.edit(line(0, param), edit);
        if rng.gen_ratio(1, 20) {
            p.edit(line(0, LineParam::PlayMode), ParamEdit::Set(rng.gen_range(0..5)));
        }
        p.pulse(pulse, pulse as u64, &mut out);

        let l = p.sequence(0).unwrap().line(0).unwrap();
        let first = l.param(LineParam::FirstStep).get();
        let last = l.param(LineParam::LastStep).get();
        assert!(first <= last, "first {} > last {} after {:?}", first, last, edit);
        assert!((0..NUM_STEPS as i32).contains(&first));
        assert!((0..NUM_STEPS as i32).contains(&last));

        // A freshly committed step always lies inside the current range
        if l.pulses() == 1 {
            assert!(
                (first..=last).contains(&l.current_step()),
                "step {} outside {}..={}",
                l.current_step(),
                first,
                last
            );
        }
    }
}
