// Resolver - Effective parameter values across connected lines
// Read-only view over a sequence used to plan each line's pulse

use rand::Rng;
use rand::rngs::StdRng;

use crate::param::{ConnectionRules, Parameter};

use super::line::{Line, LineMode, LineParam, PlayMode, StepAdvance, StepMode, StepTrigger};
use super::{NUM_LINES, NUM_STEPS};

/// Sync connections deeper than this resolve to the parameter default
const MAX_RESOLVE_DEPTH: usize = NUM_LINES + 1;

/// What a line does on a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulsePlan {
    /// Gate elapsed: start this step
    Advance(StepAdvance),
    /// Gate elapsed but every candidate step is skipped
    Blocked,
    /// Between steps; stop the note once `length` pulses have passed
    Hold { length: i32 },
}

pub struct Resolver<'a> {
    lines: &'a [Line; NUM_LINES],
    rules: &'a ConnectionRules,
}

impl<'a> Resolver<'a> {
    pub fn new(lines: &'a [Line; NUM_LINES], rules: &'a ConnectionRules) -> Self {
        Self { lines, rules }
    }

    /// Effective value of `param` as read by a line sitting on `reader_step`
    pub fn resolve(&self, param: &Parameter, reader_step: i32) -> i32 {
        self.resolve_at(param, reader_step, 0)
    }

    fn resolve_at(&self, param: &Parameter, reader_step: i32, depth: usize) -> i32 {
        let Some(selector) = param.connection_selector() else {
            return param.resolved_value();
        };

        let sync = selector / NUM_LINES;
        let target = &self.lines[selector % NUM_LINES];

        if !self.rules.is_valid(param.class(), target.output().class()) {
            return param.default_value();
        }

        if sync == 0 {
            return target.output().get();
        }

        if depth >= MAX_RESOLVE_DEPTH {
            return param.default_value();
        }
        let step = (reader_step + NUM_STEPS as i32).rem_euclid(NUM_STEPS as i32) as usize;
        self.output_at(target, step, target.current_step(), depth + 1)
    }

    /// Resolve a named parameter of `line` from its own position
    pub fn resolve_line_param(&self, line: &Line, param: LineParam) -> i32 {
        self.resolve(line.param(param), line.current_step())
    }

    /// Output formula of `line` evaluated on `step`
    pub fn line_output(&self, line: &Line, step: usize) -> i32 {
        self.output_at(line, step, line.current_step(), 0)
    }

    fn output_at(&self, line: &Line, step: usize, reader_step: i32, depth: usize) -> i32 {
        let value = |param: &Parameter| self.resolve_at(param, reader_step, depth);
        let step_value = || line.step_value(step).map(value).unwrap_or(0);

        match line.mode() {
            LineMode::Note => {
                value(line.param(LineParam::Note)) + value(line.param(LineParam::Add)) + step_value()
            }
            LineMode::Velocity | LineMode::Add | LineMode::Control => {
                value(line.param(LineParam::Add)) + step_value()
            }
            LineMode::Gate | LineMode::Length | LineMode::Midi | LineMode::PlayMode => step_value(),
            LineMode::Off => 0,
        }
    }

    /// Decide what `line` does on the next pulse
    pub fn plan_pulse(&self, line: &Line, rng: &mut StdRng) -> PulsePlan {
        let gate = self.resolve_line_param(line, LineParam::Gate).max(1);

        if line.pulses() % gate != 0 {
            return PulsePlan::Hold {
                length: self.resolve_line_param(line, LineParam::Length),
            };
        }

        match self.next_step(line, rng) {
            Some((step, direction)) => PulsePlan::Advance(StepAdvance {
                step,
                direction,
                output: self.output_at(line, step, step as i32, 0),
            }),
            None => PulsePlan::Blocked,
        }
    }

    /// Advance the cursor under the play mode, skipping `Skip` steps
    ///
    /// Ordered modes try at most `last - first + 1` candidates; random mode
    /// draws from the steps that are not skipped. Returns `None` when every
    /// step in range is skipped.
    fn next_step(&self, line: &Line, rng: &mut StdRng) -> Option<(usize, i32)> {
        let mut current = line.current_step();
        let mut direction = line.direction();
        let mut attempts = 0;

        loop {
            let play_mode = PlayMode::from_value(self.resolve(line.param(LineParam::PlayMode), current));
            let first = self.resolve(line.param(LineParam::FirstStep), current);
            let last = self.resolve(line.param(LineParam::LastStep), current).max(first);

            if play_mode == PlayMode::Random {
                return random_step(line, first, last, rng).map(|step| (step, direction));
            }

            (current, direction) = advance(play_mode, current, direction, first, last, rng);

            let step = current as usize;
            if !is_skipped(line, step) {
                return Some((step, direction));
            }

            attempts += 1;
            if attempts >= last - first + 1 {
                return None;
            }
        }
    }

    /// MIDI action for the step `line` currently sits on
    pub fn trigger(&self, line: &Line) -> StepTrigger {
        let port = self.resolve_line_param(line, LineParam::MidiPort);
        let device = clamp_byte(port / 16);
        let channel = clamp_byte(port % 16);
        let output = self.resolve(line.output(), line.current_step());

        match line.mode() {
            LineMode::Note => StepTrigger::Note {
                device,
                channel,
                note: clamp_data(output),
                velocity: clamp_data(self.resolve_line_param(line, LineParam::Velocity)),
            },
            LineMode::Control => StepTrigger::Control {
                device,
                channel,
                cc: clamp_data(self.resolve_line_param(line, LineParam::MidiCc)),
                value: clamp_data(output),
            },
            _ => StepTrigger::Silent,
        }
    }
}

/// One play mode step from `current`, clamped into `[first, last]`
pub fn advance(
    play_mode: PlayMode,
    mut current: i32,
    mut direction: i32,
    first: i32,
    last: i32,
    rng: &mut StdRng,
) -> (i32, i32) {
    match play_mode {
        PlayMode::Forward => {
            direction = 1;
            current += 1;
            if current > last {
                current = first;
            }
        }
        PlayMode::Backward => {
            direction = -1;
            current -= 1;
            if current < first {
                current = last;
            }
        }
        PlayMode::PingPong => {
            current += direction;
            if direction > 0 {
                if current > last {
                    direction = -1;
                    current = last - 1;
                }
            } else if current < first {
                direction = 1;
                current = first + 1;
            }
        }
        PlayMode::ForwardBackward => {
            current += direction;
            if direction > 0 {
                if current > last {
                    direction = -1;
                    current = last;
                }
            } else if current < first {
                direction = 1;
                current = first;
            }
        }
        PlayMode::Random => {
            current = first + rng.gen_range(0..=(last - first).max(0));
        }
    }

    (current.max(first).min(last), direction)
}

fn is_skipped(line: &Line, step: usize) -> bool {
    line.step_mode(step)
        .is_some_and(|p| StepMode::from_value(p.resolved_value()) == StepMode::Skip)
}

/// Uniform pick among the steps of `[first, last]` that are not skipped
fn random_step(line: &Line, first: i32, last: i32, rng: &mut StdRng) -> Option<usize> {
    let candidates = || {
        (first.max(0)..=last)
            .map(|s| s as usize)
            .filter(|&s| s < NUM_STEPS && !is_skipped(line, s))
    };
    let count = candidates().count();
    if count == 0 {
        return None;
    }
    candidates().nth(rng.gen_range(0..count))
}

fn clamp_data(value: i32) -> u8 {
    value.clamp(0, 127) as u8
}

fn clamp_byte(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}
