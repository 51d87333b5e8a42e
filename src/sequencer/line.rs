// Line - One sequencer track
// Step tables, mode dependent parameter layout and transport state

use std::io::{Read, Write};

use crate::midi::output::{NoteHandle, NoteOutput};
use crate::param::{ParamClass, Parameter};

use super::edit::ParamEdit;
use super::{NUM_LINE_PARAMS, NUM_STEPS};

/// What a line does with its steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Off,
    Note,
    Velocity,
    Gate,
    Length,
    Midi,
    Add,
    Control,
    PlayMode,
}

impl LineMode {
    pub fn from_value(value: i32) -> Self {
        match value {
            1 => LineMode::Note,
            2 => LineMode::Velocity,
            3 => LineMode::Gate,
            4 => LineMode::Length,
            5 => LineMode::Midi,
            6 => LineMode::Add,
            7 => LineMode::Control,
            8 => LineMode::PlayMode,
            _ => LineMode::Off,
        }
    }

    /// Class of the step value parameters in this mode
    pub fn step_class(self) -> ParamClass {
        match self {
            LineMode::Off => ParamClass::None,
            LineMode::Note => ParamClass::NoteOffset,
            LineMode::Velocity => ParamClass::Velocity,
            LineMode::Gate => ParamClass::Gate,
            LineMode::Length => ParamClass::Length,
            LineMode::Midi => ParamClass::MidiPort,
            LineMode::Add | LineMode::Control => ParamClass::Add,
            LineMode::PlayMode => ParamClass::PlayMode,
        }
    }

    /// Parameters shown in the active slots for this mode
    pub fn active_layout(self) -> [Option<LineParam>; NUM_LINE_PARAMS] {
        let mut slots = [None; NUM_LINE_PARAMS];
        slots[0] = Some(LineParam::Mode);
        if self == LineMode::Off {
            return slots;
        }

        slots[1] = Some(LineParam::PlayMode);
        slots[2] = Some(LineParam::FirstStep);
        slots[3] = Some(LineParam::LastStep);
        slots[4] = Some(LineParam::SyncMode);
        slots[5] = Some(LineParam::SyncBase);
        slots[6] = Some(LineParam::Gate);

        match self {
            LineMode::Note => {
                slots[7] = Some(LineParam::Length);
                slots[8] = Some(LineParam::Note);
                slots[9] = Some(LineParam::Velocity);
                slots[10] = Some(LineParam::MidiPort);
                slots[15] = Some(LineParam::Add);
            }
            LineMode::Velocity | LineMode::Add => {
                slots[15] = Some(LineParam::Add);
            }
            LineMode::Control => {
                slots[7] = Some(LineParam::MidiCc);
                slots[8] = Some(LineParam::MidiPort);
                slots[15] = Some(LineParam::Add);
            }
            _ => {}
        }
        slots
    }

    /// Class of the line output in this mode
    pub fn output_class(self) -> ParamClass {
        match self {
            LineMode::Note => ParamClass::Note,
            other => other.step_class(),
        }
    }
}

/// Step ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Forward,
    Backward,
    PingPong,
    ForwardBackward,
    Random,
}

impl PlayMode {
    pub fn from_value(value: i32) -> Self {
        match value {
            1 => PlayMode::Backward,
            2 => PlayMode::PingPong,
            3 => PlayMode::ForwardBackward,
            4 => PlayMode::Random,
            _ => PlayMode::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    On,
    Off,
    Skip,
}

impl StepMode {
    pub fn from_value(value: i32) -> Self {
        match value {
            1 => StepMode::Off,
            2 => StepMode::Skip,
            _ => StepMode::On,
        }
    }
}

/// Named line parameters
///
/// The first twelve variants are persisted, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineParam {
    Mode,
    PlayMode,
    FirstStep,
    LastStep,
    SyncMode,
    SyncBase,
    Gate,
    Length,
    MidiPort,
    MidiCc,
    Velocity,
    Add,
    Note,
}

const NUM_NAMED_PARAMS: usize = 13;

impl LineParam {
    pub const ALL: [LineParam; NUM_NAMED_PARAMS] = [
        LineParam::Mode,
        LineParam::PlayMode,
        LineParam::FirstStep,
        LineParam::LastStep,
        LineParam::SyncMode,
        LineParam::SyncBase,
        LineParam::Gate,
        LineParam::Length,
        LineParam::MidiPort,
        LineParam::MidiCc,
        LineParam::Velocity,
        LineParam::Add,
        LineParam::Note,
    ];

    /// Parameters stored in pattern files, in file order
    pub const PERSISTED: [LineParam; 12] = [
        LineParam::Mode,
        LineParam::PlayMode,
        LineParam::FirstStep,
        LineParam::LastStep,
        LineParam::SyncMode,
        LineParam::SyncBase,
        LineParam::Gate,
        LineParam::Length,
        LineParam::MidiPort,
        LineParam::MidiCc,
        LineParam::Velocity,
        LineParam::Add,
    ];

    pub fn class(self) -> ParamClass {
        match self {
            LineParam::Mode => ParamClass::LineMode,
            LineParam::PlayMode => ParamClass::PlayMode,
            LineParam::FirstStep => ParamClass::FirstStep,
            LineParam::LastStep => ParamClass::LastStep,
            LineParam::SyncMode => ParamClass::SyncMode,
            LineParam::SyncBase => ParamClass::SyncBase,
            LineParam::Gate => ParamClass::Gate,
            LineParam::Length => ParamClass::Length,
            LineParam::MidiPort => ParamClass::MidiPort,
            LineParam::MidiCc => ParamClass::MidiCc,
            LineParam::Velocity => ParamClass::Velocity,
            LineParam::Add => ParamClass::Add,
            LineParam::Note => ParamClass::Note,
        }
    }

    /// Whether the parameter may be driven by another line's output
    pub fn can_connect(self) -> bool {
        matches!(
            self,
            LineParam::PlayMode
                | LineParam::Gate
                | LineParam::Length
                | LineParam::MidiPort
                | LineParam::Velocity
                | LineParam::Add
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Side effects of a line parameter edit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineChange {
    pub changed: bool,
    /// Mode changed; steps, step modes and output were re-initialised
    pub mode_changed: bool,
    /// The opposite end of the first/last step range was moved
    pub first_last_changed: bool,
}

/// Result of a step advance, committed by `Line::commit_step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepAdvance {
    pub step: usize,
    pub direction: i32,
    pub output: i32,
}

/// MIDI action for a freshly started step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTrigger {
    Note {
        device: u8,
        channel: u8,
        note: u8,
        velocity: u8,
    },
    Control {
        device: u8,
        channel: u8,
        cc: u8,
        value: u8,
    },
    Silent,
}

/// One sequencer track
#[derive(Debug, Clone)]
pub struct Line {
    index: usize,
    params: [Parameter; NUM_NAMED_PARAMS],
    step_values: [Parameter; NUM_STEPS],
    step_modes: [Parameter; NUM_STEPS],
    output: Parameter,
    active: [Option<LineParam>; NUM_LINE_PARAMS],

    pulses: i32,
    current_step: i32,
    previous_step: i32,
    direction: i32,
    held_note: Option<NoteHandle>,
}

impl Line {
    pub fn new(index: usize) -> Self {
        let params = LineParam::ALL.map(|p| {
            if p.can_connect() {
                Parameter::connectable(p.class())
            } else {
                Parameter::new(p.class())
            }
        });

        let mut line = Self {
            index,
            params,
            step_values: std::array::from_fn(|_| Parameter::new(ParamClass::None)),
            step_modes: std::array::from_fn(|_| Parameter::new(ParamClass::StepMode)),
            output: Parameter::new(ParamClass::None),
            active: [None; NUM_LINE_PARAMS],
            pulses: 0,
            current_step: -1,
            previous_step: -1,
            direction: 1,
            held_note: None,
        };
        line.apply_mode();
        line
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn param(&self, param: LineParam) -> &Parameter {
        &self.params[param.index()]
    }

    pub fn mode(&self) -> LineMode {
        LineMode::from_value(self.param(LineParam::Mode).resolved_value())
    }

    pub fn step_value(&self, step: usize) -> Option<&Parameter> {
        self.step_values.get(step)
    }

    pub fn step_mode(&self, step: usize) -> Option<&Parameter> {
        self.step_modes.get(step)
    }

    /// Output value committed on the last step start
    pub fn output(&self) -> &Parameter {
        &self.output
    }

    /// Parameter shown in an active slot for the current mode
    pub fn active_param(&self, slot: usize) -> Option<LineParam> {
        self.active.get(slot).copied().flatten()
    }

    pub fn active_params(&self) -> &[Option<LineParam>; NUM_LINE_PARAMS] {
        &self.active
    }

    pub fn pulses(&self) -> i32 {
        self.pulses
    }

    /// Current step, -1 before the first advance
    pub fn current_step(&self) -> i32 {
        self.current_step
    }

    pub fn previous_step(&self) -> i32 {
        self.previous_step
    }

    pub fn direction(&self) -> i32 {
        self.direction
    }

    pub fn held_note(&self) -> Option<NoteHandle> {
        self.held_note
    }

    /// Edit a named parameter and run its cascades
    pub fn edit(&mut self, param: LineParam, edit: ParamEdit) -> LineChange {
        let changed = edit.apply(&mut self.params[param.index()]);
        self.after_change(param, changed)
    }

    pub fn set(&mut self, param: LineParam, value: i32) -> LineChange {
        self.edit(param, ParamEdit::Set(value))
    }

    pub fn edit_step_value(&mut self, step: usize, edit: ParamEdit) -> bool {
        self.step_values
            .get_mut(step)
            .is_some_and(|p| edit.apply(p))
    }

    pub fn edit_step_mode(&mut self, step: usize, edit: ParamEdit) -> bool {
        self.step_modes
            .get_mut(step)
            .is_some_and(|p| edit.apply(p))
    }

    fn after_change(&mut self, param: LineParam, changed: bool) -> LineChange {
        let mut change = LineChange {
            changed,
            ..LineChange::default()
        };
        if !changed {
            return change;
        }

        match param {
            LineParam::Mode => {
                self.apply_mode();
                change.mode_changed = true;
            }
            LineParam::FirstStep => {
                let first = self.param(LineParam::FirstStep).get();
                if first > self.param(LineParam::LastStep).get() {
                    self.params[LineParam::LastStep.index()].set(first);
                    change.first_last_changed = true;
                }
            }
            LineParam::LastStep => {
                let last = self.param(LineParam::LastStep).get();
                if last < self.param(LineParam::FirstStep).get() {
                    self.params[LineParam::FirstStep.index()].set(last);
                    change.first_last_changed = true;
                }
            }
            _ => {}
        }
        change
    }

    /// Rebuild the active slot list and step tables for the current mode
    fn apply_mode(&mut self) {
        let mode = self.mode();

        let step_class = mode.step_class();
        for p in &mut self.step_values {
            p.reinit(step_class);
        }
        for p in &mut self.step_modes {
            p.reinit(ParamClass::StepMode);
        }
        self.output.reinit(mode.output_class());

        self.active = mode.active_layout();
    }

    /// Stop the held note and rewind transport state
    pub fn reset(&mut self, output: &mut dyn NoteOutput, timestamp: u64) {
        if let Some(handle) = self.held_note.take() {
            output.stop_note(handle, timestamp);
        }
        self.pulses = 0;
        self.current_step = -1;
        self.previous_step = -1;
        self.direction = 1;
    }

    /// Commit a step advance: move the cursor and latch the output value
    pub fn commit_step(&mut self, advance: StepAdvance) {
        self.previous_step = self.current_step;
        self.current_step = advance.step as i32;
        self.direction = advance.direction;
        self.output.set(advance.output);
        self.pulses = 1;
    }

    /// Pulse that did not start a step
    pub fn hold(&mut self, length: i32, output: &mut dyn NoteOutput, timestamp: u64) {
        self.pulses += 1;
        if self.pulses >= length {
            self.trigger_stop(output, timestamp);
        }
    }

    /// Gate elapsed but every candidate step is skipped
    pub fn idle_step(&mut self) {
        self.pulses = 1;
    }

    /// Emit the MIDI action of a freshly committed step
    pub fn trigger_start(&mut self, trigger: StepTrigger, output: &mut dyn NoteOutput, timestamp: u64) {
        match trigger {
            StepTrigger::Note {
                device,
                channel,
                note,
                velocity,
            } => {
                let new_note = output.play_note(device, channel, note, velocity, timestamp);
                if let Some(old) = self.held_note.take() {
                    output.stop_note(old, timestamp + 1);
                }
                self.held_note = new_note;
            }
            StepTrigger::Control {
                device,
                channel,
                cc,
                value,
            } => {
                output.set_control_change(device, channel, cc, value, timestamp);
            }
            StepTrigger::Silent => {}
        }
    }

    /// End the sounding note before the next step
    pub fn trigger_stop(&mut self, output: &mut dyn NoteOutput, timestamp: u64) {
        if let Some(handle) = self.held_note.take() {
            output.stop_note(handle, timestamp + 1);
        }
    }

    /// Load persisted parameters and step tables, running cascades
    pub fn load<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        for param in LineParam::PERSISTED {
            self.params[param.index()].load(reader)?;
            self.after_change(param, true);
        }
        for p in &mut self.step_values {
            p.load(reader)?;
        }
        for p in &mut self.step_modes {
            p.load(reader)?;
        }
        Ok(())
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for param in LineParam::PERSISTED {
            self.param(param).save(writer)?;
        }
        for p in &self.step_values {
            p.save(writer)?;
        }
        for p in &self.step_modes {
            p.save(writer)?;
        }
        Ok(())
    }
}
