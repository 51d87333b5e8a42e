// Control surface - Maps controller CCs to sequencer commands and LED feedback
// Keeps a mirror of the pattern so feedback never has to ask the sequencer thread

use crate::messaging::command::Command;
use crate::messaging::event::SequencerEvent;
use crate::midi::input::ControlMessage;
use crate::sequencer::edit::{ParamAddress, ParamEdit};
use crate::sequencer::line::Line;
use crate::sequencer::pattern::Pattern;
use crate::sequencer::{NUM_GLOBAL_PARAMS, NUM_LINE_PARAMS, NUM_LINES, NUM_SEQUENCES, NUM_STEPS};

pub const CC_STEP_VALUE_FIRST: u8 = 1;
pub const CC_STEP_MODE_FIRST: u8 = 33;
pub const CC_LINE_FIRST: u8 = 65;
pub const CC_SEQUENCE_FIRST: u8 = 73;
pub const CC_BUTTON_F1: u8 = 77;
pub const CC_BUTTON_F2: u8 = 78;
pub const CC_BUTTON_F3: u8 = 79;
pub const CC_BUTTON_F4: u8 = 80;
pub const CC_LINE_PARAM_FIRST: u8 = 81;
pub const CC_GLOBAL_PARAM_FIRST: u8 = 97;
pub const CC_BUTTON_PLAY: u8 = 105;
pub const CC_BUTTON_STOP: u8 = 106;
pub const CC_BUTTON_PREV: u8 = 107;
pub const CC_BUTTON_NEXT: u8 = 108;

/// Control updates the play LED stays lit after a beat
const BEAT_BLINK_TICKS: u32 = 10;

const BUTTON_PRESSED: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    F1,
    F2,
    F3,
    F4,
    Play,
    Stop,
    Prev,
    Next,
}

impl Button {
    fn from_cc(cc: u8) -> Option<Self> {
        match cc {
            CC_BUTTON_F1 => Some(Button::F1),
            CC_BUTTON_F2 => Some(Button::F2),
            CC_BUTTON_F3 => Some(Button::F3),
            CC_BUTTON_F4 => Some(Button::F4),
            CC_BUTTON_PLAY => Some(Button::Play),
            CC_BUTTON_STOP => Some(Button::Stop),
            CC_BUTTON_PREV => Some(Button::Prev),
            CC_BUTTON_NEXT => Some(Button::Next),
            _ => None,
        }
    }
}

/// What the control thread has to do in response to the surface
#[derive(Debug)]
pub enum ControlAction {
    /// Forward to the sequencer thread
    Send(Command),
    /// Forward an edit; once the sequencer accepts it, pass it to
    /// [`ControlSurface::apply`] so the mirror follows
    Edit { address: ParamAddress, edit: ParamEdit },
    /// Set a controller LED / encoder ring
    Feedback { cc: u8, value: u8 },
    SavePattern,
    LoadPattern,
    Quit,
}

/// Decoded controller input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    StepValue(usize),
    StepMode(usize),
    SelectLine(usize),
    SelectSequence(usize),
    LineParam(usize),
    GlobalParam(usize),
    Button(Button),
}

impl Control {
    fn from_cc(cc: u8) -> Option<Self> {
        let offset = |first: u8, count: usize| {
            let index = cc.checked_sub(first)? as usize;
            (index < count).then_some(index)
        };

        if let Some(i) = offset(CC_STEP_VALUE_FIRST, NUM_STEPS) {
            Some(Control::StepValue(i))
        } else if let Some(i) = offset(CC_STEP_MODE_FIRST, NUM_STEPS) {
            Some(Control::StepMode(i))
        } else if let Some(i) = offset(CC_LINE_FIRST, NUM_LINES) {
            Some(Control::SelectLine(i))
        } else if let Some(i) = offset(CC_SEQUENCE_FIRST, NUM_SEQUENCES) {
            Some(Control::SelectSequence(i))
        } else if let Some(i) = offset(CC_LINE_PARAM_FIRST, NUM_LINE_PARAMS) {
            Some(Control::LineParam(i))
        } else if let Some(i) = offset(CC_GLOBAL_PARAM_FIRST, NUM_GLOBAL_PARAMS) {
            Some(Control::GlobalParam(i))
        } else {
            Button::from_cc(cc).map(Control::Button)
        }
    }
}

/// Control surface state: selection, pattern mirror and beat blink
///
/// Edits are forwarded unchanged to the sequencer thread and applied to the
/// mirror only once the command queue accepted them. Edits are deterministic,
/// so both copies stay equal.
pub struct ControlSurface {
    mirror: Pattern,
    sequence: usize,
    line: usize,
    blink: u32,
}

impl ControlSurface {
    pub fn new(pattern: Pattern) -> Self {
        Self {
            mirror: pattern,
            sequence: 0,
            line: 0,
            blink: 0,
        }
    }

    pub fn selected_sequence(&self) -> usize {
        self.sequence
    }

    pub fn selected_line(&self) -> usize {
        self.line
    }

    pub fn pattern(&self) -> &Pattern {
        &self.mirror
    }

    /// Full LED state for the current selection
    pub fn refresh(&self) -> Vec<ControlAction> {
        let mut actions = Vec::new();
        self.show_selected_sequence(&mut actions);
        self.show_selected_line(&mut actions);
        self.show_line_steps(&mut actions);
        self.show_line_params(&mut actions);
        self.show_global_params(&mut actions);
        actions
    }

    /// Replace the mirror after a pattern load
    pub fn load(&mut self, pattern: Pattern) -> Vec<ControlAction> {
        self.mirror.adopt(pattern);
        self.refresh()
    }

    /// Translate one controller message
    pub fn handle(&mut self, message: ControlMessage) -> Vec<ControlAction> {
        let mut actions = Vec::new();
        let Some(control) = Control::from_cc(message.controller) else {
            log::debug!("Unmapped controller {}", message.controller);
            return actions;
        };

        let (sequence, line) = (self.sequence, self.line);
        match control {
            Control::StepValue(step) => self.edit(
                ParamAddress::StepValue { sequence, line, step },
                ParamEdit::RelativeController(message.value),
                &mut actions,
            ),
            Control::StepMode(step) => self.edit(
                ParamAddress::StepMode { sequence, line, step },
                ParamEdit::Increment,
                &mut actions,
            ),
            Control::SelectLine(index) => self.select_line(index, &mut actions),
            Control::SelectSequence(index) => {
                self.sequence = index;
                self.show_selected_sequence(&mut actions);
                self.select_line(0, &mut actions);
            }
            Control::LineParam(slot) => {
                if self.selected().and_then(|l| l.active_param(slot)).is_some() {
                    self.edit(
                        ParamAddress::ActiveSlot { sequence, line, slot },
                        ParamEdit::RelativeController(message.value),
                        &mut actions,
                    );
                }
            }
            Control::GlobalParam(slot) => {
                if self.mirror.global_param(slot).is_some() {
                    self.edit(
                        ParamAddress::GlobalSlot(slot),
                        ParamEdit::RelativeController(message.value),
                        &mut actions,
                    );
                }
            }
            Control::Button(button) => {
                // Buttons are momentary; clear the LED the controller lit
                actions.push(ControlAction::Feedback {
                    cc: message.controller,
                    value: 0,
                });
                if message.value == BUTTON_PRESSED {
                    self.press(button, &mut actions);
                }
            }
        }
        actions
    }

    /// React to a sequencer event
    pub fn on_event(&mut self, event: &SequencerEvent) -> Vec<ControlAction> {
        let mut actions = Vec::new();
        if let SequencerEvent::Beat(_) = event {
            self.blink = BEAT_BLINK_TICKS;
            actions.push(ControlAction::Feedback {
                cc: CC_BUTTON_PLAY,
                value: 127,
            });
        }
        actions
    }

    /// Called once per control loop iteration
    pub fn tick(&mut self) -> Option<ControlAction> {
        if self.blink == 0 {
            return None;
        }
        self.blink -= 1;
        (self.blink == 0).then_some(ControlAction::Feedback {
            cc: CC_BUTTON_PLAY,
            value: 0,
        })
    }

    fn press(&mut self, button: Button, actions: &mut Vec<ControlAction>) {
        log::info!("{:?}", button);
        match button {
            Button::F1 => actions.push(ControlAction::SavePattern),
            Button::F2 => actions.push(ControlAction::LoadPattern),
            Button::F4 => actions.push(ControlAction::Quit),
            Button::Play => actions.push(ControlAction::Send(Command::Start)),
            Button::Stop => actions.push(ControlAction::Send(Command::Stop)),
            Button::F3 | Button::Prev | Button::Next => {}
        }
    }

    fn edit(&mut self, address: ParamAddress, edit: ParamEdit, actions: &mut Vec<ControlAction>) {
        // The sequencer keeps relative remainders too, so every edit is sent
        actions.push(ControlAction::Edit { address, edit });
    }

    /// Apply an edit the sequencer accepted; returns the LED feedback
    pub fn apply(&mut self, address: ParamAddress, edit: ParamEdit) -> Vec<ControlAction> {
        let mut actions = Vec::new();
        let events = self.mirror.edit(address, edit);

        for event in &events {
            match *event {
                SequencerEvent::ParamChanged {
                    address,
                    controller,
                    ..
                } => {
                    if let Some(cc) = self.feedback_cc(address) {
                        actions.push(ControlAction::Feedback {
                            cc,
                            value: controller,
                        });
                    }
                }
                SequencerEvent::LineModeChanged { sequence, line } if self.is_selected(sequence, line) => {
                    self.show_line_steps(&mut actions);
                    self.show_line_params(&mut actions);
                }
                SequencerEvent::FirstLastChanged { sequence, line } if self.is_selected(sequence, line) => {
                    self.show_line_params(&mut actions);
                }
                _ => {}
            }
        }
        actions
    }

    fn select_line(&mut self, index: usize, actions: &mut Vec<ControlAction>) {
        self.line = index;
        self.show_selected_line(actions);
        self.show_line_steps(actions);
        self.show_line_params(actions);
    }

    fn selected(&self) -> Option<&Line> {
        self.mirror.sequence(self.sequence)?.line(self.line)
    }

    fn is_selected(&self, sequence: usize, line: usize) -> bool {
        self.sequence == sequence && self.line == line
    }

    /// CC showing the parameter at `address`, when it is on the surface
    fn feedback_cc(&self, address: ParamAddress) -> Option<u8> {
        match address {
            ParamAddress::Tempo => Some(CC_GLOBAL_PARAM_FIRST + crate::sequencer::TEMPO_SLOT as u8),
            ParamAddress::StepValue { sequence, line, step } if self.is_selected(sequence, line) => {
                Some(CC_STEP_VALUE_FIRST + step as u8)
            }
            ParamAddress::Line { sequence, line, param } if self.is_selected(sequence, line) => {
                let slot = self
                    .selected()?
                    .active_params()
                    .iter()
                    .position(|p| *p == Some(param))?;
                Some(CC_LINE_PARAM_FIRST + slot as u8)
            }
            _ => None,
        }
    }

    fn show_selected_line(&self, actions: &mut Vec<ControlAction>) {
        for i in 0..NUM_LINES {
            actions.push(ControlAction::Feedback {
                cc: CC_LINE_FIRST + i as u8,
                value: if i == self.line { 127 } else { 0 },
            });
        }
    }

    fn show_selected_sequence(&self, actions: &mut Vec<ControlAction>) {
        for i in 0..NUM_SEQUENCES {
            actions.push(ControlAction::Feedback {
                cc: CC_SEQUENCE_FIRST + i as u8,
                value: if i == self.sequence { 127 } else { 0 },
            });
        }
    }

    fn show_line_steps(&self, actions: &mut Vec<ControlAction>) {
        let Some(line) = self.selected() else {
            return;
        };
        for step in 0..NUM_STEPS {
            if let Some(param) = line.step_value(step) {
                actions.push(ControlAction::Feedback {
                    cc: CC_STEP_VALUE_FIRST + step as u8,
                    value: param.controller_value(),
                });
            }
        }
    }

    fn show_line_params(&self, actions: &mut Vec<ControlAction>) {
        let Some(line) = self.selected() else {
            return;
        };
        for (slot, param) in line.active_params().iter().enumerate() {
            if let Some(param) = param {
                actions.push(ControlAction::Feedback {
                    cc: CC_LINE_PARAM_FIRST + slot as u8,
                    value: line.param(*param).controller_value(),
                });
            }
        }
    }

    fn show_global_params(&self, actions: &mut Vec<ControlAction>) {
        for slot in 0..NUM_GLOBAL_PARAMS {
            if let Some(param) = self.mirror.global_param(slot) {
                actions.push(ControlAction::Feedback {
                    cc: CC_GLOBAL_PARAM_FIRST + slot as u8,
                    value: param.controller_value(),
                });
            }
        }
    }
}
