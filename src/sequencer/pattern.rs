// Pattern - Root of the sequencing state
// Owns the sequences, the tempo and the random source used by random play mode

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::messaging::event::SequencerEvent;
use crate::midi::output::NoteOutput;
use crate::param::{ConnectionRules, ParamClass, Parameter};

use super::edit::{ParamAddress, ParamEdit};
use super::line::LineParam;
use super::sequence::Sequence;
use super::{NUM_GLOBAL_PARAMS, NUM_SEQUENCES};

/// Global slot holding the tempo
pub const TEMPO_SLOT: usize = 7;

#[derive(Debug, Clone)]
pub struct Pattern {
    tempo: Parameter,
    sequences: [Sequence; NUM_SEQUENCES],
    rules: Arc<ConnectionRules>,
    rng: StdRng,
}

impl Pattern {
    pub fn new(rules: Arc<ConnectionRules>) -> Self {
        Self::with_rng(rules, StdRng::from_entropy())
    }

    /// Pattern with a reproducible random play mode
    pub fn with_seed(rules: Arc<ConnectionRules>, seed: u64) -> Self {
        Self::with_rng(rules, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rules: Arc<ConnectionRules>, rng: StdRng) -> Self {
        Self {
            tempo: Parameter::new(ParamClass::Bpm),
            sequences: std::array::from_fn(|i| Sequence::new(i, Arc::clone(&rules))),
            rules,
            rng,
        }
    }

    pub fn rules(&self) -> &Arc<ConnectionRules> {
        &self.rules
    }

    /// Tempo in beats per minute
    pub fn tempo(&self) -> u32 {
        self.tempo.resolved_value().max(1) as u32
    }

    pub fn tempo_param(&self) -> &Parameter {
        &self.tempo
    }

    pub(crate) fn tempo_param_mut(&mut self) -> &mut Parameter {
        &mut self.tempo
    }

    pub fn sequence(&self, index: usize) -> Option<&Sequence> {
        self.sequences.get(index)
    }

    pub fn sequence_mut(&mut self, index: usize) -> Option<&mut Sequence> {
        self.sequences.get_mut(index)
    }

    pub fn sequences(&self) -> &[Sequence; NUM_SEQUENCES] {
        &self.sequences
    }

    pub(crate) fn sequences_mut(&mut self) -> &mut [Sequence; NUM_SEQUENCES] {
        &mut self.sequences
    }

    /// Process one clock pulse on every sequence
    pub fn pulse(&mut self, _pulse: i64, timestamp: u64, output: &mut dyn NoteOutput) {
        for sequence in &mut self.sequences {
            sequence.pulse(timestamp, &mut self.rng, output);
        }
    }

    /// Rewind every line and stop held notes
    pub fn reset(&mut self, output: &mut dyn NoteOutput, timestamp: u64) {
        for sequence in &mut self.sequences {
            sequence.reset(output, timestamp);
        }
    }

    /// Replace tempo and sequences with those of `other`
    ///
    /// The random source is kept. Held notes of the current content are
    /// not stopped; call `reset` first.
    pub fn adopt(&mut self, other: Pattern) {
        self.tempo = other.tempo;
        self.sequences = other.sequences;
        for sequence in &mut self.sequences {
            sequence.set_rules(Arc::clone(&self.rules));
        }
    }

    /// Map slot addresses to the parameter they currently point at
    pub fn canonical_address(&self, address: ParamAddress) -> Option<ParamAddress> {
        match address {
            ParamAddress::GlobalSlot(TEMPO_SLOT) => Some(ParamAddress::Tempo),
            ParamAddress::GlobalSlot(_) => None,
            ParamAddress::ActiveSlot { sequence, line, slot } => {
                let param = self.sequence(sequence)?.line(line)?.active_param(slot)?;
                Some(ParamAddress::Line { sequence, line, param })
            }
            other => Some(other),
        }
    }

    /// Parameter behind an address, if any
    pub fn param(&self, address: ParamAddress) -> Option<&Parameter> {
        match self.canonical_address(address)? {
            ParamAddress::Tempo => Some(&self.tempo),
            ParamAddress::Line { sequence, line, param } => {
                Some(self.sequence(sequence)?.line(line)?.param(param))
            }
            ParamAddress::StepValue { sequence, line, step } => {
                self.sequence(sequence)?.line(line)?.step_value(step)
            }
            ParamAddress::StepMode { sequence, line, step } => {
                self.sequence(sequence)?.line(line)?.step_mode(step)
            }
            ParamAddress::ActiveSlot { .. } | ParamAddress::GlobalSlot(_) => None,
        }
    }

    /// Parameter shown in a global slot
    pub fn global_param(&self, slot: usize) -> Option<&Parameter> {
        if slot >= NUM_GLOBAL_PARAMS {
            return None;
        }
        self.param(ParamAddress::GlobalSlot(slot))
    }

    /// Apply an edit and report what changed
    ///
    /// Addresses that point nowhere (empty slots, out of range indices) are
    /// ignored.
    pub fn edit(&mut self, address: ParamAddress, edit: ParamEdit) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        let Some(address) = self.canonical_address(address) else {
            log::debug!("Ignoring edit of empty slot {:?}", address);
            return events;
        };

        match address {
            ParamAddress::Tempo => {
                if edit.apply(&mut self.tempo) {
                    events.push(SequencerEvent::param_changed(address, &self.tempo));
                    events.push(SequencerEvent::TempoChanged(self.tempo()));
                }
            }
            ParamAddress::Line { sequence, line, param } => {
                let Some(target) = self.line_mut(sequence, line) else {
                    log::debug!("Ignoring edit of unknown line {:?}", address);
                    return events;
                };
                let change = target.edit(param, edit);
                if !change.changed {
                    return events;
                }
                events.push(SequencerEvent::param_changed(address, target.param(param)));
                if change.mode_changed {
                    events.push(SequencerEvent::LineModeChanged { sequence, line });
                }
                if change.first_last_changed {
                    let other = if param == LineParam::FirstStep {
                        LineParam::LastStep
                    } else {
                        LineParam::FirstStep
                    };
                    events.push(SequencerEvent::param_changed(
                        ParamAddress::Line { sequence, line, param: other },
                        target.param(other),
                    ));
                    events.push(SequencerEvent::FirstLastChanged { sequence, line });
                }
            }
            ParamAddress::StepValue { sequence, line, step } => {
                if let Some(target) = self.line_mut(sequence, line) {
                    if target.edit_step_value(step, edit) {
                        if let Some(param) = target.step_value(step) {
                            events.push(SequencerEvent::param_changed(address, param));
                        }
                    }
                }
            }
            ParamAddress::StepMode { sequence, line, step } => {
                if let Some(target) = self.line_mut(sequence, line) {
                    if target.edit_step_mode(step, edit) {
                        if let Some(param) = target.step_mode(step) {
                            events.push(SequencerEvent::param_changed(address, param));
                        }
                    }
                }
            }
            ParamAddress::ActiveSlot { .. } | ParamAddress::GlobalSlot(_) => {}
        }
        events
    }

    fn line_mut(&mut self, sequence: usize, line: usize) -> Option<&mut super::line::Line> {
        self.sequences.get_mut(sequence)?.line_mut(line)
    }
}
