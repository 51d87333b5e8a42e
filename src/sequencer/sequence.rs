// Sequence - A group of lines that can modulate each other

use std::io::{Read, Write};
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::midi::output::NoteOutput;
use crate::param::ConnectionRules;

use super::NUM_LINES;
use super::line::{Line, LineParam};
use super::resolve::{PulsePlan, Resolver};

#[derive(Debug, Clone)]
pub struct Sequence {
    index: usize,
    lines: [Line; NUM_LINES],
    rules: Arc<ConnectionRules>,
}

impl Sequence {
    pub fn new(index: usize, rules: Arc<ConnectionRules>) -> Self {
        Self {
            index,
            lines: std::array::from_fn(Line::new),
            rules,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    pub fn line_mut(&mut self, index: usize) -> Option<&mut Line> {
        self.lines.get_mut(index)
    }

    pub fn lines(&self) -> &[Line; NUM_LINES] {
        &self.lines
    }

    pub(crate) fn set_rules(&mut self, rules: Arc<ConnectionRules>) {
        self.rules = rules;
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.lines, &self.rules)
    }

    /// Effective value of a line parameter, connections included
    pub fn resolve(&self, line: usize, param: LineParam) -> Option<i32> {
        let line = self.lines.get(line)?;
        Some(self.resolver().resolve_line_param(line, param))
    }

    /// Process one pulse on every line, in index order
    pub fn pulse(&mut self, timestamp: u64, rng: &mut StdRng, output: &mut dyn NoteOutput) {
        for index in 0..NUM_LINES {
            self.pulse_line(index, timestamp, rng, output);
        }
    }

    fn pulse_line(
        &mut self,
        index: usize,
        timestamp: u64,
        rng: &mut StdRng,
        output: &mut dyn NoteOutput,
    ) {
        let plan = self.resolver().plan_pulse(&self.lines[index], rng);

        match plan {
            PulsePlan::Advance(advance) => {
                self.lines[index].commit_step(advance);
                let trigger = self.resolver().trigger(&self.lines[index]);
                self.lines[index].trigger_start(trigger, output, timestamp);
            }
            PulsePlan::Blocked => self.lines[index].idle_step(),
            PulsePlan::Hold { length } => self.lines[index].hold(length, output, timestamp),
        }
    }

    /// Rewind all lines and stop held notes
    pub fn reset(&mut self, output: &mut dyn NoteOutput, timestamp: u64) {
        for line in &mut self.lines {
            line.reset(output, timestamp);
        }
    }

    pub fn load<R: Read>(&mut self, reader: &mut R) -> std::io::Result<()> {
        for line in &mut self.lines {
            line.load(reader)?;
        }
        Ok(())
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for line in &self.lines {
            line.save(writer)?;
        }
        Ok(())
    }
}
