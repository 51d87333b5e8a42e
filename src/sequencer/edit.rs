// Parameter edits - Addressing and edit operations applied by the sequencer thread

use crate::param::Parameter;

use super::line::LineParam;

/// Location of an editable parameter inside a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamAddress {
    /// Pattern tempo
    Tempo,
    /// A named line parameter
    Line {
        sequence: usize,
        line: usize,
        param: LineParam,
    },
    /// Active parameter slot of a line (depends on the line mode)
    ActiveSlot {
        sequence: usize,
        line: usize,
        slot: usize,
    },
    StepValue {
        sequence: usize,
        line: usize,
        step: usize,
    },
    StepMode {
        sequence: usize,
        line: usize,
        step: usize,
    },
    /// Global parameter slot (slot 7 is the tempo)
    GlobalSlot(usize),
}

/// Edit operation on a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEdit {
    Set(i32),
    /// Absolute controller value 0-127
    Controller(u8),
    /// Relative controller delta, 7-bit two's complement
    RelativeController(u8),
    Increment,
    Decrement,
}

impl ParamEdit {
    /// Apply to a parameter, returning whether its value changed
    pub fn apply(self, param: &mut Parameter) -> bool {
        match self {
            ParamEdit::Set(value) => param.set(value),
            ParamEdit::Controller(cc) => param.set_from_controller(cc),
            ParamEdit::RelativeController(delta) => param.set_from_relative_controller(delta),
            ParamEdit::Increment => param.increment(),
            ParamEdit::Decrement => param.decrement(),
        }
    }
}
