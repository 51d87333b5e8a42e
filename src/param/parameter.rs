// Parameter - A range-checked integer value bound to a parameter class
// Values above the class maximum encode a connection to a line output

use std::io::{Read, Write};

use super::class::{ParamClass, ParamClassDef};
use crate::sequencer::{NUM_LINES, NUM_SOURCES};

/// Controller sensitivity used while a parameter is connected
const CONNECTED_CC_SENSITIVITY: i32 = 5;

/// A single sequencer parameter
///
/// Mutators return `true` when the stored value changed so that the owner
/// can run its cascades (line mode re-initialisation, first/last step
/// coupling) and report the change.
#[derive(Debug, Clone)]
pub struct Parameter {
    class: ParamClass,
    value: i32,
    can_connect: bool,
    cc_accumulator: i32,
}

impl Parameter {
    /// Create a parameter holding the class default
    pub fn new(class: ParamClass) -> Self {
        Self {
            class,
            value: class.def().default,
            can_connect: false,
            cc_accumulator: 0,
        }
    }

    /// Create a parameter that may be connected to a line output
    pub fn connectable(class: ParamClass) -> Self {
        Self {
            can_connect: true,
            ..Self::new(class)
        }
    }

    /// Re-initialise with a new class, restoring its default value
    pub fn reinit(&mut self, class: ParamClass) {
        self.class = class;
        self.value = class.def().default;
        self.cc_accumulator = 0;
    }

    pub fn class(&self) -> ParamClass {
        self.class
    }

    pub fn def(&self) -> &'static ParamClassDef {
        self.class.def()
    }

    pub fn can_connect(&self) -> bool {
        self.can_connect
    }

    pub fn min(&self) -> i32 {
        self.def().min
    }

    /// Upper bound including the connection selectors
    pub fn effective_max(&self) -> i32 {
        if self.can_connect {
            self.def().max + NUM_SOURCES as i32
        } else {
            self.def().max
        }
    }

    /// Set the stored value, clamped into range
    pub fn set(&mut self, value: i32) -> bool {
        let value = value.clamp(self.min(), self.effective_max());
        if value == self.value {
            return false;
        }
        self.value = value;
        true
    }

    /// Set from an absolute controller value (0-127) spread over the range
    pub fn set_from_controller(&mut self, cc: u8) -> bool {
        let min = self.min();
        let span = self.effective_max() - min;
        // Truncate the scaled value as a whole so negative ranges round toward zero
        let value = (min * 127 + i32::from(cc.min(127)) * span) / 127;
        self.set(value)
    }

    /// Apply a relative controller delta (7-bit two's complement)
    ///
    /// Deltas accumulate until a whole sensitivity unit is reached; the
    /// remainder is kept for the next call.
    pub fn set_from_relative_controller(&mut self, delta: u8) -> bool {
        let mut delta = i32::from(delta & 0x7f);
        if delta & 0x40 != 0 {
            delta -= 0x80;
        }

        let sensitivity = if self.is_connected() {
            CONNECTED_CC_SENSITIVITY
        } else {
            self.def().cc_sensitivity.max(1)
        };

        self.cc_accumulator += delta;
        let steps = self.cc_accumulator / sensitivity;
        if steps == 0 {
            return false;
        }
        self.cc_accumulator -= steps * sensitivity;
        self.set(self.value + steps)
    }

    /// Step up by one, wrapping to the minimum
    pub fn increment(&mut self) -> bool {
        let next = if self.value >= self.effective_max() {
            self.min()
        } else {
            self.value + 1
        };
        self.set(next)
    }

    /// Step down by one, wrapping to the effective maximum
    pub fn decrement(&mut self) -> bool {
        let next = if self.value <= self.min() {
            self.effective_max()
        } else {
            self.value - 1
        };
        self.set(next)
    }

    /// Raw stored value
    pub fn get(&self) -> i32 {
        self.value
    }

    /// Stored value with the enum table applied
    ///
    /// Connected or out-of-table enum values resolve to the first entry.
    pub fn resolved_value(&self) -> i32 {
        self.def().enum_value(self.value)
    }

    /// Class default with the enum table applied
    pub fn default_value(&self) -> i32 {
        self.def().default_value()
    }

    pub fn is_connected(&self) -> bool {
        self.value > self.def().max
    }

    /// Connection selector (0..NUM_SOURCES) when connected
    ///
    /// `selector / NUM_LINES` is the sync flag, `selector % NUM_LINES` the
    /// target line.
    pub fn connection_selector(&self) -> Option<usize> {
        if self.is_connected() {
            usize::try_from(self.value - self.def().max - 1).ok()
        } else {
            None
        }
    }

    /// Connect to a source selector; ignored when the parameter cannot connect
    pub fn connect(&mut self, selector: usize) -> bool {
        if !self.can_connect || selector >= NUM_SOURCES {
            return false;
        }
        self.set(self.def().max + 1 + selector as i32)
    }

    /// Inverse of `set_from_controller`, used for control surface feedback
    pub fn controller_value(&self) -> u8 {
        let min = self.min();
        let span = self.effective_max() - min;
        if span <= 0 {
            return 0;
        }
        ((self.value - min) * 127 / span).clamp(0, 127) as u8
    }

    /// Human readable value
    pub fn display(&self) -> String {
        match self.connection_selector() {
            Some(selector) => format!(
                "L{}{}",
                selector % NUM_LINES + 1,
                if selector >= NUM_LINES { "s" } else { "" }
            ),
            None => self.def().format_value(self.value),
        }
    }

    /// Read the raw stored value (native-endian i32), clamped into range
    pub fn load<R: Read>(&mut self, reader: &mut R) -> std::io::Result<bool> {
        let value = read_i32(reader)?;
        Ok(self.set(value))
    }

    /// Write the raw stored value as a native-endian i32
    pub fn save<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_i32(writer, self.value)
    }
}

pub(crate) fn read_i32<R: Read>(reader: &mut R) -> std::io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_ne_bytes(buf))
}

pub(crate) fn write_i32<W: Write>(writer: &mut W, value: i32) -> std::io::Result<()> {
    writer.write_all(&value.to_ne_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_new_holds_default() {
        assert_eq!(Parameter::new(ParamClass::Bpm).get(), 130);
        assert_eq!(Parameter::new(ParamClass::LastStep).get(), 31);
        assert_eq!(Parameter::new(ParamClass::Note).get(), 60);
    }

    #[test]
    fn test_set_clamps_and_reports_change() {
        let mut p = Parameter::new(ParamClass::Bpm);

        assert!(p.set(1000));
        assert_eq!(p.get(), 250);
        assert!(!p.set(250));
        assert!(p.set(-5));
        assert_eq!(p.get(), 30);
    }

    #[test]
    fn test_connectable_range_extends_by_sources() {
        let mut p = Parameter::connectable(ParamClass::Add);
        assert_eq!(p.effective_max(), 63 + 16);
        p.set(1000);
        assert_eq!(p.get(), 79);
        assert!(p.is_connected());
        assert_eq!(p.connection_selector(), Some(15));

        let mut fixed = Parameter::new(ParamClass::Add);
        fixed.set(1000);
        assert!(!fixed.is_connected());
        assert_eq!(fixed.connection_selector(), None);
    }

    #[test]
    fn test_connection_round_trip() {
        for k in 0..NUM_SOURCES {
            let mut p = Parameter::connectable(ParamClass::Gate);
            p.connect(k);
            assert_eq!(p.connection_selector(), Some(k));
            assert_eq!(p.get(), 9 + 1 + k as i32);
        }
    }

    #[test]
    fn test_connect_rejected_when_not_connectable() {
        let mut p = Parameter::new(ParamClass::Gate);
        assert!(!p.connect(3));
        assert!(!p.is_connected());
    }

    #[test]
    fn test_set_from_controller() {
        let mut p = Parameter::new(ParamClass::NoteOffset);
        p.set_from_controller(0);
        assert_eq!(p.get(), -12);
        p.set_from_controller(127);
        assert_eq!(p.get(), 12);
        p.set_from_controller(64);
        // 64 * 24 / 127 = 12.09, truncated
        assert_eq!(p.get(), 0);
    }

    #[test]
    fn test_set_from_controller_negative_range_rounds_toward_zero() {
        let mut p = Parameter::new(ParamClass::NoteOffset);
        // -12 + 1 * 24 / 127 = -11.81
        p.set_from_controller(1);
        assert_eq!(p.get(), -11);
        p.set_from_controller(6);
        assert_eq!(p.get(), -10);
        p.set_from_controller(126);
        assert_eq!(p.get(), 11);
    }

    #[test]
    fn test_relative_controller_accumulates() {
        let mut p = Parameter::new(ParamClass::Gate); // sensitivity 5

        for _ in 0..4 {
            assert!(!p.set_from_relative_controller(1));
        }
        assert_eq!(p.get(), 0);
        assert!(p.set_from_relative_controller(1));
        assert_eq!(p.get(), 1);

        // 0x7f is -1
        for _ in 0..5 {
            p.set_from_relative_controller(0x7f);
        }
        assert_eq!(p.get(), 0);
    }

    #[test]
    fn test_relative_controller_keeps_remainder() {
        let mut p = Parameter::new(ParamClass::Note);
        p.set_from_relative_controller(12);
        assert_eq!(p.get(), 62);
        p.set_from_relative_controller(3);
        assert_eq!(p.get(), 63);
    }

    #[test]
    fn test_relative_controller_uses_connected_sensitivity() {
        let mut p = Parameter::connectable(ParamClass::Velocity); // sensitivity 1
        p.connect(0);
        p.set_from_relative_controller(1);
        assert_eq!(p.connection_selector(), Some(0));
        for _ in 0..4 {
            p.set_from_relative_controller(1);
        }
        assert_eq!(p.connection_selector(), Some(1));
    }

    #[test]
    fn test_increment_decrement_wrap() {
        let mut p = Parameter::new(ParamClass::StepMode);
        p.increment();
        p.increment();
        assert_eq!(p.get(), 2);
        p.increment();
        assert_eq!(p.get(), 0);
        p.decrement();
        assert_eq!(p.get(), 2);

        let mut c = Parameter::connectable(ParamClass::PlayMode);
        c.set(c.effective_max());
        c.increment();
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn test_resolved_value_uses_enum_table() {
        let mut p = Parameter::connectable(ParamClass::Gate);
        p.set(3);
        assert_eq!(p.resolved_value(), 24);
        p.connect(2);
        assert_eq!(p.resolved_value(), 3);
        assert_eq!(p.default_value(), 3);
    }

    #[test]
    fn test_controller_value_inverse() {
        let mut p = Parameter::new(ParamClass::MidiCc);
        p.set(127);
        assert_eq!(p.controller_value(), 127);
        p.set(0);
        assert_eq!(p.controller_value(), 0);
        assert_eq!(Parameter::new(ParamClass::None).controller_value(), 0);
    }

    #[test]
    fn test_display() {
        let mut p = Parameter::connectable(ParamClass::Gate);
        assert_eq!(p.display(), "1/32");
        p.connect(2);
        assert_eq!(p.display(), "L3");
        p.connect(NUM_LINES + 7);
        assert_eq!(p.display(), "L8s");
    }

    #[test]
    fn test_load_save() {
        let mut p = Parameter::new(ParamClass::Add);
        p.set(-17);

        let mut bytes = Vec::new();
        p.save(&mut bytes).unwrap();
        assert_eq!(bytes, (-17i32).to_ne_bytes());

        let mut q = Parameter::new(ParamClass::Add);
        q.load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(q.get(), -17);
    }

    #[test]
    fn test_load_clamps_and_fails_on_short_read() {
        let mut p = Parameter::new(ParamClass::Velocity);
        p.load(&mut Cursor::new(500i32.to_ne_bytes())).unwrap();
        assert_eq!(p.get(), 127);

        assert!(p.load(&mut Cursor::new(vec![1u8, 2])).is_err());
        assert_eq!(p.get(), 127);
    }
}
