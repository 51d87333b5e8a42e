// Parameter classes - Static value semantics shared by every parameter
// Range, default, controller sensitivity, enum tables and display rules

use crate::sequencer::NUM_STEPS;

/// Parameter class identifiers
///
/// The set is closed: every parameter in the engine belongs to exactly one
/// of these classes and the class never fails to resolve to a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamClass {
    None,
    LineMode,
    PlayMode,
    FirstStep,
    LastStep,
    Gate,
    Length,
    Note,
    NoteOffset,
    StepMode,
    SyncMode,
    SyncBase,
    MidiPort,
    MidiCc,
    Velocity,
    Add,
    Bpm,
}

/// Number of parameter classes
pub const NUM_PARAM_CLASSES: usize = 17;

/// How the stored integer is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Stored value is the value
    Int,
    /// Stored value is an index into the class's enum table
    Enum,
}

/// Display rule applied to a stored (unconnected) value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    None,
    Int,
    IntPlusOne,
    Enum,
    Note,
    NoteOffset,
    MidiPort,
}

/// One entry of an enum lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumEntry {
    pub label: &'static str,
    pub value: i32,
}

const fn entry(label: &'static str, value: i32) -> EnumEntry {
    EnumEntry { label, value }
}

/// Immutable definition of a parameter class
#[derive(Debug, Clone, Copy)]
pub struct ParamClassDef {
    pub class: ParamClass,
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: i32,
    pub min: i32,
    pub max: i32,
    /// Relative controller units per value step
    pub cc_sensitivity: i32,
    pub enum_table: Option<&'static [EnumEntry]>,
    pub display: DisplayFormat,
}

// Enum tables. Indices are what gets stored, `value` is what the engine uses.

static LINE_MODE_TABLE: [EnumEntry; 9] = [
    entry("Off", 0),
    entry("Note", 1),
    entry("Velocity", 2),
    entry("Gate", 3),
    entry("Length", 4),
    entry("MIDI", 5),
    entry("Add", 6),
    entry("Control", 7),
    entry("Play Mode", 8),
];

/// Gate, length and sync base share one musical scale, in pulses at 24 ppq
static GATE_TABLE: [EnumEntry; 10] = [
    entry("1/32", 3),
    entry("1/16", 6),
    entry("1/8", 12),
    entry("1/4", 24),
    entry("1/2", 48),
    entry("1/1", 96),
    entry("2/1", 192),
    entry("4/1", 384),
    entry("8/1", 768),
    entry("16/1", 1536),
];

static PLAY_MODE_TABLE: [EnumEntry; 5] = [
    entry(">>>", 0),
    entry("<<<", 1),
    entry("<->", 2),
    entry("<=>", 3),
    entry("???", 4),
];

static STEP_MODE_TABLE: [EnumEntry; 3] = [entry("On", 0), entry("Off", 1), entry("Skip", 2)];

static SYNC_MODE_TABLE: [EnumEntry; 2] = [entry("Auto", 0), entry("Manual", 1)];

const NOTE_NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

const fn int_class(
    class: ParamClass,
    name: &'static str,
    default: i32,
    min: i32,
    max: i32,
    cc_sensitivity: i32,
    display: DisplayFormat,
) -> ParamClassDef {
    ParamClassDef {
        class,
        name,
        kind: ParamKind::Int,
        default,
        min,
        max,
        cc_sensitivity,
        enum_table: None,
        display,
    }
}

const fn enum_class(
    class: ParamClass,
    name: &'static str,
    table: &'static [EnumEntry],
    cc_sensitivity: i32,
) -> ParamClassDef {
    ParamClassDef {
        class,
        name,
        kind: ParamKind::Enum,
        default: 0,
        min: 0,
        max: table.len() as i32 - 1,
        cc_sensitivity,
        enum_table: Some(table),
        display: DisplayFormat::Enum,
    }
}

static CLASS_DEFS: [ParamClassDef; NUM_PARAM_CLASSES] = [
    int_class(ParamClass::None, "", 0, 0, 1, 5, DisplayFormat::None),
    enum_class(ParamClass::LineMode, "Mode", &LINE_MODE_TABLE, 5),
    enum_class(ParamClass::PlayMode, "Play Mode", &PLAY_MODE_TABLE, 5),
    int_class(
        ParamClass::FirstStep,
        "First Step",
        0,
        0,
        NUM_STEPS as i32 - 1,
        5,
        DisplayFormat::IntPlusOne,
    ),
    int_class(
        ParamClass::LastStep,
        "Last Step",
        NUM_STEPS as i32 - 1,
        0,
        NUM_STEPS as i32 - 1,
        5,
        DisplayFormat::IntPlusOne,
    ),
    enum_class(ParamClass::Gate, "Gate", &GATE_TABLE, 5),
    enum_class(ParamClass::Length, "Length", &GATE_TABLE, 5),
    int_class(ParamClass::Note, "Note", 60, 0, 127, 5, DisplayFormat::Note),
    int_class(
        ParamClass::NoteOffset,
        "Note Offset",
        0,
        -12,
        12,
        5,
        DisplayFormat::NoteOffset,
    ),
    enum_class(ParamClass::StepMode, "Step Mode", &STEP_MODE_TABLE, 1),
    enum_class(ParamClass::SyncMode, "Sync Mode", &SYNC_MODE_TABLE, 5),
    enum_class(ParamClass::SyncBase, "Sync Base", &GATE_TABLE, 5),
    int_class(ParamClass::MidiPort, "MIDI Port", 0, 0, 31, 5, DisplayFormat::MidiPort),
    int_class(ParamClass::MidiCc, "Controller", 0, 0, 127, 5, DisplayFormat::Int),
    int_class(ParamClass::Velocity, "Velocity", 0, 0, 127, 1, DisplayFormat::Int),
    int_class(ParamClass::Add, "Add", 0, -64, 63, 1, DisplayFormat::Int),
    int_class(ParamClass::Bpm, "BPM", 130, 30, 250, 1, DisplayFormat::Int),
];

impl ParamClass {
    /// All classes, in identifier order
    pub const ALL: [ParamClass; NUM_PARAM_CLASSES] = [
        ParamClass::None,
        ParamClass::LineMode,
        ParamClass::PlayMode,
        ParamClass::FirstStep,
        ParamClass::LastStep,
        ParamClass::Gate,
        ParamClass::Length,
        ParamClass::Note,
        ParamClass::NoteOffset,
        ParamClass::StepMode,
        ParamClass::SyncMode,
        ParamClass::SyncBase,
        ParamClass::MidiPort,
        ParamClass::MidiCc,
        ParamClass::Velocity,
        ParamClass::Add,
        ParamClass::Bpm,
    ];

    /// Get the static definition of this class
    pub fn def(self) -> &'static ParamClassDef {
        &CLASS_DEFS[self as usize]
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl ParamClassDef {
    /// Look up the semantic value behind a stored enum index
    ///
    /// Int classes return the stored value unchanged. An index outside the
    /// table falls back to the first entry.
    pub fn enum_value(&self, index: i32) -> i32 {
        match self.enum_table {
            Some(table) => usize::try_from(index)
                .ok()
                .and_then(|i| table.get(i))
                .or_else(|| table.first())
                .map(|e| e.value)
                .unwrap_or(0),
            None => index,
        }
    }

    /// Resolved default value (enum lookup applied)
    pub fn default_value(&self) -> i32 {
        self.enum_value(self.default)
    }

    /// Format a stored, in-range value for display
    pub fn format_value(&self, value: i32) -> String {
        match self.display {
            DisplayFormat::None => "-".to_string(),
            DisplayFormat::Int => value.to_string(),
            DisplayFormat::IntPlusOne => (value + 1).to_string(),
            DisplayFormat::Enum => self
                .enum_table
                .and_then(|table| usize::try_from(value).ok().and_then(|i| table.get(i)))
                .map(|e| e.label.to_string())
                .unwrap_or_else(|| "-".to_string()),
            DisplayFormat::Note => {
                if (0..=119).contains(&value) {
                    format!("{}{}", NOTE_NAMES[(value % 12) as usize], value / 12)
                } else {
                    "-".to_string()
                }
            }
            DisplayFormat::NoteOffset => match value {
                0 => " 0".to_string(),
                v if v > 0 => format!("+{}", v),
                v => v.to_string(),
            },
            DisplayFormat::MidiPort => {
                let bank = if value / 16 < 1 { "A" } else { "B" };
                format!("{}-{}", bank, value % 16 + 1)
            }
        }
    }
}

/// Table of valid connections
///
/// A pair `(source, target)` means a parameter of class `source` may be
/// driven by a line output of class `target`. Built once at startup and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct ConnectionRules {
    table: [[bool; NUM_PARAM_CLASSES]; NUM_PARAM_CLASSES],
}

impl ConnectionRules {
    /// Create an empty rule table (nothing connects)
    pub fn empty() -> Self {
        Self {
            table: [[false; NUM_PARAM_CLASSES]; NUM_PARAM_CLASSES],
        }
    }

    /// Rule table used by the sequencer
    pub fn standard() -> Self {
        let mut rules = Self::empty();
        rules.register(ParamClass::Gate, ParamClass::Gate);
        rules.register(ParamClass::Length, ParamClass::Gate);
        rules.register(ParamClass::PlayMode, ParamClass::PlayMode);
        rules.register(ParamClass::MidiPort, ParamClass::MidiPort);
        rules.register(ParamClass::MidiCc, ParamClass::MidiCc);
        rules.register(ParamClass::Velocity, ParamClass::Velocity);
        rules.register(ParamClass::Add, ParamClass::Add);
        rules
    }

    /// Allow `source` parameters to be driven by `target` outputs
    pub fn register(&mut self, source: ParamClass, target: ParamClass) {
        self.table[source.index()][target.index()] = true;
    }

    /// Check whether `source` may be driven by `target`
    pub fn is_valid(&self, source: ParamClass, target: ParamClass) -> bool {
        self.table[source.index()][target.index()]
    }
}

impl Default for ConnectionRules {
    fn default() -> Self {
        Self::standard()
    }
}
