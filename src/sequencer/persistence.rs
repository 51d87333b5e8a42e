// Pattern persistence - Binary pattern file format
// Header (magic + version) followed by native-endian i32 parameter values

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::param::ConnectionRules;
use crate::param::parameter::{read_i32, write_i32};

use super::pattern::Pattern;

/// File magic
pub const PATTERN_MAGIC: &[u8; 8] = b"ssq32pat";

/// Current (and newest readable) file version
pub const PATTERN_VERSION: i32 = 0;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a pattern file (bad magic)")]
    InvalidMagic,

    #[error("Pattern file version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i32, supported: i32 },
}

impl Pattern {
    /// Parse a complete pattern from `reader`
    ///
    /// The result is a fresh pattern; nothing existing is touched, so a
    /// failed read leaves the caller's state unchanged.
    pub fn read_from<R: Read>(
        reader: &mut R,
        rules: Arc<ConnectionRules>,
    ) -> Result<Pattern, PatternError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != PATTERN_MAGIC {
            return Err(PatternError::InvalidMagic);
        }

        let version = read_i32(reader)?;
        if version > PATTERN_VERSION {
            return Err(PatternError::UnsupportedVersion {
                found: version,
                supported: PATTERN_VERSION,
            });
        }

        // The random source is dropped on adopt; a fixed seed avoids drawing entropy
        let mut pattern = Pattern::with_seed(rules, 0);
        pattern.tempo_param_mut().load(reader)?;
        for sequence in pattern.sequences_mut() {
            sequence.load(reader)?;
        }
        Ok(pattern)
    }

    /// Load from `reader` in place; on error the pattern is unchanged
    pub fn load<R: Read>(&mut self, reader: &mut R) -> Result<(), PatternError> {
        let loaded = Pattern::read_from(reader, Arc::clone(self.rules()))?;
        self.adopt(loaded);
        Ok(())
    }

    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), PatternError> {
        writer.write_all(PATTERN_MAGIC)?;
        write_i32(writer, PATTERN_VERSION)?;
        self.tempo_param().save(writer)?;
        for sequence in self.sequences() {
            sequence.save(writer)?;
        }
        Ok(())
    }

    /// Serialize into an in-memory image
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // Writing to a Vec cannot fail
        let _ = self.save(&mut bytes);
        bytes
    }

    pub fn read_file<P: AsRef<Path>>(
        path: P,
        rules: Arc<ConnectionRules>,
    ) -> Result<Pattern, PatternError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let pattern = Pattern::read_from(&mut reader, rules)?;
        log::info!("Loaded pattern from {}", path.display());
        Ok(pattern)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PatternError> {
        write_pattern_file(path, &self.to_bytes())
    }
}

/// Write a serialized pattern image to disk
pub fn write_pattern_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), PatternError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    log::info!("Saved pattern to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::output::{OutputMessage, PooledOutput, RecordingSink};
    use crate::sequencer::edit::{ParamAddress, ParamEdit};
    use crate::sequencer::line::LineParam;
    use crate::sequencer::{NUM_LINES, NUM_SEQUENCES, NUM_STEPS};
    use std::io::Cursor;

    fn rules() -> Arc<ConnectionRules> {
        Arc::new(ConnectionRules::standard())
    }

    fn edited_pattern() -> Pattern {
        let mut p = Pattern::with_seed(rules(), 1);
        p.edit(ParamAddress::Tempo, ParamEdit::Set(97));
        p.edit(
            ParamAddress::Line { sequence: 2, line: 5, param: LineParam::Mode },
            ParamEdit::Set(7),
        );
        p.edit(
            ParamAddress::StepValue { sequence: 2, line: 5, step: 31 },
            ParamEdit::Set(-40),
        );
        p.edit(
            ParamAddress::Line { sequence: 2, line: 5, param: LineParam::Add },
            ParamEdit::Set(63 + 4),
        );
        p
    }

    #[test]
    fn test_image_size() {
        let expected = 8 + 4 + 4 + NUM_SEQUENCES * NUM_LINES * (12 + 2 * NUM_STEPS) * 4;
        assert_eq!(Pattern::with_seed(rules(), 0).to_bytes().len(), expected);
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let bytes = edited_pattern().to_bytes();
        assert_eq!(&bytes[..8], b"ssq32pat");

        let loaded = Pattern::read_from(&mut Cursor::new(&bytes), rules()).unwrap();
        assert_eq!(loaded.tempo(), 97);
        assert_eq!(loaded.to_bytes(), bytes);
    }

    #[test]
    fn test_bad_magic_leaves_pattern_unchanged() {
        let mut bytes = edited_pattern().to_bytes();
        bytes[0] = b'x';

        let mut p = Pattern::with_seed(rules(), 0);
        let before = p.to_bytes();
        let err = p.load(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, PatternError::InvalidMagic));
        assert_eq!(p.to_bytes(), before);
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut bytes = edited_pattern().to_bytes();
        bytes[8..12].copy_from_slice(&1i32.to_ne_bytes());

        let mut p = Pattern::with_seed(rules(), 0);
        let err = p.load(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            PatternError::UnsupportedVersion { found: 1, supported: 0 }
        ));
        assert_eq!(p.tempo(), 130);
    }

    #[test]
    fn test_truncated_file_leaves_pattern_unchanged() {
        let bytes = edited_pattern().to_bytes();
        let mut p = Pattern::with_seed(rules(), 0);
        let err = p.load(&mut Cursor::new(&bytes[..bytes.len() - 2])).unwrap_err();
        assert!(matches!(err, PatternError::Io(_)));
        assert_eq!(p.tempo(), 130);
    }

    fn play(pattern: &mut Pattern, pulses: i64) -> Vec<OutputMessage> {
        let mut output = PooledOutput::new(RecordingSink::default(), 16);
        for pulse in 0..pulses {
            pattern.pulse(pulse, pulse as u64, &mut output);
        }
        output.sink().messages().to_vec()
    }

    #[test]
    fn test_read_patterns_share_random_playback() {
        let mut source = Pattern::with_seed(rules(), 3);
        let line = |param| ParamAddress::Line { sequence: 0, line: 0, param };
        source.edit(line(LineParam::Mode), ParamEdit::Set(1));
        source.edit(line(LineParam::PlayMode), ParamEdit::Set(4));
        for step in 0..NUM_STEPS {
            source.edit(
                ParamAddress::StepValue { sequence: 0, line: 0, step },
                ParamEdit::Set(40 + step as i32),
            );
        }
        let bytes = source.to_bytes();

        let mut first = Pattern::read_from(&mut Cursor::new(&bytes), rules()).unwrap();
        let mut second = Pattern::read_from(&mut Cursor::new(&bytes), rules()).unwrap();
        let played = play(&mut first, 24 * 16);
        assert!(!played.is_empty());
        assert_eq!(played, play(&mut second, 24 * 16));
    }

    #[test]
    fn test_load_in_place() {
        let bytes = edited_pattern().to_bytes();
        let mut p = Pattern::with_seed(rules(), 0);
        p.load(&mut Cursor::new(&bytes)).unwrap();
        let line = p.sequence(2).and_then(|s| s.line(5)).unwrap();
        assert_eq!(line.param(LineParam::Add).connection_selector(), Some(3));
        assert_eq!(line.step_value(31).map(|v| v.get()), Some(-40));
    }
}
