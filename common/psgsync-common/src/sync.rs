//! Ordered state synchronization for save states and rewind.
//!
//! A stateful type implements [`SyncState`] exactly once. The same function is driven by a saving
//! serializer or by a loading serializer, so save and load always visit the same fields in the
//! same order. Sub-components are synchronized by calling their own `sync_state` from inside the
//! owner's, usually wrapped in a named section.
//!
//! Two media are provided: a compact binary stream ([`BinaryWriter`] / [`BinaryReader`]) where
//! fields are validated by position, and a line-oriented text format ([`TextWriter`] /
//! [`TextReader`]) where fields are looked up by key within their section.

mod binary;
mod text;

pub use binary::{BinaryReader, BinaryWriter};
pub use text::{TextReader, TextWriter};

use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use std::fmt::Display;
use std::io;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateCorruption {
    #[error("key '{name}' not found in section '{section}'")]
    MissingKey { section: String, name: String },
    #[error("duplicate key '{name}' in section '{section}'")]
    DuplicateKey { section: String, name: String },
    #[error("array '{name}' has length {actual}, expected {expected}")]
    LengthMismatch { name: String, expected: usize, actual: usize },
    #[error("expected section '{expected}', found '{actual}'")]
    SectionMismatch { expected: String, actual: String },
    #[error("section '{0}' not found")]
    MissingSection(String),
    #[error("section end with no open section")]
    UnbalancedEnd,
    #[error("{0} section(s) left open")]
    UnclosedSections(usize),
    #[error("invalid value for '{name}': '{value}'")]
    InvalidValue { name: String, value: String },
    #[error("state data ended while reading '{0}'")]
    UnexpectedEnd(String),
    #[error("{0} bytes of trailing data after state")]
    TrailingData(usize),
    #[error("malformed state text at line {line}: {message}")]
    Malformed { line: usize, message: String },
    #[error("error decoding '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("state corruption: {0}")]
    Corruption(#[from] StateCorruption),
    #[error("error encoding state: {0}")]
    Encode(#[from] EncodeError),
    #[error("I/O error writing state: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

mod sealed {
    pub trait Sealed: Sized {
        // Conversions used to store one bit per element in compressed binary arrays
        fn bit_packing() -> Option<(fn(Self) -> bool, fn(bool) -> Self)> {
            None
        }
    }
}

/// Scalar types that can be synchronized directly.
pub trait SyncValue:
    Copy + Display + FromStr + Encode + Decode<()> + sealed::Sealed + 'static
{
}

macro_rules! impl_sync_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}
            impl SyncValue for $t {}
        )*
    };
}

impl_sync_value!(u8, i8, u16, i16, u32, i32);

impl sealed::Sealed for bool {
    fn bit_packing() -> Option<(fn(Self) -> bool, fn(bool) -> Self)> {
        let identity: fn(bool) -> bool = |value| value;
        Some((identity, identity))
    }
}

impl SyncValue for bool {}

/// One direction (save or load) over one medium.
///
/// Every call made while saving must be matched by the same call, with the same name, at the same
/// position while loading.
pub trait StateSerializer {
    fn is_loading(&self) -> bool;

    /// Save or load a single scalar.
    ///
    /// # Errors
    ///
    /// While loading, returns [`StateCorruption`] if the value is missing or unreadable. While
    /// saving, propagates encoding and I/O errors.
    fn sync<T: SyncValue>(&mut self, name: &str, value: &mut T) -> SyncResult<()>;

    /// Save or load every element of a fixed-length array.
    ///
    /// `use_compression` only affects the binary medium and never changes the loaded values.
    ///
    /// # Errors
    ///
    /// While loading, returns [`StateCorruption`] if the array is missing, unreadable, or was
    /// saved with a different length.
    fn sync_array<T: SyncValue>(
        &mut self,
        name: &str,
        values: &mut [T],
        use_compression: bool,
    ) -> SyncResult<()>;

    /// Open a nested named section.
    ///
    /// # Errors
    ///
    /// While loading, returns [`StateCorruption`] if the next section does not have this name.
    fn begin_section(&mut self, name: &str) -> SyncResult<()>;

    /// Close the innermost open section.
    ///
    /// # Errors
    ///
    /// Returns [`StateCorruption::UnbalancedEnd`] if no section is open.
    fn end_section(&mut self) -> SyncResult<()>;
}

pub trait SyncState {
    /// Visit every persisted field of `self` in a fixed order.
    ///
    /// # Errors
    ///
    /// Propagates any error from the serializer.
    fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()>;
}

/// Save `value` into a new binary buffer.
///
/// # Errors
///
/// Propagates encoding errors, or [`StateCorruption`] if the traversal leaves sections unbalanced.
pub fn save_binary<T: SyncState>(value: &mut T) -> SyncResult<Vec<u8>> {
    let mut writer = BinaryWriter::new(Vec::new());
    value.sync_state(&mut writer)?;
    writer.finish()
}

/// Load `value` from a binary buffer produced by [`save_binary`].
///
/// On error `value` may be partially overwritten and must be discarded.
///
/// # Errors
///
/// Returns [`StateCorruption`] if the buffer does not match the traversal.
pub fn load_binary<T: SyncState>(value: &mut T, data: &[u8]) -> SyncResult<()> {
    let mut reader = BinaryReader::new(data);
    value.sync_state(&mut reader)?;
    reader.finish()?;

    log::debug!("Loaded {} bytes of binary state", data.len());

    Ok(())
}

/// Save `value` as text.
///
/// # Errors
///
/// Returns [`StateCorruption`] if the traversal leaves sections unbalanced.
pub fn save_text<T: SyncState>(value: &mut T) -> SyncResult<String> {
    let mut writer = TextWriter::new();
    value.sync_state(&mut writer)?;
    writer.finish()
}

/// Load `value` from text produced by [`save_text`].
///
/// On error `value` may be partially overwritten and must be discarded.
///
/// # Errors
///
/// Returns [`StateCorruption`] if the text is malformed or does not match the traversal.
pub fn load_text<T: SyncState>(value: &mut T, text: &str) -> SyncResult<()> {
    let mut reader = TextReader::new(text)?;
    value.sync_state(&mut reader)?;
    reader.finish()?;

    log::debug!("Loaded {} lines of text state", text.lines().count());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct Counter {
        ticks: u32,
        enabled: bool,
    }

    impl SyncState for Counter {
        fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
            serializer.begin_section("Counter")?;
            serializer.sync("ticks", &mut self.ticks)?;
            serializer.sync("enabled", &mut self.enabled)?;
            serializer.end_section()
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct Machine {
        counters: [Counter; 2],
        registers: [u8; 4],
        offsets: [i16; 3],
        flags: [bool; 5],
        signed: i8,
        wide: i32,
    }

    impl SyncState for Machine {
        fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
            for counter in &mut self.counters {
                counter.sync_state(serializer)?;
            }
            serializer.sync_array("registers", &mut self.registers, false)?;
            serializer.sync_array("offsets", &mut self.offsets, true)?;
            serializer.sync_array("flags", &mut self.flags, true)?;
            serializer.sync("signed", &mut self.signed)?;
            serializer.sync("wide", &mut self.wide)
        }
    }

    fn sample_machine() -> Machine {
        Machine {
            counters: [
                Counter { ticks: 0xDEAD_BEEF, enabled: true },
                Counter { ticks: 7, enabled: false },
            ],
            registers: [0x80, 0x9F, 0x00, 0xFF],
            offsets: [-1, 300, i16::MIN],
            flags: [true, false, true, true, false],
            signed: -128,
            wide: -0x1000,
        }
    }

    #[test]
    fn binary_round_trip() {
        let mut original = sample_machine();
        let bytes = save_binary(&mut original).unwrap();

        let mut loaded = Machine::default();
        load_binary(&mut loaded, &bytes).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn text_round_trip() {
        let mut original = sample_machine();
        let text = save_text(&mut original).unwrap();

        let mut loaded = Machine::default();
        load_text(&mut loaded, &text).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn compression_hint_is_transparent() {
        struct Both<const COMPRESS: bool>([u32; 4]);

        impl<const COMPRESS: bool> SyncState for Both<COMPRESS> {
            fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
                serializer.sync_array("values", &mut self.0, COMPRESS)
            }
        }

        let values = [0, 1, 0x7F, 0x1234_5678];
        let plain = save_binary(&mut Both::<false>(values)).unwrap();
        let packed = save_binary(&mut Both::<true>(values)).unwrap();
        assert!(packed.len() < plain.len());

        let mut loaded = Both::<true>([0; 4]);
        load_binary(&mut loaded, &packed).unwrap();
        assert_eq!(loaded.0, values);
    }

    #[test]
    fn compressed_bool_arrays_are_bit_packed() {
        struct Flags<const COMPRESS: bool>([bool; 10]);

        impl<const COMPRESS: bool> SyncState for Flags<COMPRESS> {
            fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
                serializer.sync_array("flags", &mut self.0, COMPRESS)
            }
        }

        let flags = [true, false, false, true, true, false, false, false, false, true];
        let plain = save_binary(&mut Flags::<false>(flags)).unwrap();
        let packed = save_binary(&mut Flags::<true>(flags)).unwrap();
        assert_eq!(plain.len(), 4 + 10);
        assert_eq!(packed, [10, 0, 0, 0, 0b0001_1001, 0b0000_0010]);

        let mut loaded = Flags::<true>([false; 10]);
        load_binary(&mut loaded, &packed).unwrap();
        assert_eq!(loaded.0, flags);

        let err = load_binary(&mut Flags::<true>([false; 10]), &packed[..5]).unwrap_err();
        assert!(matches!(err, SyncError::Corruption(StateCorruption::UnexpectedEnd(_))), "{err}");
    }

    #[test]
    fn oversized_section_name_is_corruption() {
        let mut bytes = save_binary(&mut Counter { ticks: 5, enabled: true }).unwrap();
        // Section name length is the leading fixed-width u64
        bytes[..8].copy_from_slice(&(1_u64 << 46).to_le_bytes());

        let mut loaded = Counter::default();
        let err = load_binary(&mut loaded, &bytes).unwrap_err();
        assert!(matches!(err, SyncError::Corruption(StateCorruption::Decode { .. })), "{err}");
        assert_eq!(loaded, Counter::default());
    }

    #[test]
    fn truncated_binary_is_corruption() {
        let mut original = sample_machine();
        let bytes = save_binary(&mut original).unwrap();

        let mut loaded = Machine::default();
        let err = load_binary(&mut loaded, &bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.is_corruption(), "{err}");
    }

    #[test]
    fn trailing_binary_is_corruption() {
        let mut original = sample_machine();
        let mut bytes = save_binary(&mut original).unwrap();
        bytes.push(0);

        let mut loaded = Machine::default();
        let err = load_binary(&mut loaded, &bytes).unwrap_err();
        assert!(matches!(err, SyncError::Corruption(StateCorruption::TrailingData(1))), "{err}");
    }

    #[test]
    fn unbalanced_sections_fail() {
        struct Unbalanced;

        impl SyncState for Unbalanced {
            fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
                serializer.begin_section("Open")
            }
        }

        assert!(matches!(
            save_binary(&mut Unbalanced),
            Err(SyncError::Corruption(StateCorruption::UnclosedSections(1)))
        ));
        assert!(matches!(
            save_text(&mut Unbalanced),
            Err(SyncError::Corruption(StateCorruption::UnclosedSections(1)))
        ));

        struct ExtraEnd;

        impl SyncState for ExtraEnd {
            fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
                serializer.end_section()
            }
        }

        assert!(matches!(
            save_text(&mut ExtraEnd),
            Err(SyncError::Corruption(StateCorruption::UnbalancedEnd))
        ));
    }
}
