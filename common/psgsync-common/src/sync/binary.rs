use crate::sync::{StateCorruption, StateSerializer, SyncResult, SyncValue};
use bincode::config::{Configuration, Fixint, LittleEndian, Limit, Varint};
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use std::io;

// Caps the length a corrupt prefix can claim before anything is allocated
const DECODE_LIMIT: usize = 1024 * 1024;

const FIXED_CONFIG: Configuration<LittleEndian, Fixint, Limit<DECODE_LIMIT>> =
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
        .with_limit::<DECODE_LIMIT>();

// Variable-length integers; used for arrays when the caller asks for compression
const COMPRESSED_CONFIG: Configuration<LittleEndian, Varint, Limit<DECODE_LIMIT>> =
    bincode::config::standard().with_limit::<DECODE_LIMIT>();

const SECTION_END: u8 = b']';

fn encode_into<E: Encode, W: io::Write>(
    value: E,
    writer: &mut W,
    compressed: bool,
) -> Result<usize, EncodeError> {
    if compressed {
        bincode::encode_into_std_write(value, writer, COMPRESSED_CONFIG)
    } else {
        bincode::encode_into_std_write(value, writer, FIXED_CONFIG)
    }
}

/// Saving serializer for the binary medium.
///
/// Field names are not written; the stream is validated by position on load. Section names are
/// written so that a misaligned load is detected at the next section boundary.
#[derive(Debug)]
pub struct BinaryWriter<W> {
    writer: W,
    sections: Vec<String>,
}

impl<W: io::Write> BinaryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, sections: Vec::new() }
    }

    /// Verify that all sections were closed, flush, and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if sections are still open or if flushing fails.
    pub fn finish(mut self) -> SyncResult<W> {
        if !self.sections.is_empty() {
            return Err(StateCorruption::UnclosedSections(self.sections.len()).into());
        }

        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: io::Write> StateSerializer for BinaryWriter<W> {
    fn is_loading(&self) -> bool {
        false
    }

    fn sync<T: SyncValue>(&mut self, _name: &str, value: &mut T) -> SyncResult<()> {
        encode_into(*value, &mut self.writer, false)?;
        Ok(())
    }

    fn sync_array<T: SyncValue>(
        &mut self,
        _name: &str,
        values: &mut [T],
        use_compression: bool,
    ) -> SyncResult<()> {
        encode_into(values.len() as u32, &mut self.writer, false)?;

        if use_compression {
            if let Some((to_bit, _)) = T::bit_packing() {
                let mut packed = vec![0_u8; values.len().div_ceil(8)];
                for (i, &value) in values.iter().enumerate() {
                    packed[i / 8] |= u8::from(to_bit(value)) << (i % 8);
                }
                self.writer.write_all(&packed)?;
                return Ok(());
            }
        }

        for &value in values.iter() {
            encode_into(value, &mut self.writer, use_compression)?;
        }

        Ok(())
    }

    fn begin_section(&mut self, name: &str) -> SyncResult<()> {
        encode_into(name, &mut self.writer, false)?;
        self.sections.push(name.into());
        Ok(())
    }

    fn end_section(&mut self) -> SyncResult<()> {
        if self.sections.pop().is_none() {
            return Err(StateCorruption::UnbalancedEnd.into());
        }

        encode_into(SECTION_END, &mut self.writer, false)?;
        Ok(())
    }
}

/// Loading serializer for the binary medium, reading from a borrowed buffer.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    sections: Vec<String>,
}

impl<'a> BinaryReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, sections: Vec::new() }
    }

    /// Verify that all sections were closed and that the whole buffer was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`StateCorruption`] if sections are still open or bytes remain.
    pub fn finish(self) -> SyncResult<()> {
        if !self.sections.is_empty() {
            return Err(StateCorruption::UnclosedSections(self.sections.len()).into());
        }

        if !self.data.is_empty() {
            return Err(StateCorruption::TrailingData(self.data.len()).into());
        }

        Ok(())
    }

    fn decode<D: Decode<()>>(&mut self, name: &str, compressed: bool) -> SyncResult<D> {
        let result = if compressed {
            bincode::decode_from_slice(self.data, COMPRESSED_CONFIG)
        } else {
            bincode::decode_from_slice(self.data, FIXED_CONFIG)
        };

        match result {
            Ok((value, len)) => {
                self.data = &self.data[len..];
                Ok(value)
            }
            Err(DecodeError::UnexpectedEnd { .. }) => {
                Err(StateCorruption::UnexpectedEnd(name.into()).into())
            }
            Err(source) => Err(StateCorruption::Decode { name: name.into(), source }.into()),
        }
    }
}

impl StateSerializer for BinaryReader<'_> {
    fn is_loading(&self) -> bool {
        true
    }

    fn sync<T: SyncValue>(&mut self, name: &str, value: &mut T) -> SyncResult<()> {
        *value = self.decode(name, false)?;
        Ok(())
    }

    fn sync_array<T: SyncValue>(
        &mut self,
        name: &str,
        values: &mut [T],
        use_compression: bool,
    ) -> SyncResult<()> {
        let len: u32 = self.decode(name, false)?;
        if len as usize != values.len() {
            return Err(StateCorruption::LengthMismatch {
                name: name.into(),
                expected: values.len(),
                actual: len as usize,
            }
            .into());
        }

        if use_compression {
            if let Some((_, from_bit)) = T::bit_packing() {
                let packed_len = values.len().div_ceil(8);
                if self.data.len() < packed_len {
                    return Err(StateCorruption::UnexpectedEnd(name.into()).into());
                }

                let (packed, rest) = self.data.split_at(packed_len);
                for (i, value) in values.iter_mut().enumerate() {
                    *value = from_bit(packed[i / 8] & (1 << (i % 8)) != 0);
                }
                self.data = rest;
                return Ok(());
            }
        }

        for value in values {
            *value = self.decode(name, use_compression)?;
        }

        Ok(())
    }

    fn begin_section(&mut self, name: &str) -> SyncResult<()> {
        let actual: String = self.decode(name, false)?;
        if actual != name {
            return Err(StateCorruption::SectionMismatch { expected: name.into(), actual }.into());
        }

        self.sections.push(actual);
        Ok(())
    }

    fn end_section(&mut self) -> SyncResult<()> {
        let Some(name) = self.sections.pop() else {
            return Err(StateCorruption::UnbalancedEnd.into());
        };

        let marker: u8 = self.decode(&name, false)?;
        if marker != SECTION_END {
            return Err(StateCorruption::SectionMismatch {
                expected: format!("end of {name}"),
                actual: format!("byte {marker:#04X}"),
            }
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{SyncError, SyncState};

    struct Sectioned {
        name: &'static str,
        value: u16,
    }

    impl SyncState for Sectioned {
        fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
            serializer.begin_section(self.name)?;
            serializer.sync("value", &mut self.value)?;
            serializer.end_section()
        }
    }

    #[test]
    fn fixed_width_little_endian_layout() {
        struct Scalars(u16, i32, bool);

        impl SyncState for Scalars {
            fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
                serializer.sync("a", &mut self.0)?;
                serializer.sync("b", &mut self.1)?;
                serializer.sync("c", &mut self.2)
            }
        }

        let bytes = crate::sync::save_binary(&mut Scalars(0x1234, -2, true)).unwrap();
        assert_eq!(bytes, [0x34, 0x12, 0xFE, 0xFF, 0xFF, 0xFF, 0x01]);
    }

    #[test]
    fn section_name_mismatch() {
        let bytes =
            crate::sync::save_binary(&mut Sectioned { name: "SN76489", value: 5 }).unwrap();

        let mut other = Sectioned { name: "YM2413", value: 0 };
        let err = crate::sync::load_binary(&mut other, &bytes).unwrap_err();
        assert!(
            matches!(err, SyncError::Corruption(StateCorruption::SectionMismatch { .. })),
            "{err}"
        );
    }

    #[test]
    fn array_length_mismatch() {
        struct Array<const N: usize>([u8; N]);

        impl<const N: usize> SyncState for Array<N> {
            fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
                serializer.sync_array("values", &mut self.0, false)
            }
        }

        let bytes = crate::sync::save_binary(&mut Array([1, 2, 3, 4])).unwrap();
        let err = crate::sync::load_binary(&mut Array([0; 3]), &bytes).unwrap_err();
        assert!(
            matches!(
                err,
                SyncError::Corruption(StateCorruption::LengthMismatch {
                    expected: 3,
                    actual: 4,
                    ..
                })
            ),
            "{err}"
        );
    }

    #[test]
    fn invalid_bool_is_corruption() {
        struct Flag(bool);

        impl SyncState for Flag {
            fn sync_state<S: StateSerializer>(&mut self, serializer: &mut S) -> SyncResult<()> {
                serializer.sync("flag", &mut self.0)
            }
        }

        let err = crate::sync::load_binary(&mut Flag(false), &[2]).unwrap_err();
        assert!(
            matches!(err, SyncError::Corruption(StateCorruption::Decode { .. })),
            "{err}"
        );
    }
}
