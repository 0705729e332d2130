//! Save state files.
//!
//! Binary states are stored as a file prefix, a little-endian format version, and the
//! zstd-compressed state. Text states are stored verbatim so they can be inspected and edited.

use psg_config::StateFormat;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

const FILE_PREFIX: &[u8] = b"psgstate";

// Prefix + 2 bytes for version
const HEADER_LEN: usize = FILE_PREFIX.len() + 2;

pub const STATE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("Error opening state file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error reading or writing state file: {0}")]
    Io(#[from] io::Error),
    #[error("State file does not start with the expected prefix")]
    PrefixMismatch,
    #[error("State file version mismatch; expected {expected}, was {actual}")]
    VersionMismatch { expected: u16, actual: u16 },
}

/// Write a saved state to `writer` in the file layout for `format`.
///
/// # Errors
///
/// Propagates any I/O or compression error.
pub fn write_state<W: Write>(
    mut writer: W,
    format: StateFormat,
    state: &[u8],
) -> Result<(), StateFileError> {
    match format {
        StateFormat::Binary => {
            writer.write_all(FILE_PREFIX)?;
            writer.write_all(&STATE_VERSION.to_le_bytes())?;

            let mut encoder = zstd::stream::Encoder::new(writer, 0)?;
            encoder.write_all(state)?;
            encoder.finish()?.flush()?;
        }
        StateFormat::Text => {
            writer.write_all(state)?;
            writer.flush()?;
        }
    }

    Ok(())
}

/// Read a saved state written by [`write_state`].
///
/// # Errors
///
/// Returns an error if the header does not match or if reading or decompression fails.
pub fn read_state<R: Read>(mut reader: R, format: StateFormat) -> Result<Vec<u8>, StateFileError> {
    let mut state = Vec::new();
    match format {
        StateFormat::Binary => {
            let mut header = [0_u8; HEADER_LEN];
            reader.read_exact(&mut header).map_err(|err| match err.kind() {
                io::ErrorKind::UnexpectedEof => StateFileError::PrefixMismatch,
                _ => err.into(),
            })?;

            if &header[..FILE_PREFIX.len()] != FILE_PREFIX {
                return Err(StateFileError::PrefixMismatch);
            }

            let version =
                u16::from_le_bytes([header[FILE_PREFIX.len()], header[FILE_PREFIX.len() + 1]]);
            if version != STATE_VERSION {
                return Err(StateFileError::VersionMismatch {
                    expected: STATE_VERSION,
                    actual: version,
                });
            }

            zstd::stream::Decoder::new(reader)?.read_to_end(&mut state)?;
        }
        StateFormat::Text => {
            reader.read_to_end(&mut state)?;
        }
    }

    Ok(state)
}

/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_to_file(path: &Path, format: StateFormat, state: &[u8]) -> Result<(), StateFileError> {
    let file = File::create(path)
        .map_err(|source| StateFileError::Open { path: path.display().to_string(), source })?;
    write_state(BufWriter::new(file), format, state)?;

    log::info!("Wrote {format} state to '{}'", path.display());

    Ok(())
}

/// # Errors
///
/// Returns an error if the file cannot be opened or does not hold a state in `format`.
pub fn load_from_file(path: &Path, format: StateFormat) -> Result<Vec<u8>, StateFileError> {
    let file = File::open(path)
        .map_err(|source| StateFileError::Open { path: path.display().to_string(), source })?;
    read_state(BufReader::new(file), format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const STATE: &[u8] = b"\x07\x00\x00\x00\x00\x00\x00\x00PsgCore\x0F\x0F\x0F\x0F";

    #[test]
    fn binary_layout() {
        let mut file = Vec::new();
        write_state(&mut file, StateFormat::Binary, STATE).unwrap();

        assert_eq!(&file[..8], b"psgstate");
        assert_eq!(&file[8..10], [1, 0]);
        assert_eq!(read_state(file.as_slice(), StateFormat::Binary).unwrap(), STATE);
    }

    #[test]
    fn text_is_verbatim() {
        let text = b"[PsgCore]\n  [SN76489]\n";
        let mut file = Vec::new();
        write_state(&mut file, StateFormat::Text, text).unwrap();

        assert_eq!(file, text);
        assert_eq!(read_state(file.as_slice(), StateFormat::Text).unwrap(), text);
    }

    #[test]
    fn header_mismatches() {
        let mut file = Vec::new();
        write_state(&mut file, StateFormat::Binary, STATE).unwrap();

        let mut wrong_prefix = file.clone();
        wrong_prefix[0] = b'x';
        let err = read_state(wrong_prefix.as_slice(), StateFormat::Binary).unwrap_err();
        assert!(matches!(err, StateFileError::PrefixMismatch), "{err}");

        let mut wrong_version = file.clone();
        wrong_version[8] = 2;
        let err = read_state(wrong_version.as_slice(), StateFormat::Binary).unwrap_err();
        assert!(
            matches!(err, StateFileError::VersionMismatch { expected: 1, actual: 2 }),
            "{err}"
        );

        let err = read_state(&b"psg"[..], StateFormat::Binary).unwrap_err();
        assert!(matches!(err, StateFileError::PrefixMismatch), "{err}");
    }

    #[test]
    fn text_state_read_as_binary() {
        let err = read_state(&b"[PsgCore]\n[/PsgCore]\n"[..], StateFormat::Binary).unwrap_err();
        assert!(matches!(err, StateFileError::PrefixMismatch), "{err}");
    }
}
