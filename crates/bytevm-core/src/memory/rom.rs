//! ROM sources backing the banked `0x8000..=0xFFFF` window.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

/// Size in bytes of one ROM bank (and of the RAM segment).
pub const ROM_BANK_BYTES: usize = 0x8000;
/// Number of fixed banks in a preloaded image.
pub const PRELOADED_BANK_COUNT: u64 = 16;
/// Size in bytes of a preloaded ROM image (1 MiB).
pub const PRELOADED_IMAGE_BYTES: usize = ROM_BANK_BYTES * 16;

/// How the ROM image is mapped into the bank window. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MappingMode {
    /// First 1 MiB of the file held in memory as 16 fixed banks.
    #[default]
    Preloaded,
    /// Whole file read on demand, one bank at a time, without an upper bound.
    Streaming,
}

/// Seekable byte source for streaming ROM banks.
pub trait RomStream: Read + Seek {}

impl<T: Read + Seek> RomStream for T {}

/// Backing store for the ROM window.
pub enum RomSource {
    /// Full zero-padded image sliced into [`PRELOADED_BANK_COUNT`] banks.
    Preloaded {
        /// The 1 MiB image.
        image: Box<[u8]>,
    },
    /// File-like stream reseeked on every bank switch.
    Streaming {
        /// Underlying stream.
        stream: Box<dyn RomStream>,
    },
}

impl fmt::Debug for RomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preloaded { image } => f
                .debug_struct("Preloaded")
                .field("image_len", &image.len())
                .finish(),
            Self::Streaming { .. } => f.debug_struct("Streaming").finish_non_exhaustive(),
        }
    }
}

impl RomSource {
    /// Builds a preloaded image from an in-memory buffer.
    ///
    /// Bytes past 1 MiB are ignored; a shorter buffer is zero-padded.
    #[must_use]
    pub fn preloaded_from_bytes(bytes: &[u8]) -> Self {
        let mut image = vec![0; PRELOADED_IMAGE_BYTES].into_boxed_slice();
        let len = bytes.len().min(PRELOADED_IMAGE_BYTES);
        image[..len].copy_from_slice(&bytes[..len]);
        Self::Preloaded { image }
    }

    /// Reads up to 1 MiB from `reader` into a zero-padded preloaded image.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when `reader` fails. Hitting end of
    /// input early is not an error.
    pub fn preload(mut reader: impl Read) -> io::Result<Self> {
        let mut image = vec![0; PRELOADED_IMAGE_BYTES].into_boxed_slice();
        let filled = fill_from(&mut reader, &mut image)?;
        tracing::debug!(bytes = filled, "preloaded rom image");
        Ok(Self::Preloaded { image })
    }

    /// Wraps a seekable stream for on-demand bank loading.
    #[must_use]
    pub fn streaming(stream: impl RomStream + 'static) -> Self {
        Self::Streaming {
            stream: Box::new(stream),
        }
    }

    /// Returns the mapping mode this source implements.
    #[must_use]
    pub const fn mapping_mode(&self) -> MappingMode {
        match self {
            Self::Preloaded { .. } => MappingMode::Preloaded,
            Self::Streaming { .. } => MappingMode::Streaming,
        }
    }

    /// Copies bank `bank` into `dest`, returning the bank actually loaded.
    ///
    /// Preloaded banks are reduced modulo [`PRELOADED_BANK_COUNT`]. Streaming
    /// banks past end of input read as zeros.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error from a streaming seek or read.
    pub fn load_bank(&mut self, bank: u64, dest: &mut [u8]) -> io::Result<u64> {
        match self {
            Self::Preloaded { image } => {
                let bank = bank % PRELOADED_BANK_COUNT;
                let start = bank_offset(bank);
                dest.copy_from_slice(&image[start..start + ROM_BANK_BYTES]);
                Ok(bank)
            }
            Self::Streaming { stream } => {
                let offset = bank.saturating_mul(ROM_BANK_BYTES as u64);
                stream.seek(SeekFrom::Start(offset))?;
                let filled = fill_from(stream, dest)?;
                if filled < dest.len() {
                    tracing::debug!(bank, filled, "short read past end of rom stream");
                }
                Ok(bank)
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn bank_offset(bank: u64) -> usize {
    bank as usize * ROM_BANK_BYTES
}

/// Reads until `dest` is full or input ends, zero-filling the remainder.
fn fill_from<R: Read + ?Sized>(reader: &mut R, dest: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < dest.len() {
        match reader.read(&mut dest[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    dest[filled..].fill(0);
    Ok(filled)
}
