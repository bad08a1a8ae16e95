//! Essence element framing.
//!
//! An essence element is a KLV whose length field is reserved when the
//! element is opened. [`EssenceElementWriter`] keeps the value cursor
//! within the declared length; [`EssenceElementReader`] hands out the value
//! in caller-sized pieces.

use crate::error::{MxfError, Result};
use crate::klv::{self, ber_length_size, read_full, MAX_BER_BYTES};
use crate::types::{Rational, TrackKind};
use crate::ul::Key;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, Write};
use tracing::warn;

/// Size of the essence of one edit unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSize {
    /// Every frame has this many bytes
    Fixed(u32),
    /// Frames differ in size
    Variable,
}

impl FrameSize {
    /// Fixed size, if any
    pub fn fixed(&self) -> Option<u32> {
        match self {
            FrameSize::Fixed(size) => Some(*size),
            FrameSize::Variable => None,
        }
    }
}

/// An essence track of a file source package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssenceTrack {
    /// Track ID in the file source package
    pub track_id: u32,
    /// Track number, matching the last four bytes of the element key
    pub track_number: u32,
    /// Picture, sound, ...
    pub kind: TrackKind,
    /// Element value size per frame
    pub frame_size: FrameSize,
    /// Sample rate from the essence descriptor
    pub sample_rate: Rational,
    /// Edit rate of the track
    pub frame_rate: Rational,
    /// Stream carrying the essence
    pub body_sid: u32,
    /// Stream carrying the index
    pub index_sid: u32,
}

impl EssenceTrack {
    /// Check whether an element key belongs to this track
    pub fn matches_key(&self, key: &Key) -> bool {
        key.is_gc_essence_element() && key.track_number() == self.track_number
    }
}

/// Writes one essence element with a reserved length field.
///
/// The element must be finished with [`finalize`](Self::finalize);
/// dropping an unfinished writer leaves a short element in the file and
/// logs a warning.
#[derive(Debug)]
pub struct EssenceElementWriter<'a, W: Write + Seek> {
    writer: &'a mut W,
    key: Key,
    llen: u8,
    start: u64,
    declared: u64,
    written: u64,
    finished: bool,
}

impl<'a, W: Write + Seek> EssenceElementWriter<'a, W> {
    /// Write the key and a length field for `declared_len` bytes.
    ///
    /// The length field is `llen_hint` bytes wide, or wider if the
    /// declared length needs it.
    pub fn open(writer: &'a mut W, key: Key, llen_hint: u8, declared_len: u64) -> Result<Self> {
        let llen = llen_hint.max(ber_length_size(declared_len));
        if llen > MAX_BER_BYTES + 1 {
            return Err(MxfError::malformed_length(format!(
                "length field of {} bytes",
                llen
            )));
        }

        let start = writer.stream_position()?;
        klv::write_fixed_kl(writer, &key, llen, declared_len)?;

        Ok(EssenceElementWriter {
            writer,
            key,
            llen,
            start,
            declared: declared_len,
            written: 0,
            finished: false,
        })
    }

    /// Append value bytes.
    ///
    /// Fails without writing anything if the bytes would pass the declared
    /// length.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let attempted = data.len() as u64;
        if self.written + attempted > self.declared {
            return Err(MxfError::EssenceOverflow {
                declared: self.declared,
                written: self.written,
                attempted,
            });
        }

        self.writer.write_all(data)?;
        self.written += attempted;
        Ok(())
    }

    /// Finish the element, returning its total size.
    pub fn finalize(mut self) -> Result<u64> {
        self.finished = true;
        if self.written != self.declared {
            return Err(MxfError::ShortWrite {
                declared: self.declared,
                written: self.written,
            });
        }
        Ok(self.total_size())
    }

    /// Element key
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Width of the length field
    pub fn llen(&self) -> u8 {
        self.llen
    }

    /// File offset of the key
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Declared value length
    pub fn declared_len(&self) -> u64 {
        self.declared
    }

    /// Value bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Size of key, length and declared value
    pub fn total_size(&self) -> u64 {
        16 + self.llen as u64 + self.declared
    }
}

impl<W: Write + Seek> Drop for EssenceElementWriter<'_, W> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                key = %self.key,
                offset = self.start,
                written = self.written,
                declared = self.declared,
                "essence element dropped before it was finalized"
            );
        }
    }
}

/// Reads the value of one essence element whose key and length have been
/// read.
#[derive(Debug)]
pub struct EssenceElementReader<'a, R: Read> {
    reader: &'a mut R,
    key: Key,
    llen: u8,
    len: u64,
    consumed: u64,
}

impl<'a, R: Read> EssenceElementReader<'a, R> {
    /// Start reading a value of `len` bytes at the current position
    pub fn open(reader: &'a mut R, key: Key, llen: u8, len: u64) -> Self {
        EssenceElementReader {
            reader,
            key,
            llen,
            len,
            consumed: 0,
        }
    }

    /// Read up to `max_len` bytes into `buf`.
    ///
    /// Fewer bytes than requested are returned only at the end of the
    /// element; a file that ends early is an error.
    pub fn read_data(&mut self, buf: &mut [u8], max_len: usize) -> Result<usize> {
        let wanted = (buf.len().min(max_len) as u64).min(self.remaining()) as usize;
        if wanted == 0 {
            return Ok(0);
        }
        read_full(self.reader, &mut buf[..wanted])?;
        self.consumed += wanted as u64;
        Ok(wanted)
    }

    /// Element key
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Width of the length field
    pub fn llen(&self) -> u8 {
        self.llen
    }

    /// Value length
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True for an empty value
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value bytes not read yet
    pub fn remaining(&self) -> u64 {
        self.len - self.consumed
    }
}
