//! Codec adapter: one closed enum over the supported algorithms, each variant
//! mapping to a streaming encoder/decoder from an existing library.
//!
//! No framing is added on top of what flate2, bzip2 and xz2 produce. The only
//! extra step is a signature check on the first bytes of a stream before it
//! is decoded, so data written by a different algorithm is rejected instead
//! of being decoded into garbage.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::str::FromStr;

use bzip2::bufread::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::bufread::{MultiGzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use xz2::bufread::XzDecoder;
use xz2::write::XzEncoder;

use crate::error::ArchiveError;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZ2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// Number of leading bytes needed to recognise any supported stream.
pub const SIGNATURE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Algorithm {
    Gzip,
    Zlib,
    Bz2,
    Lzma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Compress,
    Decompress,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Gzip,
        Algorithm::Zlib,
        Algorithm::Bz2,
        Algorithm::Lzma,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Gzip => "gzip",
            Algorithm::Zlib => "zlib",
            Algorithm::Bz2 => "bz2",
            Algorithm::Lzma => "lzma",
        }
    }

    /// Suffix appended to compressed file names, including the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            Algorithm::Gzip => ".gz",
            Algorithm::Zlib => ".zz",
            Algorithm::Bz2 => ".bz2",
            Algorithm::Lzma => ".xz",
        }
    }

    pub fn default_level(self) -> u32 {
        match self {
            Algorithm::Gzip => 9,
            Algorithm::Zlib => 6,
            Algorithm::Bz2 => 9,
            Algorithm::Lzma => 6,
        }
    }

    /// Clamp a requested level into the range the library accepts.
    pub fn clamp_level(self, level: u32) -> u32 {
        match self {
            Algorithm::Bz2 => level.clamp(1, 9),
            _ => level.min(9),
        }
    }

    /// Wrap `writer` in this algorithm's encoder.
    pub fn encoder<W: Write>(self, writer: W, level: Option<u32>) -> Encoder<W> {
        let level = self.clamp_level(level.unwrap_or_else(|| self.default_level()));
        match self {
            Algorithm::Gzip => Encoder::Gzip(GzEncoder::new(writer, flate2::Compression::new(level))),
            Algorithm::Zlib => {
                Encoder::Zlib(ZlibEncoder::new(writer, flate2::Compression::new(level)))
            }
            Algorithm::Bz2 => Encoder::Bz2(BzEncoder::new(writer, bzip2::Compression::new(level))),
            Algorithm::Lzma => Encoder::Lzma(XzEncoder::new(writer, level)),
        }
    }

    /// Wrap `reader` in this algorithm's decoder. The caller is expected to
    /// have run [`Algorithm::check_signature`] on the stream head first.
    pub fn decoder<R: BufRead>(self, reader: R) -> Decoder<R> {
        match self {
            Algorithm::Gzip => Decoder::Gzip(MultiGzDecoder::new(reader)),
            Algorithm::Zlib => Decoder::Zlib(ZlibDecoder::new(reader)),
            Algorithm::Bz2 => Decoder::Bz2(MultiBzDecoder::new(reader)),
            Algorithm::Lzma => Decoder::Lzma(XzDecoder::new_multi_decoder(reader)),
        }
    }

    /// Check that `head` (the first bytes of a stream) looks like this
    /// algorithm's output. Returns the reason on mismatch.
    pub fn check_signature(self, head: &[u8]) -> Result<(), String> {
        if head.is_empty() {
            return Err("stream is empty".to_string());
        }
        let ok = match self {
            Algorithm::Gzip => head.starts_with(GZIP_MAGIC),
            Algorithm::Zlib => {
                head.len() >= 2
                    && head[0] & 0x0f == 8
                    && head[0] >> 4 <= 7
                    && (u16::from(head[0]) << 8 | u16::from(head[1])) % 31 == 0
            }
            Algorithm::Bz2 => head.starts_with(BZ2_MAGIC),
            Algorithm::Lzma => head.starts_with(XZ_MAGIC),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("missing {} header", self.name()))
        }
    }

    /// Compress everything from `reader` into `writer`, returning the number
    /// of input bytes consumed.
    pub fn compress<R: Read, W: Write>(
        self,
        mut reader: R,
        writer: W,
        level: Option<u32>,
    ) -> io::Result<u64> {
        let mut encoder = self.encoder(writer, level);
        let n = io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?;
        Ok(n)
    }

    /// Decompress everything from `reader` into `writer`, returning the
    /// number of bytes produced. Signature mismatches surface as
    /// `InvalidData` errors.
    pub fn decompress<R: Read, W: Write>(self, reader: R, mut writer: W) -> io::Result<u64> {
        let mut reader = BufReader::new(reader);
        let head = reader.fill_buf()?;
        self.check_signature(&head[..head.len().min(SIGNATURE_LEN)])
            .map_err(|reason| io::Error::new(io::ErrorKind::InvalidData, reason))?;
        let mut decoder = self.decoder(reader);
        io::copy(&mut decoder, &mut writer)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ArchiveError::UnsupportedAlgorithm(s.to_string()))
    }
}

pub enum Encoder<W: Write> {
    Gzip(GzEncoder<W>),
    Zlib(ZlibEncoder<W>),
    Bz2(BzEncoder<W>),
    Lzma(XzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Flush the trailer and hand back the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Gzip(e) => e.finish(),
            Encoder::Zlib(e) => e.finish(),
            Encoder::Bz2(e) => e.finish(),
            Encoder::Lzma(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Zlib(e) => e.write(buf),
            Encoder::Bz2(e) => e.write(buf),
            Encoder::Lzma(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Gzip(e) => e.flush(),
            Encoder::Zlib(e) => e.flush(),
            Encoder::Bz2(e) => e.flush(),
            Encoder::Lzma(e) => e.flush(),
        }
    }
}

pub enum Decoder<R: BufRead> {
    Gzip(MultiGzDecoder<R>),
    Zlib(ZlibDecoder<R>),
    Bz2(MultiBzDecoder<R>),
    Lzma(XzDecoder<R>),
}

impl<R: BufRead> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Gzip(d) => d.read(buf),
            Decoder::Zlib(d) => d.read(buf),
            Decoder::Bz2(d) => d.read(buf),
            Decoder::Lzma(d) => d.read(buf),
        }
    }
}
