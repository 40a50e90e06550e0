use bytes::{Bytes, BytesMut};
use compression_codecs::EncodeV2;
#[cfg(feature = "deflate")]
use compression_codecs::deflate::DeflateEncoder;
#[cfg(feature = "gzip")]
use compression_codecs::gzip::GzipEncoder;
#[cfg(any(feature = "gzip", feature = "deflate"))]
use compression_core::Level;
use compression_core::util::{PartialBuffer, WriteBuffer};
use std::collections::HashMap;
use std::io;

const OUTPUT_BUFFER_SIZE: usize = 8 * 1024; // 8KB scratch buffer

/// Compression algorithms a response can be encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// No compression; the body is passed through unmodified.
    None,
    /// Gzip compression.
    #[cfg(feature = "gzip")]
    Gzip,
    /// Deflate compression.
    #[cfg(feature = "deflate")]
    Deflate,
}

impl Algorithm {
    /// Returns the Content-Encoding header value for this algorithm.
    ///
    /// [`Algorithm::None`] has no token and returns `None`.
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Algorithm::None => None,
            #[cfg(feature = "gzip")]
            Algorithm::Gzip => Some("gzip"),
            #[cfg(feature = "deflate")]
            Algorithm::Deflate => Some("deflate"),
        }
    }

    fn encoder(&self) -> Option<Box<dyn EncodeV2 + Send>> {
        match self {
            Algorithm::None => None,
            #[cfg(feature = "gzip")]
            Algorithm::Gzip => Some(Box::new(GzipEncoder::new(Level::Default.into()))),
            #[cfg(feature = "deflate")]
            Algorithm::Deflate => Some(Box::new(DeflateEncoder::new(Level::Default.into()))),
        }
    }

    /// Compresses a complete buffer.
    ///
    /// The encoder is finished before returning, so the output carries any
    /// trailing codec state (the gzip checksum and length, for instance).
    /// [`Algorithm::None`] returns the input unchanged.
    pub fn compress(&self, input: &[u8]) -> io::Result<Bytes> {
        let Some(mut encoder) = self.encoder() else {
            return Ok(Bytes::copy_from_slice(input));
        };

        let mut scratch = vec![0u8; OUTPUT_BUFFER_SIZE];
        let mut compressed = BytesMut::new();
        let mut input_buf = PartialBuffer::new(input);

        while input_buf.written_len() < input.len() {
            let consumed = input_buf.written_len();
            let mut output = WriteBuffer::new_initialized(scratch.as_mut_slice());
            encoder.encode(&mut input_buf, &mut output)?;

            let written = output.written_len();
            compressed.extend_from_slice(&scratch[..written]);

            if written == 0 && input_buf.written_len() == consumed {
                return Err(io::Error::other("encoder made no progress"));
            }
        }

        loop {
            let mut output = WriteBuffer::new_initialized(scratch.as_mut_slice());
            let done = encoder.finish(&mut output)?;

            let written = output.written_len();
            compressed.extend_from_slice(&scratch[..written]);

            if done {
                break;
            }
        }

        Ok(compressed.freeze())
    }
}

/// Maps lowercase `Accept-Encoding` tokens to algorithms.
///
/// The empty token always maps to [`Algorithm::None`], which is what
/// negotiation falls back to when no listed token is supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmTable {
    entries: HashMap<&'static str, Algorithm>,
}

impl AlgorithmTable {
    /// Builds a table supporting the given algorithms.
    pub fn new<I>(algorithms: I) -> Self
    where
        I: IntoIterator<Item = Algorithm>,
    {
        let mut entries = HashMap::new();
        entries.insert("", Algorithm::None);
        for algorithm in algorithms {
            if let Some(token) = algorithm.content_encoding() {
                entries.insert(token, algorithm);
            }
        }
        Self { entries }
    }

    /// Looks up the algorithm for a lowercase token.
    pub fn get(&self, token: &str) -> Option<Algorithm> {
        self.entries.get(token).copied()
    }

    /// Algorithm used when no listed token is supported.
    pub fn fallback(&self) -> Algorithm {
        self.get("").unwrap_or(Algorithm::None)
    }
}

impl Default for AlgorithmTable {
    /// Registers every algorithm enabled at compile time.
    fn default() -> Self {
        Self::new([
            #[cfg(feature = "gzip")]
            Algorithm::Gzip,
            #[cfg(feature = "deflate")]
            Algorithm::Deflate,
        ])
    }
}
