use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::borrow::Cow;
use std::io::{self, Read, Write};

/// Bytes chosen for the data region and whether they are deflated.
pub struct Stored<'a> {
    pub bytes: Cow<'a, [u8]>,
    pub is_compressed: bool,
}

/// Deflate at maximum level and keep the result only if it is strictly
/// smaller than the input.
pub fn compress_policy(raw: &[u8]) -> io::Result<Stored<'_>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(raw)?;
    let compressed = encoder.finish()?;

    if compressed.len() < raw.len() {
        Ok(Stored {
            bytes: Cow::Owned(compressed),
            is_compressed: true,
        })
    } else {
        Ok(Stored {
            bytes: Cow::Borrowed(raw),
            is_compressed: false,
        })
    }
}

/// Inflate `data`, reading at most `limit` output bytes.
pub fn inflate(data: &[u8], limit: u64) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data).take(limit).read_to_end(&mut out)?;
    Ok(out)
}
