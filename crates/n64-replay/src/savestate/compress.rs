/// Gzip wrapping for file-backed savestates.
///
/// Files written by older builds may be stored raw, so `decompress` passes
/// through anything that does not start with the gzip magic.
use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::StateError;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// First guess at the decompressed size: a typical state with screenshot.
const INITIAL_CAPACITY: usize = 0xB6_24F0;

/// Refuse to inflate past this; no valid state comes close.
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>, StateError> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity(data.len() / 4),
        Compression::new(level.min(9)),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate `data` if it is gzip, otherwise return it untouched.
pub fn decompress(data: &[u8]) -> Result<Cow<'_, [u8]>, StateError> {
    if !is_compressed(data) {
        log::debug!("[ST] Savestate is not compressed");
        return Ok(Cow::Borrowed(data));
    }

    let mut out = Vec::with_capacity(INITIAL_CAPACITY);
    GzDecoder::new(data)
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| StateError::Decompression(e.to_string()))?;

    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(StateError::Decompression(format!(
            "output exceeds {} bytes",
            MAX_DECOMPRESSED_SIZE
        )));
    }
    if out.is_empty() {
        return Err(StateError::Decompression("empty output".to_string()));
    }

    log::debug!("[ST] Decompressed {} -> {} bytes", data.len(), out.len());
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trip() {
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let packed = compress(&data, 6).expect("compress");
        assert!(is_compressed(&packed));
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).expect("decompress").as_ref(), &data[..]);
    }

    #[test]
    fn decompress_is_idempotent_on_raw_data() {
        let raw = b"not gzip at all".to_vec();
        let once = decompress(&raw).expect("pass through").into_owned();
        let twice = decompress(&once).expect("pass through").into_owned();
        assert_eq!(once, raw);
        assert_eq!(twice, once);
    }

    #[test]
    fn single_magic_byte_is_not_gzip() {
        // Only a full two-byte magic counts as compressed.
        let data = [0x1F, 0x00, 0x01];
        assert!(!is_compressed(&data));
        assert_eq!(decompress(&data).unwrap().as_ref(), &data);
    }

    #[test]
    fn corrupt_gzip_is_an_error() {
        let mut packed = compress(&[7u8; 4096], 6).unwrap();
        let mid = packed.len() / 2;
        packed.truncate(mid);
        assert!(matches!(
            decompress(&packed),
            Err(StateError::Decompression(_))
        ));
    }
}
