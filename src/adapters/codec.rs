use anyhow::{anyhow, bail};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Compress an outbound body for partners that accept gzip
pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(1024), Compression::fast());
    encoder.write_all(data)?;

    Ok(encoder.finish()?)
}

/// Decompress a partner body with a hard cap on the inflated size.
/// Compression bombs land as errors, not allocations
pub fn gzip_decompress(data: &[u8], max_len: usize) -> Result<Vec<u8>, anyhow::Error> {
    let mut decoder = GzDecoder::new(data).take(max_len as u64 + 1);
    let mut out = Vec::with_capacity(data.len() * 4);

    decoder
        .read_to_end(&mut out)
        .map_err(|e| anyhow!("gzip decode failed: {}", e))?;

    if out.len() > max_len {
        bail!("decompressed body exceeds {} byte cap", max_len);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let payload = br#"{"id":"auction-1","seatbid":[]}"#;

        let compressed = gzip_compress(payload).unwrap();
        let restored = gzip_decompress(&compressed, 1024).unwrap();

        assert_eq!(restored, payload);
    }

    #[test]
    fn test_decompress_cap_enforced() {
        let big = vec![b'a'; 64 * 1024];
        let compressed = gzip_compress(&big).unwrap();

        assert!(gzip_decompress(&compressed, 1024).is_err());
        assert!(gzip_decompress(&compressed, 64 * 1024).is_ok());
    }

    #[test]
    fn test_garbage_input_errors() {
        assert!(gzip_decompress(b"definitely not gzip", 1024).is_err());
    }
}
