use std::io::{self, Read};

use super::Decompressor;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Zstandard frames, through the `zstd` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZstdDecompressor;

impl Decompressor for ZstdDecompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn matches(&self, prefix: &[u8]) -> bool {
        prefix.starts_with(&ZSTD_MAGIC)
    }

    fn decompress<'a>(&self, input: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(zstd::stream::read::Decoder::new(input)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn decodes_frame() {
        let packed = zstd::encode_all(Cursor::new(b"payload".to_vec()), 3).unwrap();
        assert!(ZstdDecompressor.matches(&packed));
        assert!(!ZstdDecompressor.matches(b"PK\x03\x04"));

        let mut out = Vec::new();
        ZstdDecompressor
            .decompress(Box::new(Cursor::new(packed)))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"payload");
    }
}
