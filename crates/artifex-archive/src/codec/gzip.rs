use std::io::{self, Read};

use flate2::read::MultiGzDecoder;

use super::Decompressor;

/// Gzip, through flate2. Concatenated members decode as one stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct GzipDecompressor;

impl Decompressor for GzipDecompressor {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn matches(&self, prefix: &[u8]) -> bool {
        prefix.starts_with(&[0x1F, 0x8B])
    }

    fn decompress<'a>(&self, input: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(MultiGzDecoder::new(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use std::io::{Cursor, Write};

    #[test]
    fn decodes_concatenated_members() {
        let mut data = Vec::new();
        for part in ["hello ", "world"] {
            let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
            enc.write_all(part.as_bytes()).unwrap();
            data.extend(enc.finish().unwrap());
        }
        assert!(GzipDecompressor.matches(&data));

        let mut out = String::new();
        GzipDecompressor
            .decompress(Box::new(Cursor::new(data)))
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello world");
    }
}
