use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use crate::errors::DbError;

fn is_deflated(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("deflate"))
}

/// Opens `path` for reading, inflating zlib streams for `.deflate` files.
///
/// # Errors
/// Returns `Io` if the file cannot be opened.
pub fn open_input(path: &Path) -> Result<Box<dyn Read>, DbError> {
    let file = BufReader::new(File::open(path)?);
    if is_deflated(path) {
        Ok(Box::new(ZlibDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Copies the inflated content of `path` to `out`. Returns the bytes written.
///
/// # Errors
/// Returns `Io` on read, decompression or write failures.
pub fn inflate_to<W: Write>(out: &mut W, path: &Path) -> Result<u64, DbError> {
    let mut input = open_input(path)?;
    Ok(io::copy(&mut input, out)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    #[test]
    fn inflates_deflate_files_and_passes_plain_ones() {
        let dir = tempfile::tempdir().unwrap();
        let text = b"url1,12,3\nurl2,150,4\n";
        let packed = dir.path().join("000000_0.deflate");
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(text).unwrap();
        std::fs::write(&packed, enc.finish().unwrap()).unwrap();
        let plain = dir.path().join("rankings.csv");
        std::fs::write(&plain, text).unwrap();

        for p in [&packed, &plain] {
            let mut out = Vec::new();
            assert_eq!(inflate_to(&mut out, p).unwrap(), text.len() as u64);
            assert_eq!(out, text);
        }
    }
}
