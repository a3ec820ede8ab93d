//! Content checksums for tamper detection

use std::borrow::Cow;

use sha2::{Digest, Sha256};

/// SHA-256 of migration text, lowercase hex (64 chars)
///
/// A leading UTF-8 BOM is dropped and CRLF line endings are hashed as LF, so a
/// file checked out on Windows and on Unix produces the same checksum.
pub fn checksum(content: &str) -> String {
    let normalized = normalize(content);

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize(content: &str) -> Cow<'_, str> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.contains("\r\n") {
        Cow::Owned(content.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            checksum("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_deterministic() {
        let sql = "CREATE TABLE foo (id INTEGER);\nGO\n";
        assert_eq!(checksum(sql), checksum(sql));
        assert_eq!(checksum(sql).len(), 64);
    }

    #[test]
    fn test_single_byte_change_detected() {
        assert_ne!(
            checksum("CREATE TABLE foo (id INTEGER);"),
            checksum("CREATE TABLE foo (id INTEGEr);")
        );
    }

    #[test]
    fn test_line_endings_and_bom_normalized() {
        let unix = "SELECT 1;\nSELECT 2;\n";
        let windows = "SELECT 1;\r\nSELECT 2;\r\n";
        let with_bom = "\u{feff}SELECT 1;\nSELECT 2;\n";
        assert_eq!(checksum(unix), checksum(windows));
        assert_eq!(checksum(unix), checksum(with_bom));
    }
}
