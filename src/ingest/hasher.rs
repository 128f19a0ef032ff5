use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Hex-encoded SHA-256 of a file's contents.
pub fn calculate_hash(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0; 8192];
    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pre_001.png");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            calculate_hash(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(calculate_hash(Path::new("/nonexistent/pre_001.png")).is_err());
    }
}
