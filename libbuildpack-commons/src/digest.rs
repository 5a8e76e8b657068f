use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;

/// Obtains the SHA256 checksum of a file as a hex string
///
/// # Examples
/// ```
/// use libbuildpack_commons::digest::sha256;
/// use std::fs::write;
/// use tempfile::tempdir;
///
/// let temp_dir = tempdir().unwrap();
/// let temp_file = temp_dir.path().join("test.txt");
///
/// write(&temp_file, "Hello World!").unwrap();
/// let sha256_sum = sha256(&temp_file).unwrap();
/// assert_eq!(sha256_sum, "7f83b1657ff1fc53b92dc18148a1d65dfc2d4b1fa3d677284addd200126d9069");
/// ```
pub fn sha256(path: impl AsRef<Path>) -> Result<String, io::Error> {
    let mut hasher = Sha256Hasher::new();
    hasher.update_file(path)?;
    Ok(hasher.finish_hex())
}

/// Incrementally hashes strings and file contents into a single SHA256 digest.
///
/// Inputs are concatenated without any delimiter.
#[derive(Debug, Clone, Default)]
pub struct Sha256Hasher(Sha256);

impl Sha256Hasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        Digest::update(&mut self.0, data.as_ref());
    }

    /// Streams the contents of a file into the digest.
    pub fn update_file(&mut self, path: impl AsRef<Path>) -> Result<(), io::Error> {
        let mut file = fs::File::open(path.as_ref())?;
        io::copy(&mut file, &mut self.0)?;
        Ok(())
    }

    #[must_use]
    pub fn finish_hex(self) -> String {
        hex::encode(self.0.finalize())
    }
}
