//! Bounded file input and owner-only file output

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use crate::config::MAX_INPUT_SIZE;
use crate::error::{TpmKeysError, TpmKeysResult};

/// Reads a whole file, or stdin when `path` is `-`, up to [`MAX_INPUT_SIZE`].
pub fn read_input(path: &Path) -> TpmKeysResult<Vec<u8>> {
    let io_err = |source| TpmKeysError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut data = Vec::new();
    if path == Path::new("-") {
        io::stdin()
            .lock()
            .take(MAX_INPUT_SIZE + 1)
            .read_to_end(&mut data)
            .map_err(io_err)?;
    } else {
        fs::File::open(path)
            .map_err(io_err)?
            .take(MAX_INPUT_SIZE + 1)
            .read_to_end(&mut data)
            .map_err(io_err)?;
    }
    if data.len() as u64 > MAX_INPUT_SIZE {
        return Err(TpmKeysError::PayloadTooLarge {
            size: data.len(),
            max: MAX_INPUT_SIZE as usize,
        });
    }
    Ok(data)
}

/// Writes key material readable only by the owner.
pub fn write_secret(path: &Path, data: &[u8]) -> TpmKeysResult<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let io_err = |source| TpmKeysError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(data).map_err(io_err)?;
    file.sync_all().map_err(io_err)
}

/// Writes non-secret output such as public keys and signatures.
pub fn write_public(path: &Path, data: &[u8]) -> TpmKeysResult<()> {
    fs::write(path, data).map_err(|source| TpmKeysError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn remove(path: &Path) -> TpmKeysResult<()> {
    fs::remove_file(path).map_err(|source| TpmKeysError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        write_secret(&path, b"secret").unwrap();
        assert_eq!(read_input(&path).unwrap(), b"secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_secret_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.tpm");
        write_secret(&path, b"k").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_oversized_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big");
        fs::write(&path, vec![0u8; MAX_INPUT_SIZE as usize + 1]).unwrap();
        assert!(matches!(
            read_input(&path),
            Err(TpmKeysError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_input(Path::new("/nonexistent/tpmkeys/input")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tpmkeys/input"));
    }
}
