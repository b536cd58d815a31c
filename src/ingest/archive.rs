//! Keyed on-disk archive of the raw fetch results.
//!
//! The archive is a MessagePack map with one key per parallel sequence
//! (`settlement_codes`, `municipality_codes`, `radon_indices`), so it can
//! be inspected with any msgpack tool and reloaded without re-fetching.

use std::fs;
use std::path::Path;

use crate::model::{PipelineError, RadonArchive};

/// Write the archive as a named-field MessagePack map.
pub fn save_archive(path: &Path, archive: &RadonArchive) -> Result<(), PipelineError> {
    archive.check_lengths()?;

    let bytes = rmp_serde::to_vec_named(archive)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Read an archive written by [`save_archive`].
///
/// Fails with `LengthMismatch` if the stored sequences are ragged.
pub fn load_archive(path: &Path) -> Result<RadonArchive, PipelineError> {
    let bytes = fs::read(path)?;
    let archive: RadonArchive = rmp_serde::from_slice(&bytes)?;
    archive.check_lengths()?;
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::tempdir;

    #[test]
    fn test_archive_survives_a_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("radondata.msgpack");

        let mut archive = RadonArchive::default();
        archive.push(Some("400190".into()), Some("529303".into()), Some(2.0));
        archive.push(None, Some("529311".into()), None);

        save_archive(&path, &archive).unwrap();
        let loaded = load_archive(&path).unwrap();
        assert_eq!(loaded, archive);
    }

    #[test]
    fn test_ragged_archive_on_disk_is_rejected() {
        #[derive(Serialize)]
        struct Ragged {
            settlement_codes: Vec<Option<String>>,
            municipality_codes: Vec<Option<String>>,
            radon_indices: Vec<Option<f64>>,
        }
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.msgpack");
        let ragged = Ragged {
            settlement_codes: vec![Some("1".into()), Some("2".into())],
            municipality_codes: vec![Some("10".into())],
            radon_indices: vec![Some(1.0), Some(2.0)],
        };
        fs::write(&path, rmp_serde::to_vec_named(&ragged).unwrap()).unwrap();

        assert!(matches!(
            load_archive(&path),
            Err(PipelineError::LengthMismatch(_))
        ));
    }

    #[test]
    fn test_missing_archive_is_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_archive(&dir.path().join("absent.msgpack")),
            Err(PipelineError::Io(_))
        ));
    }
}
