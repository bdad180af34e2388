//! Precompiled class store.
//!
//! `kiln precompile` writes one artifact per class; production mode
//! loads the whole store read-only at startup and never compiles.
//! An artifact is the encoded enhanced image, named
//! `<class>.class` (class names contain no path separators, so the
//! name maps straight onto a file name).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bytecode::{ClassImage, ImageError, decode_image, encode_image};
use crate::core::ClassName;

/// File extension for precompiled class images.
pub const ARTIFACT_EXT: &str = "class";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no precompiled store at `{0}`")]
    Missing(PathBuf),

    #[error("precompiled store at `{0}` holds no artifacts")]
    Empty(PathBuf),

    #[error("IO error on `{0}`")]
    Io(PathBuf, #[source] io::Error),

    #[error("artifact `{path}` is not a valid class image")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("artifact `{path}` declares `{declared}`, expected `{expected}`")]
    Mismatched {
        path: PathBuf,
        declared: ClassName,
        expected: ClassName,
    },

    #[error("encoding `{class}` failed")]
    Encode {
        class: ClassName,
        #[source]
        source: ImageError,
    },
}

// ============================================================================
// Store
// ============================================================================

/// Artifact file for a class under `dir`.
pub fn artifact_path(dir: &Path, name: &ClassName) -> PathBuf {
    dir.join(format!("{name}.{ARTIFACT_EXT}"))
}

/// Write one artifact per image. Returns the number written.
pub fn write_artifacts(dir: &Path, images: &[ClassImage]) -> Result<usize, ArtifactError> {
    fs::create_dir_all(dir).map_err(|err| ArtifactError::Io(dir.to_path_buf(), err))?;
    for image in images {
        let bytes = encode_image(image).map_err(|source| ArtifactError::Encode {
            class: image.name.clone(),
            source,
        })?;
        let path = artifact_path(dir, &image.name);
        fs::write(&path, bytes).map_err(|err| ArtifactError::Io(path, err))?;
    }
    Ok(images.len())
}

/// Load every artifact under `dir`, sorted by class name.
///
/// Every failure is final: production mode must not start from a
/// partial store. Files with other extensions are ignored.
pub fn load_artifacts(dir: &Path) -> Result<Vec<ClassImage>, ArtifactError> {
    if !dir.is_dir() {
        return Err(ArtifactError::Missing(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|err| ArtifactError::Io(dir.to_path_buf(), err))?;
    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ArtifactError::Io(dir.to_path_buf(), err))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(ARTIFACT_EXT) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let expected = ClassName::from(stem);

        let bytes = fs::read(&path).map_err(|err| ArtifactError::Io(path.clone(), err))?;
        let image = decode_image(&bytes).map_err(|source| ArtifactError::Invalid {
            path: path.clone(),
            source,
        })?;

        // The file name is the store's index; a disagreeing payload
        // means the store was tampered with or miscopied.
        if image.name != expected {
            return Err(ArtifactError::Mismatched {
                path,
                declared: image.name,
                expected,
            });
        }
        images.push(image);
    }

    if images.is_empty() {
        return Err(ArtifactError::Empty(dir.to_path_buf()));
    }
    images.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(images)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn image_of(name: &str) -> ClassImage {
        ClassImage::new(ClassName::from(name), Some(ClassName::from("kiln.Model")))
    }

    #[test]
    fn test_write_then_load_roundtrips_sorted() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("precompiled");
        let images = vec![image_of("demo.User"), image_of("demo.Post")];

        let written = write_artifacts(&store, &images).unwrap();
        assert_eq!(written, 2);

        let loaded = load_artifacts(&store).unwrap();
        let names: Vec<_> = loaded.iter().map(|i| i.name.to_string()).collect();
        assert_eq!(names, ["demo.Post", "demo.User"]);
        assert_eq!(
            loaded[0].superclass,
            Some(ClassName::from("kiln.Model"))
        );
    }

    #[test]
    fn test_missing_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_artifacts(&dir.path().join("precompiled")).unwrap_err();
        assert!(matches!(err, ArtifactError::Missing(_)));
    }

    #[test]
    fn test_empty_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.txt"), "not an artifact").unwrap();

        let err = load_artifacts(dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Empty(_)));
    }

    #[test]
    fn test_renamed_artifact_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_artifacts(dir.path(), &[image_of("demo.Post")]).unwrap();
        std::fs::rename(
            artifact_path(dir.path(), &ClassName::from("demo.Post")),
            artifact_path(dir.path(), &ClassName::from("demo.User")),
        )
        .unwrap();

        let err = load_artifacts(dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Mismatched { .. }));
    }

    #[test]
    fn test_corrupt_artifact_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("demo.Bad.class"), b"garbage").unwrap();

        let err = load_artifacts(dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid { .. }));
    }
}
