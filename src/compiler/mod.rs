//! Batch compilation of application sources.
//!
//! The compiler is all-or-nothing: a batch either produces images for
//! every requested unit or rejects wholesale with the complete ordered
//! diagnostic list. Partial output never reaches the cache, so one
//! broken file can not leave the class set half-updated.
//!
//! Modules:
//! - [`diagnostics`]: spans, diagnostics, [`CompileFailure`]
//! - [`unitc`]: the unit-language backend
//!
//! [`BatchCompiler`] is the front door: it captures freshness stamps,
//! reads sources, drives a [`CompilerBackend`] and encodes the
//! resulting images.

pub mod diagnostics;
pub mod unitc;

pub use diagnostics::{CompileFailure, Diagnostic, SourceSpan};
pub use unitc::UnitCompiler;

use std::path::PathBuf;

use thiserror::Error;

use crate::bytecode::{self, ClassImage, ImageError};
use crate::core::ClassName;
use crate::freshness::SourceStamp;

/// One source file handed to a backend.
pub struct SourceUnit {
    /// Expected primary class (derived from the path under its root).
    pub name: ClassName,
    pub path: PathBuf,
    pub text: String,
}

/// A compiled class with its encoded raw image.
#[derive(Debug)]
pub struct CompiledClass {
    pub image: ClassImage,
    pub bytes: Vec<u8>,
}

/// All classes produced from one source unit, oldest declaration first.
#[derive(Debug)]
pub struct CompiledUnit {
    pub name: ClassName,
    pub path: PathBuf,
    /// Source identity captured before the text was read.
    pub stamp: SourceStamp,
    pub classes: Vec<CompiledClass>,
}

/// A compiler backend turns a batch of sources into class images.
///
/// `is_known` answers for classes outside the batch (platform classes,
/// previously compiled application classes). Implementations must
/// return per-unit image lists aligned with the input order, or a
/// [`CompileFailure`] covering every error in the batch.
pub trait CompilerBackend: Send + Sync {
    fn compile_batch(
        &self,
        units: &[SourceUnit],
        is_known: &dyn Fn(&ClassName) -> bool,
    ) -> Result<Vec<Vec<ClassImage>>, CompileFailure>;
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Failure(#[from] CompileFailure),

    #[error("failed to encode image for `{class}`: {source}")]
    Encode { class: ClassName, source: ImageError },
}

/// Stamps, reads, compiles and encodes a batch of units.
pub struct BatchCompiler<B = UnitCompiler> {
    backend: B,
}

impl BatchCompiler<UnitCompiler> {
    pub fn new() -> Self {
        Self {
            backend: UnitCompiler::new(),
        }
    }
}

impl Default for BatchCompiler<UnitCompiler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: CompilerBackend> BatchCompiler<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// Compile `requests` (primary class name, source path) as one batch.
    ///
    /// Each unit's stamp is captured before its text is read: a write
    /// racing the read leaves the stamp mismatched with the file, so
    /// the next sweep marks the unit stale again instead of losing the
    /// edit. An unreadable source rejects the batch like a syntax error
    /// would.
    pub fn compile(
        &self,
        requests: &[(ClassName, PathBuf)],
        is_known: &dyn Fn(&ClassName) -> bool,
    ) -> Result<Vec<CompiledUnit>, CompileError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut units = Vec::with_capacity(requests.len());
        let mut stamps = Vec::with_capacity(requests.len());
        let mut diagnostics = Vec::new();
        for (name, path) in requests {
            let stamp = SourceStamp::capture(path);
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    stamps.push(stamp);
                    units.push(SourceUnit {
                        name: name.clone(),
                        path: path.clone(),
                        text,
                    });
                }
                Err(e) => diagnostics.push(Diagnostic::new(
                    path.clone(),
                    SourceSpan::new(1, 1, 1),
                    format!("cannot read source: {e}"),
                    None,
                )),
            }
        }
        if !diagnostics.is_empty() {
            return Err(CompileFailure::new(diagnostics).into());
        }

        let images = self.backend.compile_batch(&units, is_known)?;

        let mut compiled = Vec::with_capacity(units.len());
        for ((unit, stamp), classes) in units.into_iter().zip(stamps).zip(images) {
            let mut out = Vec::with_capacity(classes.len());
            for image in classes {
                let bytes = bytecode::encode_image(&image).map_err(|source| {
                    CompileError::Encode {
                        class: image.name.clone(),
                        source,
                    }
                })?;
                out.push(CompiledClass { image, bytes });
            }
            compiled.push(CompiledUnit {
                name: unit.name,
                path: unit.path,
                stamp,
                classes: out,
            });
        }
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_unit(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn no_externals(_: &ClassName) -> bool {
        false
    }

    #[test]
    fn test_compile_batch_from_disk() {
        let dir = TempDir::new().unwrap();
        let a = write_unit(
            dir.path(),
            "demo/A.unit",
            "class demo.A\nmethod m() = demo.B.text()\n",
        );
        let b = write_unit(dir.path(), "demo/B.unit", "class demo.B\nmethod text() = \"b\"\n");

        let compiler = BatchCompiler::new();
        let compiled = compiler
            .compile(
                &[
                    (ClassName::new("demo.A"), a.clone()),
                    (ClassName::new("demo.B"), b),
                ],
                &no_externals,
            )
            .unwrap();

        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[0].name, ClassName::new("demo.A"));
        assert!(compiled[0].stamp.is_current(&a));

        // Encoded bytes decode back to the image
        let decoded = bytecode::decode_image(&compiled[1].classes[0].bytes).unwrap();
        assert_eq!(decoded, compiled[1].classes[0].image);
    }

    #[test]
    fn test_missing_source_rejects_batch() {
        let dir = TempDir::new().unwrap();
        let a = write_unit(dir.path(), "demo/A.unit", "class demo.A\n");

        let compiler = BatchCompiler::new();
        let err = compiler
            .compile(
                &[
                    (ClassName::new("demo.A"), a),
                    (ClassName::new("demo.Gone"), dir.path().join("demo/Gone.unit")),
                ],
                &no_externals,
            )
            .unwrap_err();

        let CompileError::Failure(failure) = err else {
            panic!("expected compile failure");
        };
        assert!(failure.diagnostics[0].message.starts_with("cannot read source"));
    }

    #[test]
    fn test_empty_request_is_noop() {
        let compiler = BatchCompiler::new();
        assert!(compiler.compile(&[], &no_externals).unwrap().is_empty());
    }

    /// Backend that rejects every unit it is handed.
    struct RejectingBackend;

    impl CompilerBackend for RejectingBackend {
        fn compile_batch(
            &self,
            units: &[SourceUnit],
            _is_known: &dyn Fn(&ClassName) -> bool,
        ) -> Result<Vec<Vec<ClassImage>>, CompileFailure> {
            let diagnostics = units
                .iter()
                .map(|unit| {
                    Diagnostic::new(
                        unit.path.clone(),
                        SourceSpan::new(1, 1, 1),
                        "rejected".to_string(),
                        None,
                    )
                })
                .collect();
            Err(CompileFailure::new(diagnostics))
        }
    }

    #[test]
    fn test_backend_rejection_surfaces_every_diagnostic() {
        let dir = TempDir::new().unwrap();
        let a = write_unit(dir.path(), "demo/A.unit", "class demo.A\n");
        let b = write_unit(dir.path(), "demo/B.unit", "class demo.B\n");

        let compiler = BatchCompiler::with_backend(RejectingBackend);
        let err = compiler
            .compile(
                &[(ClassName::new("demo.A"), a), (ClassName::new("demo.B"), b)],
                &no_externals,
            )
            .unwrap_err();

        let CompileError::Failure(failure) = err else {
            panic!("expected compile failure");
        };
        assert_eq!(failure.diagnostics.len(), 2);
        assert!(failure.diagnostics.iter().all(|d| d.message == "rejected"));
    }
}
