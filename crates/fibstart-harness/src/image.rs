//! Program image loading.
//!
//! [`ProgramImage`] wraps a compiled Wasmtime [`Module`] built from a
//! freestanding image: binary `.wasm` produced by the `wasm32` build of the
//! image crate, or WAT text for fixtures.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, instrument};
use wasmtime::{Engine, ExternType, Module};

use fibstart_common::HarnessError;

/// A compiled program image.
///
/// Cheap to clone; the underlying module is reference counted.
#[derive(Clone)]
pub struct ProgramImage {
    module: Module,

    /// Hash of the source bytes.
    content_hash: String,
}

impl ProgramImage {
    /// Compile an image from WebAssembly binary bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or compilation fails.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, HarnessError> {
        Self::validate_wasm_header(bytes)?;
        Self::compile(engine, bytes, "binary")
    }

    /// Compile an image from WAT (WebAssembly Text Format).
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or compile.
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, HarnessError> {
        Self::compile(engine, wat.as_bytes(), "text")
    }

    /// Load an image from disk. Files ending in `.wat` are parsed as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or compiled.
    #[instrument(skip(engine, path), fields(path = %path.as_ref().display()))]
    pub fn from_file(engine: &Engine, path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;

        debug!(bytes_len = bytes.len(), "Image file read");

        if path.extension().is_some_and(|ext| ext == "wat") {
            let text = std::str::from_utf8(&bytes)
                .map_err(|e| HarnessError::invalid_image(format!("WAT is not UTF-8: {e}")))?;
            Self::from_wat(engine, text)
        } else {
            Self::from_bytes(engine, &bytes)
        }
    }

    fn compile(engine: &Engine, bytes: &[u8], format: &str) -> Result<Self, HarnessError> {
        let start = Instant::now();

        let module = Module::new(engine, bytes)
            .map_err(|e| HarnessError::invalid_image(format!("Compilation failed: {e}")))?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            format,
            duration_ms = start.elapsed().as_millis(),
            "Image compiled"
        );

        Ok(Self {
            module,
            content_hash,
        })
    }

    /// Get the inner Wasmtime module.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Get the content hash of the source bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Check that `name` is exported as a function.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingExport`] otherwise.
    pub fn require_func(&self, name: &str) -> Result<(), HarnessError> {
        match self.module.get_export(name) {
            Some(ExternType::Func(_)) => Ok(()),
            _ => Err(HarnessError::missing_export(name)),
        }
    }

    /// Validate WebAssembly header (magic number and version).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), HarnessError> {
        if bytes.len() < 8 {
            return Err(HarnessError::invalid_image("file too small"));
        }

        // Check magic number: \0asm
        if &bytes[0..4] != b"\0asm" {
            return Err(HarnessError::invalid_image("bad magic number"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for ProgramImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramImage")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HarnessEngine;
    use fibstart_common::EngineConfig;

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    fn engine() -> HarnessEngine {
        HarnessEngine::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_validate_wasm_header_valid() {
        assert!(ProgramImage::validate_wasm_header(MINIMAL_WASM).is_ok());
    }

    #[test]
    fn test_validate_wasm_header_too_small() {
        let result = ProgramImage::validate_wasm_header(&[0x00, 0x61]);
        assert!(matches!(result, Err(HarnessError::InvalidImage { .. })));
    }

    #[test]
    fn test_validate_wasm_header_bad_magic() {
        let bad_wasm = &[0x7f, b'E', b'L', b'F', 0x01, 0x00, 0x00, 0x00];
        let result = ProgramImage::validate_wasm_header(bad_wasm);
        assert!(matches!(result, Err(HarnessError::InvalidImage { .. })));
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16); // 64-bit hex
    }

    #[test]
    fn test_image_from_bytes() {
        let engine = engine();
        let image = ProgramImage::from_bytes(engine.inner(), MINIMAL_WASM).unwrap();

        assert_eq!(image.module().exports().count(), 0);
        assert!(!image.content_hash().is_empty());
    }

    #[test]
    fn test_require_func() {
        let engine = engine();
        let image = ProgramImage::from_wat(
            engine.inner(),
            r#"(module
                (memory (export "memory") 1)
                (func (export "_start")))"#,
        )
        .unwrap();

        assert!(image.require_func("_start").is_ok());
        assert!(matches!(
            image.require_func("memory"),
            Err(HarnessError::MissingExport { .. })
        ));
        assert!(matches!(
            image.require_func("fibonacci"),
            Err(HarnessError::MissingExport { .. })
        ));
    }

    #[test]
    fn test_invalid_wat() {
        let engine = engine();
        let result = ProgramImage::from_wat(engine.inner(), "(module (func (export");
        assert!(matches!(result, Err(HarnessError::InvalidImage { .. })));
    }

    #[test]
    fn test_image_debug() {
        let engine = engine();
        let image = ProgramImage::from_bytes(engine.inner(), MINIMAL_WASM).unwrap();

        let debug_str = format!("{image:?}");
        assert!(debug_str.contains("ProgramImage"));
        assert!(debug_str.contains("content_hash"));
    }
}
