//! Input artifacts.
//!
//! A [`Source`] is the identity of one input to the build: a name used in
//! diagnostics, a parent path, a MIME type and lazily materialized bytes. The
//! core never cares where the bytes came from (a file, a library entry, or
//! generated in memory).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::SourceError;

/// MIME types understood by the bundled sub-compilers and the facade.
pub mod mime {
    pub const ABC: &str = "application/x-abc";
    pub const PROPERTIES: &str = "text/x-properties";
    pub const ACTIONSCRIPT: &str = "text/x-actionscript";
    pub const MXML: &str = "text/x-mxml";
    pub const CSS: &str = "text/css";

    /// Map a file extension (without the dot) to a MIME type.
    pub fn from_extension(ext: &str) -> Option<&'static str> {
        match ext.to_ascii_lowercase().as_str() {
            "abc" => Some(ABC),
            "properties" => Some(PROPERTIES),
            "as" => Some(ACTIONSCRIPT),
            "mxml" => Some(MXML),
            "css" => Some(CSS),
            _ => None,
        }
    }
}

type Generator = dyn Fn() -> std::io::Result<Vec<u8>> + Send + Sync;

enum Content {
    Bytes(Arc<[u8]>),
    File(PathBuf),
    Generated(Box<Generator>),
}

struct SourceInner {
    name: String,
    parent: String,
    mime_type: String,
    content: Content,
    cache: OnceLock<Arc<[u8]>>,
}

/// Identity and content of one input artifact.
///
/// Cloning is cheap; clones share identity and the content cache. Two sources
/// are equal when their names are equal.
#[derive(Clone)]
pub struct Source {
    inner: Arc<SourceInner>,
}

impl Source {
    fn with_content(
        name: impl Into<String>,
        parent: impl Into<String>,
        mime_type: impl Into<String>,
        content: Content,
    ) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                name: name.into(),
                parent: parent.into(),
                mime_type: mime_type.into(),
                content,
                cache: OnceLock::new(),
            }),
        }
    }

    /// Create a source backed by in-memory bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        parent: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes: Arc<[u8]> = bytes.into().into();
        Self::with_content(name, parent, mime_type, Content::Bytes(bytes))
    }

    /// Create a source backed by a file, read on first use.
    ///
    /// The parent is the file's directory and the MIME type is derived from its
    /// extension unless given.
    pub fn from_path(path: impl AsRef<Path>, mime_type: Option<&str>) -> Self {
        let path = path.as_ref();
        let parent = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_type
            .or_else(|| path.extension().and_then(|e| mime::from_extension(&e.to_string_lossy())))
            .unwrap_or("application/octet-stream");
        Self::with_content(
            path.to_string_lossy().into_owned(),
            parent,
            mime,
            Content::File(path.to_path_buf()),
        )
    }

    /// Create a source whose bytes are produced by a callback on first use.
    pub fn generated<F>(
        name: impl Into<String>,
        parent: impl Into<String>,
        mime_type: impl Into<String>,
        generator: F,
    ) -> Self
    where
        F: Fn() -> std::io::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self::with_content(name, parent, mime_type, Content::Generated(Box::new(generator)))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name used when reporting diagnostics against this source.
    pub fn name_for_reporting(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> &str {
        &self.inner.parent
    }

    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    /// File stem of the source name (`core` for `locale/en_US/core.properties`).
    pub fn short_name(&self) -> &str {
        let name = self.inner.name.as_str();
        let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
        file.rsplit_once('.').map_or(file, |(stem, _)| stem)
    }

    /// Materialize the byte content, reading it at most once.
    pub fn to_byte_array(&self) -> Result<Arc<[u8]>, SourceError> {
        if let Some(bytes) = self.inner.cache.get() {
            return Ok(Arc::clone(bytes));
        }

        let bytes: Arc<[u8]> = match &self.inner.content {
            Content::Bytes(bytes) => Arc::clone(bytes),
            Content::File(path) => std::fs::read(path)
                .map_err(|e| SourceError::Io {
                    name: self.inner.name.clone(),
                    source: e,
                })?
                .into(),
            Content::Generated(generate) => generate()
                .map_err(|e| SourceError::Io {
                    name: self.inner.name.clone(),
                    source: e,
                })?
                .into(),
        };

        Ok(Arc::clone(self.inner.cache.get_or_init(|| bytes)))
    }

    /// Check whether two handles refer to the same artifact instance.
    pub fn ptr_eq(&self, other: &Source) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for Source {}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.inner.name)
            .field("mime_type", &self.inner.mime_type)
            .finish()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn bytes_source() {
        let source = Source::from_bytes("lib/A.abc", "lib", mime::ABC, vec![1, 2, 3]);
        assert_eq!(source.name(), "lib/A.abc");
        assert_eq!(source.parent(), "lib");
        assert_eq!(source.mime_type(), mime::ABC);
        assert_eq!(&*source.to_byte_array().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn generated_content_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = Source::generated("gen.abc", "", mime::ABC, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![9])
        });

        source.to_byte_array().unwrap();
        source.clone().to_byte_array().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let source = Source::from_path("/nonexistent/dir/Missing.abc", None);
        assert_eq!(source.mime_type(), mime::ABC);
        assert!(matches!(
            source.to_byte_array(),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn short_name_strips_directory_and_extension() {
        let source = Source::from_bytes("locale/en_US/core.properties", "locale/en_US", mime::PROPERTIES, "");
        assert_eq!(source.short_name(), "core");
    }

    #[test]
    fn equality_is_by_name() {
        let a = Source::from_bytes("A.abc", "", mime::ABC, vec![1]);
        let b = Source::from_bytes("A.abc", "", mime::ABC, vec![2]);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime::from_extension("ABC"), Some(mime::ABC));
        assert_eq!(mime::from_extension("txt"), None);
    }
}
