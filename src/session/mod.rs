//! Debugger session lifecycle: one engine process per dump path.

pub mod dump_session;
pub mod reaper;
pub mod registry;

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub use dump_session::DebuggerSession;
pub use registry::SessionRegistry;

/// Normalized dump file path used as the session identity key.
///
/// Relative paths are made absolute and existing files are canonicalized,
/// so two spellings of the same file share a session. Canonical paths never
/// carry the Windows `\\?\` verbatim prefix, which cdb does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DumpPath(PathBuf);

impl DumpPath {
    /// Normalize `raw` into a session key.
    #[must_use]
    pub fn new(raw: impl AsRef<Path>) -> Self {
        let raw = raw.as_ref();
        let absolute = std::path::absolute(raw).unwrap_or_else(|_| raw.to_path_buf());
        // Files that do not exist yet keep their absolute spelling.
        Self(dunce::canonicalize(&absolute).unwrap_or(absolute))
    }

    /// Borrow the normalized path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl Display for DumpPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
