//! Library loading and the process-wide package cache.
//!
//! The engine resolves `import` statements through a [`Loader`]. The
//! default [`FsLoader`] searches the engine's libpath for
//! `<importpath>.rpl`; [`MemLoader`] serves sources from memory, for tests
//! and embedded hosts.
//!
//! Compiled packages are cached process-wide by importpath: re-importing
//! returns the cached environment, and the cache is shared between
//! engines (it is, besides the prelude, the only cross-engine state).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use rosie_lang::Environment;

/// A successfully loaded source unit.
#[derive(Clone, Debug)]
pub struct LoadedSource {
    /// Where the source came from, for diagnostics.
    pub origin: String,
    pub text: String,
}

/// Why a load failed.
#[derive(Clone, Debug)]
pub enum LoaderError {
    NotFound {
        importpath: String,
        searched: Vec<PathBuf>,
    },
    Io {
        importpath: String,
        message: String,
    },
    /// Import cycle detected while loading dependencies.
    Cycle { importpath: String },
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderError::NotFound {
                importpath,
                searched,
            } => {
                write!(f, "no rpl library \"{}\" found", importpath)?;
                if !searched.is_empty() {
                    write!(f, " (searched {} libpath entries)", searched.len())?;
                }
                Ok(())
            }
            LoaderError::Io {
                importpath,
                message,
            } => write!(f, "error reading \"{}\": {}", importpath, message),
            LoaderError::Cycle { importpath } => {
                write!(f, "import cycle through \"{}\"", importpath)
            }
        }
    }
}

impl std::error::Error for LoaderError {}

/// Resolves an importpath to source text.
pub trait Loader: Send {
    fn load(&self, importpath: &str) -> Result<LoadedSource, LoaderError>;
}

/// Loads `<importpath>.rpl` from the first matching libpath directory.
#[derive(Clone, Debug, Default)]
pub struct FsLoader {
    libpath: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(libpath: Vec<PathBuf>) -> Self {
        Self { libpath }
    }
}

impl Loader for FsLoader {
    fn load(&self, importpath: &str) -> Result<LoadedSource, LoaderError> {
        for dir in &self.libpath {
            let candidate = dir.join(format!("{}.rpl", importpath));
            if candidate.is_file() {
                log::debug!("loading {} from {}", importpath, candidate.display());
                return match std::fs::read_to_string(&candidate) {
                    Ok(text) => Ok(LoadedSource {
                        origin: candidate.display().to_string(),
                        text,
                    }),
                    Err(err) => Err(LoaderError::Io {
                        importpath: importpath.to_string(),
                        message: err.to_string(),
                    }),
                };
            }
        }
        Err(LoaderError::NotFound {
            importpath: importpath.to_string(),
            searched: self.libpath.clone(),
        })
    }
}

/// Serves sources from an in-memory table.
#[derive(Clone, Debug, Default)]
pub struct MemLoader {
    sources: HashMap<String, String>,
}

impl MemLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, importpath: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.insert(importpath.into(), text.into());
        self
    }
}

impl Loader for MemLoader {
    fn load(&self, importpath: &str) -> Result<LoadedSource, LoaderError> {
        match self.sources.get(importpath) {
            Some(text) => Ok(LoadedSource {
                origin: importpath.to_string(),
                text: text.clone(),
            }),
            None => Err(LoaderError::NotFound {
                importpath: importpath.to_string(),
                searched: Vec::new(),
            }),
        }
    }
}

/// A compiled package in the process-wide cache.
#[derive(Clone)]
pub(crate) struct PackageEntry {
    /// The declared package name (or the importpath's last segment).
    pub name: String,
    pub env: Arc<Environment>,
}

/// The process-wide package cache: importpath to compiled environment.
pub(crate) fn package_cache() -> &'static Mutex<HashMap<String, PackageEntry>> {
    static CACHE: OnceLock<Mutex<HashMap<String, PackageEntry>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}
