//! The engine: a single-threaded, stateful evaluator holding environments
//! and compiled matchers.
//!
//! Every compile/match entry point takes `&mut self`, so exclusive use is
//! enforced at compile time; two threads can only share an engine through
//! external synchronization. The read-only prelude and the package cache
//! are the only state shared between engines.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rosie_core::{any_errors, Diagnostic, ErrorCode, SourceFile, SourceId, Span};
use rosie_lang::{
    compile_block, compile_expression, parse_expression, parse_program, prelude, EnvValue,
    Environment,
};
use rosie_peg::{match_pattern, match_pattern_traced, MatchLimits, MatchResult, Pattern};

use crate::encoder;
use crate::loader::{package_cache, FsLoader, Loader, LoaderError, PackageEntry};

/// Lowest allocation ceiling an engine accepts, when one is set at all
/// (0 always means unlimited).
pub const MIN_ALLOC_LIMIT: usize = 1 << 20;

const DEFAULT_ALLOC_LIMIT: usize = 256 << 20;

/// Engine configuration options.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Hard ceiling on per-match capture-tree bytes; 0 means unlimited.
    pub alloc_limit: usize,
    /// Soft threshold: a run using more than this marks the engine for
    /// internal cleanup before its next call. 0 disables it.
    pub alloc_watermark: usize,
    /// Ceiling on grammar call nesting during a match.
    pub max_call_depth: usize,
    /// Directories searched by the default loader.
    pub libpath: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alloc_limit: DEFAULT_ALLOC_LIMIT,
            alloc_watermark: DEFAULT_ALLOC_LIMIT / 2,
            max_call_depth: 500,
            libpath: Vec::new(),
        }
    }
}

/// Handle to a compiled pattern within one engine.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MatcherId(u32);

impl MatcherId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Result of [`Engine::load_source`].
#[derive(Debug)]
pub struct LoadResult {
    /// False if any error-severity diagnostic was produced.
    pub ok: bool,
    /// The `package` declaration of the source, if any.
    pub pkgname: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// The source unit registered for this load, for rendering.
    pub source: SourceId,
}

/// Result of [`Engine::import_package`].
#[derive(Debug)]
pub struct ImportResult {
    pub ok: bool,
    /// The package's actual name (its declaration, or the importpath's
    /// last segment).
    pub pkgname: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of [`Engine::match_pattern`].
#[derive(Clone, Debug)]
pub struct MatchOutput {
    /// Encoded match data; empty when the pattern did not match.
    pub data: Vec<u8>,
    /// Bytes of input left unconsumed.
    pub leftover: usize,
    /// True if the run stopped early (halt, limit, cancellation).
    pub aborted: bool,
    /// Time spent matching.
    pub tmatch: Duration,
    /// Time spent in the whole call, encoding included.
    pub ttotal: Duration,
}

/// Result of [`Engine::trace`].
#[derive(Clone, Debug)]
pub struct TraceOutput {
    pub matched: bool,
    pub trace: Vec<u8>,
}

/// Hard failures of an engine call. Recoverable problems travel as
/// diagnostics lists instead.
#[derive(Debug)]
pub enum EngineError {
    NoSuchPattern(MatcherId),
    NoSuchEncoder(String),
    NoSuchTraceStyle(String),
    AllocLimitTooLow { requested: usize, minimum: usize },
    Loader(LoaderError),
    CallFailed(String),
}

impl EngineError {
    /// The diagnostic code this error corresponds to.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NoSuchPattern(_) => ErrorCode::E201,
            EngineError::NoSuchEncoder(_) | EngineError::NoSuchTraceStyle(_) => ErrorCode::E202,
            EngineError::Loader(_) => ErrorCode::E200,
            EngineError::AllocLimitTooLow { .. } | EngineError::CallFailed(_) => ErrorCode::E203,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NoSuchPattern(id) => write!(f, "no such pattern: {}", id.as_u32()),
            EngineError::NoSuchEncoder(name) => write!(f, "no such encoder \"{}\"", name),
            EngineError::NoSuchTraceStyle(name) => write!(f, "no such trace style \"{}\"", name),
            EngineError::AllocLimitTooLow { requested, minimum } => write!(
                f,
                "allocation limit {} is below the minimum {}",
                requested, minimum
            ),
            EngineError::Loader(err) => write!(f, "{}", err),
            EngineError::CallFailed(msg) => write!(f, "engine call failed: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<LoaderError> for EngineError {
    fn from(err: LoaderError) -> Self {
        EngineError::Loader(err)
    }
}

/// A Rosie Pattern Language engine.
pub struct Engine {
    env: Environment,
    sources: Vec<SourceFile>,
    matchers: HashMap<u32, Pattern>,
    next_matcher: u32,
    config: EngineConfig,
    loader: Option<Box<dyn Loader>>,
    /// Importpaths currently being loaded, for cycle detection.
    loading: HashSet<String>,
    cancel: Arc<AtomicBool>,
    last_usage: usize,
    needs_collection: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            env: Environment::extend(prelude()),
            sources: Vec::new(),
            matchers: HashMap::new(),
            next_matcher: 1,
            config,
            loader: None,
            loading: HashSet::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            last_usage: 0,
            needs_collection: false,
        }
    }

    /// Replace the library loader (the default searches the libpath).
    pub fn set_loader(&mut self, loader: Box<dyn Loader>) {
        self.loader = Some(loader);
    }

    pub fn lib_path(&self) -> &[PathBuf] {
        &self.config.libpath
    }

    pub fn set_lib_path(&mut self, libpath: Vec<PathBuf>) {
        self.config.libpath = libpath;
    }

    /// The cooperative cancellation flag observed by running matches.
    /// Another thread may set it to abort the current match.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Register a source unit for later diagnostic rendering.
    fn add_source(&mut self, origin: &str, text: &str) -> SourceId {
        let id = SourceId::new(self.sources.len() as u16);
        self.sources
            .push(SourceFile::new(id, origin.into(), text.into()));
        id
    }

    pub fn source(&self, id: SourceId) -> Option<&SourceFile> {
        self.sources.get(id.as_u16() as usize)
    }

    /// Names visible from the engine's root scope.
    pub fn binding_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.env.flatten().into_keys().collect();
        names.sort();
        names
    }

    // ------------------------------------------------------------------
    // Loading and importing
    // ------------------------------------------------------------------

    /// Load a block of RPL source into the engine's root scope.
    ///
    /// Imports are resolved through the loader; loader failures become
    /// E200 diagnostics rather than hard errors, so one pass reports
    /// everything it can.
    pub fn load_source(&mut self, text: &str) -> LoadResult {
        let source = self.add_source("<top-level>", text);
        let out = parse_program(self.sources.last().expect("just added"));
        let mut diagnostics = out.diagnostics;

        if !any_errors(&diagnostics) {
            for import in &out.program.imports {
                match self.load_package(&import.path) {
                    Ok((pkgname, env, mut pkg_diags)) => {
                        diagnostics.append(&mut pkg_diags);
                        let bound_name =
                            import.alias.clone().unwrap_or_else(|| pkgname.clone());
                        if self
                            .env
                            .bind(bound_name, EnvValue::Package(env), false)
                            .is_err()
                        {
                            diagnostics.push(
                                Diagnostic::error(ErrorCode::E203, import.span)
                                    .with_message("cannot bind into a read-only scope"),
                            );
                        }
                    }
                    Err(err) => {
                        diagnostics.push(
                            Diagnostic::error(ErrorCode::E200, import.span)
                                .with_message(err.to_string()),
                        );
                    }
                }
            }
        }

        let pkgname = if any_errors(&diagnostics) {
            out.program.package.clone()
        } else {
            let result = compile_block(&out.program, &mut self.env);
            diagnostics.extend(result.diagnostics);
            result.pkgname
        };

        LoadResult {
            ok: !any_errors(&diagnostics),
            pkgname,
            diagnostics,
            source,
        }
    }

    /// Import a package, binding it under `alias` (or its own name) in the
    /// engine's root scope. Re-imports are served from the process-wide
    /// cache.
    pub fn import_package(
        &mut self,
        importpath: &str,
        alias: Option<&str>,
    ) -> Result<ImportResult, EngineError> {
        let (pkgname, env, diagnostics) = self.load_package(importpath)?;
        let ok = !any_errors(&diagnostics);
        if ok {
            let bound_name = alias.unwrap_or(&pkgname).to_string();
            self.env
                .bind(bound_name, EnvValue::Package(env), false)
                .map_err(|e| EngineError::CallFailed(e.to_string()))?;
        }
        Ok(ImportResult {
            ok,
            pkgname,
            diagnostics,
        })
    }

    /// Load and compile a package (without binding it), consulting the
    /// cache first.
    fn load_package(
        &mut self,
        importpath: &str,
    ) -> Result<(String, Arc<Environment>, Vec<Diagnostic>), EngineError> {
        if let Some(entry) = package_cache().lock().get(importpath).cloned() {
            log::debug!("package \"{}\" served from cache", importpath);
            return Ok((entry.name, entry.env, Vec::new()));
        }
        if !self.loading.insert(importpath.to_string()) {
            return Err(LoaderError::Cycle {
                importpath: importpath.to_string(),
            }
            .into());
        }
        let result = self.load_package_uncached(importpath);
        self.loading.remove(importpath);
        result
    }

    fn load_package_uncached(
        &mut self,
        importpath: &str,
    ) -> Result<(String, Arc<Environment>, Vec<Diagnostic>), EngineError> {
        let loaded = match &self.loader {
            Some(loader) => loader.load(importpath)?,
            None => FsLoader::new(self.config.libpath.clone()).load(importpath)?,
        };
        self.add_source(&loaded.origin, &loaded.text);
        let out = parse_program(self.sources.last().expect("just added"));
        let mut diagnostics = out.diagnostics;

        let mut pkg_env = Environment::extend(prelude());
        for import in &out.program.imports {
            let (dep_name, dep_env, mut dep_diags) = self.load_package(&import.path)?;
            diagnostics.append(&mut dep_diags);
            let bound_name = import.alias.clone().unwrap_or(dep_name);
            pkg_env
                .bind(bound_name, EnvValue::Package(dep_env), false)
                .map_err(|e| EngineError::CallFailed(e.to_string()))?;
        }

        let result = compile_block(&out.program, &mut pkg_env);
        diagnostics.extend(result.diagnostics);

        let pkgname = result
            .pkgname
            .unwrap_or_else(|| default_pkgname(importpath));
        let env = Arc::new(pkg_env);

        if !any_errors(&diagnostics) {
            package_cache().lock().insert(
                importpath.to_string(),
                PackageEntry {
                    name: pkgname.clone(),
                    env: env.clone(),
                },
            );
            log::debug!("package \"{}\" compiled as \"{}\"", importpath, pkgname);
        }
        Ok((pkgname, env, diagnostics))
    }

    // ------------------------------------------------------------------
    // Compiling and matching
    // ------------------------------------------------------------------

    /// Compile an RPL expression to a matcher handle.
    pub fn compile_expression(&mut self, text: &str) -> Result<MatcherId, Vec<Diagnostic>> {
        self.add_source("<expression>", text);
        let (exp, mut diagnostics) =
            parse_expression(self.sources.last().expect("just added"));
        if any_errors(&diagnostics) {
            return Err(diagnostics);
        }
        let (pattern, compile_diags) = compile_expression(&exp, &self.env);
        diagnostics.extend(compile_diags);
        match pattern {
            Some(pattern) if !any_errors(&diagnostics) => {
                for warning in &diagnostics {
                    log::debug!("compile warning: {}", warning.message());
                }
                let id = self.next_matcher;
                self.next_matcher += 1;
                self.matchers.insert(id, pattern);
                Ok(MatcherId(id))
            }
            _ => Err(diagnostics),
        }
    }

    /// Release a compiled matcher.
    pub fn free_matcher(&mut self, id: MatcherId) -> Result<(), EngineError> {
        self.matchers
            .remove(&id.as_u32())
            .map(|_| ())
            .ok_or(EngineError::NoSuchPattern(id))
    }

    fn limits(&self) -> MatchLimits {
        MatchLimits {
            alloc_limit: self.config.alloc_limit,
            max_call_depth: self.config.max_call_depth,
        }
    }

    fn maybe_collect(&mut self) {
        if self.needs_collection {
            self.matchers.shrink_to_fit();
            self.sources.shrink_to_fit();
            self.needs_collection = false;
            log::debug!("collected transient buffers after watermark");
        }
    }

    fn note_usage(&mut self, used: usize) {
        self.last_usage = used;
        if self.config.alloc_watermark != 0 && used > self.config.alloc_watermark {
            self.needs_collection = true;
        }
    }

    /// Run a matcher and hand back the raw match result.
    pub fn run_matcher(
        &mut self,
        id: MatcherId,
        start: usize,
        input: &[u8],
    ) -> Result<MatchResult, EngineError> {
        self.maybe_collect();
        let pattern = self
            .matchers
            .get(&id.as_u32())
            .ok_or(EngineError::NoSuchPattern(id))?;
        let result = match_pattern(pattern, input, start, self.limits(), Some(&*self.cancel));
        if let Some(error) = result.error {
            log::debug!("match aborted: {}", error);
        }
        self.note_usage(result.alloc_used);
        Ok(result)
    }

    /// Run a matcher and encode the result.
    pub fn match_pattern(
        &mut self,
        id: MatcherId,
        start: usize,
        encoder_name: &str,
        input: &[u8],
    ) -> Result<MatchOutput, EngineError> {
        let t0 = Instant::now();
        if !encoder::ENCODERS.contains(&encoder_name) {
            return Err(EngineError::NoSuchEncoder(encoder_name.to_string()));
        }
        let result = self.run_matcher(id, start, input)?;
        let data = encoder::encode(encoder_name, result.tree.as_ref(), input)
            .map_err(|e| EngineError::NoSuchEncoder(e.0))?;
        Ok(MatchOutput {
            data,
            leftover: result.leftover,
            aborted: result.aborted,
            tmatch: result.tmatch,
            ttotal: t0.elapsed(),
        })
    }

    /// Trace a match attempt. `style` is `"condensed"` (plain text) or
    /// `"json"`.
    pub fn trace(
        &mut self,
        id: MatcherId,
        start: usize,
        style: &str,
        input: &[u8],
    ) -> Result<TraceOutput, EngineError> {
        self.maybe_collect();
        let pattern = self
            .matchers
            .get(&id.as_u32())
            .ok_or(EngineError::NoSuchPattern(id))?;
        let (result, tracer) = match_pattern_traced(pattern, input, start, self.limits());
        self.note_usage(result.alloc_used);
        let trace = match style {
            "condensed" | "text" => tracer.render_text().into_bytes(),
            "json" => {
                let events: Vec<serde_json::Value> = tracer
                    .events()
                    .iter()
                    .map(|event| {
                        serde_json::json!({
                            "depth": event.depth,
                            "pos": event.pos,
                            "label": event.label,
                            "matched": event.matched,
                            "end": event.end,
                        })
                    })
                    .collect();
                serde_json::Value::Array(events).to_string().into_bytes()
            }
            other => return Err(EngineError::NoSuchTraceStyle(other.to_string())),
        };
        Ok(TraceOutput {
            matched: result.matched(),
            trace,
        })
    }

    // ------------------------------------------------------------------
    // Resource accounting
    // ------------------------------------------------------------------

    /// Set the allocation ceiling in bytes. 0 means unlimited; any other
    /// value must be at least [`MIN_ALLOC_LIMIT`]. Returns the new limit.
    pub fn set_alloc_limit(&mut self, limit: usize) -> Result<usize, EngineError> {
        if limit != 0 && limit < MIN_ALLOC_LIMIT {
            return Err(EngineError::AllocLimitTooLow {
                requested: limit,
                minimum: MIN_ALLOC_LIMIT,
            });
        }
        self.config.alloc_limit = limit;
        Ok(limit)
    }

    pub fn alloc_limit(&self) -> usize {
        self.config.alloc_limit
    }

    /// Capture-tree bytes charged by the most recent run.
    pub fn alloc_usage(&self) -> usize {
        self.last_usage
    }
}

fn default_pkgname(importpath: &str) -> String {
    importpath
        .rsplit('/')
        .next()
        .unwrap_or(importpath)
        .to_string()
}

/// A diagnostic carrying an engine error's code and message, for callers
/// that funnel everything into one diagnostics stream.
pub fn error_to_diagnostic(err: &EngineError) -> Diagnostic {
    Diagnostic::error(err.code(), Span::DUMMY).with_message(err.to_string())
}
