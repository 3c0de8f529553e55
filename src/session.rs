//! Solver sessions: native handle lifecycle, solve calls, and warm-start
//! save/load.
//!
//! A [`SolverSession`] owns at most one live native solver handle. Handles
//! are wrapped in an RAII guard that guarantees release on every exit path
//! and keeps a process-wide count of live native objects for leak auditing.
//! Construction runs exactly one of two paths: a fresh build from problem
//! data, or an import of previously exported state + cache artifacts.

use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::archive::{with_archive_ext, Archive, ArchiveEntries, LayeredCache};
use crate::error::{PogsError, PogsResult};
use crate::ffi;
use crate::ffi::types::{Float, FunctionObj, FunctionVector, PogsInfo, PogsOutput, SolverPtr};
use crate::objective::Objective;
use crate::settings::{SettingsUpdate, SolverSettings};
use crate::state::{SolverCache, SolverState, CHOL_KEY, STATE_BLOCKS};
use crate::variant::SolverVariant;

/// Count of live native solver handles across every session in the process.
static LIVE_HANDLES: AtomicUsize = AtomicUsize::new(0);

/// Number of native solver handles currently alive in this process.
///
/// After any sequence of construct/solve/release calls this equals the
/// number of sessions holding a non-released handle; anything else is a leak.
pub fn live_handle_count() -> usize {
    LIVE_HANDLES.load(Ordering::SeqCst)
}

/// RAII guard over a raw native solver handle.
///
/// Registration verifies the handle with the native side and increments the
/// live-handle counter; release tears the handle down, decrements, and is
/// idempotent. The raw pointer never leaves this module.
struct SolverHandle {
    raw: SolverPtr,
}

impl SolverHandle {
    fn register(raw: SolverPtr, phase: &'static str) -> PogsResult<Self> {
        let raw = ffi::check_handle(raw, phase)?;
        let libs = ffi::libs()?;
        ffi::check_status(
            unsafe { (libs.solver_exists)(raw) },
            "pogs_solver_exists",
        )?;
        LIVE_HANDLES.fetch_add(1, Ordering::SeqCst);
        Ok(Self { raw })
    }

    fn release(&mut self) -> PogsResult<()> {
        if self.raw.is_null() {
            return Ok(());
        }
        let libs = ffi::libs()?;
        let raw = std::mem::replace(&mut self.raw, ptr::null_mut());
        LIVE_HANDLES.fetch_sub(1, Ordering::SeqCst);
        ffi::check_status(unsafe { (libs.finish)(raw, 0) }, "pogs_finish")
    }
}

impl Drop for SolverHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("native solver teardown failed during drop: {e}");
        }
    }
}

/// Read-only diagnostics of the last solve call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverInfo {
    error: i32,
    converged: bool,
    iterations: u32,
    objective: Float,
    rho: Float,
    setup_time: Float,
    solve_time: Float,
}

impl SolverInfo {
    fn from_native(c: &PogsInfo) -> Self {
        Self {
            error: c.err,
            converged: c.converged != 0,
            iterations: c.k,
            objective: c.obj,
            rho: c.rho,
            setup_time: c.setup_time,
            solve_time: c.solve_time,
        }
    }

    /// Native error code reported with the solve.
    pub fn error(&self) -> i32 {
        self.error
    }

    /// Did the solve reach the requested tolerances?
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Iterations taken.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Objective value at the returned iterate.
    pub fn objective(&self) -> Float {
        self.objective
    }

    /// Penalty parameter after the solve (adaptive-rho may have changed it).
    pub fn rho(&self) -> Float {
        self.rho
    }

    /// Native setup time, seconds.
    pub fn setup_time(&self) -> Float {
        self.setup_time
    }

    /// Native solve time, seconds.
    pub fn solve_time(&self) -> Float {
        self.solve_time
    }
}

/// Result buffers, allocated once per session and overwritten by each solve.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    x: Vec<Float>,
    y: Vec<Float>,
    mu: Vec<Float>,
    nu: Vec<Float>,
}

impl SolverOutput {
    fn new(m: usize, n: usize) -> Self {
        Self {
            x: vec![0.0; n],
            y: vec![0.0; m],
            mu: vec![0.0; n],
            nu: vec![0.0; m],
        }
    }

    /// Primal solution, length `n`.
    pub fn x(&self) -> &[Float] {
        &self.x
    }

    /// Dual/residual view of the constraint block, length `m`.
    pub fn y(&self) -> &[Float] {
        &self.y
    }

    /// Stationarity residual, length `n`.
    pub fn mu(&self) -> &[Float] {
        &self.mu
    }

    /// Dual residual, length `m`.
    pub fn nu(&self) -> &[Float] {
        &self.nu
    }

    fn as_native(&mut self) -> PogsOutput {
        PogsOutput {
            x: self.x.as_mut_ptr(),
            y: self.y.as_mut_ptr(),
            mu: self.mu.as_mut_ptr(),
            nu: self.nu.as_mut_ptr(),
        }
    }
}

fn encode_objective(obj: &Objective, buf: &mut Vec<FunctionObj>) {
    let (kind, a, b, c, d, e, s) = obj.arrays();
    buf.clear();
    buf.extend((0..obj.len()).map(|i| FunctionObj {
        h: kind[i] as u32,
        a: a[i],
        b: b[i],
        c: c[i],
        d: d[i],
        e: e[i],
        s: s[i],
    }));
}

/// A solver session for one fixed-dimension problem.
///
/// Dimensions `(m, n)` are pinned at construction; objectives, settings, and
/// warm-start artifacts all validate against them. Sessions are not
/// internally synchronized; callers must serialize access per session.
pub struct SolverSession {
    variant: Box<dyn SolverVariant>,
    m: usize,
    n: usize,
    handle: Option<SolverHandle>,
    f_buf: Vec<FunctionObj>,
    g_buf: Vec<FunctionObj>,
    settings: SolverSettings,
    info: SolverInfo,
    output: SolverOutput,
    state: Option<SolverState>,
    cache: Option<SolverCache>,
    first_run: bool,
}

impl SolverSession {
    /// Session without a native handle; call [`SolverSession::build`] or one
    /// of the load paths to bring it up.
    pub fn unbuilt(variant: impl SolverVariant + 'static) -> Self {
        let (m, n) = variant.shape();
        Self {
            variant: Box::new(variant),
            m,
            n,
            handle: None,
            f_buf: Vec::with_capacity(m),
            g_buf: Vec::with_capacity(n),
            settings: SolverSettings::default(),
            info: SolverInfo::default(),
            output: SolverOutput::new(m, n),
            state: None,
            cache: None,
            first_run: true,
        }
    }

    /// Fresh build: equilibrate and factorize from the variant's problem data.
    pub fn new(variant: impl SolverVariant + 'static) -> PogsResult<Self> {
        let mut session = Self::unbuilt(variant);
        session.build()?;
        Ok(session)
    }

    /// Cache build: resolve `cache` into state + artifacts and import them,
    /// skipping factorization when the cached flags carry a valid factor.
    pub fn from_cache(
        variant: impl SolverVariant + 'static,
        cache: &LayeredCache,
        allow_cholesky: bool,
    ) -> PogsResult<Self> {
        let mut session = Self::unbuilt(variant);
        session.rebuild_from_cache(cache, allow_cholesky)?;
        Ok(session)
    }

    /// Cache build from already-resolved parts (the export → import path
    /// that never touches the filesystem).
    pub fn from_parts(
        variant: impl SolverVariant + 'static,
        cache: SolverCache,
        state: SolverState,
    ) -> PogsResult<Self> {
        let mut session = Self::unbuilt(variant);
        session.import_parts(cache, state)?;
        Ok(session)
    }

    /// Problem dimensions `(m, n)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.m, self.n)
    }

    /// Is a native handle currently live?
    pub fn is_built(&self) -> bool {
        self.handle.is_some()
    }

    /// True until the first successful solve on this session.
    pub fn first_run(&self) -> bool {
        self.first_run
    }

    /// Current settings.
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Apply settings overrides outside a solve call.
    pub fn update_settings(&mut self, update: &SettingsUpdate) -> PogsResult<()> {
        self.settings.apply(update)
    }

    /// Diagnostics of the last successful solve.
    pub fn info(&self) -> &SolverInfo {
        &self.info
    }

    /// Result buffers of the last solve.
    pub fn output(&self) -> &SolverOutput {
        &self.output
    }

    /// Build a native solver from the variant's problem data, releasing any
    /// prior handle first.
    pub fn build(&mut self) -> PogsResult<()> {
        let libs = ffi::libs()?;
        if let Some(mut prior) = self.handle.take() {
            prior.release()?;
        }
        let data = self.variant.problem_data();
        let flags = self.variant.solver_flags();
        let raw = unsafe { (libs.init)(&data, &flags) };
        self.handle = Some(SolverHandle::register(raw, "pogs_init")?);
        Ok(())
    }

    /// Release the native handle. Idempotent; the session can be rebuilt.
    pub fn release(&mut self) -> PogsResult<()> {
        match self.handle.take() {
            Some(mut handle) => handle.release(),
            None => Ok(()),
        }
    }

    /// Run the native solver on objectives `(f, g)`.
    ///
    /// `f` must have length `m` and `g` length `n`. Overrides merge into the
    /// session settings through the usual validators. A nonzero native
    /// status surfaces as a solve failure; on success the output buffers and
    /// diagnostics reflect the new iterate.
    pub fn solve(
        &mut self,
        f: &Objective,
        g: &Objective,
        overrides: &SettingsUpdate,
    ) -> PogsResult<()> {
        let raw = match &self.handle {
            Some(handle) => handle.raw,
            None => return Err(PogsError::NoSolver("solve")),
        };
        if f.len() != self.m || g.len() != self.n {
            return Err(PogsError::SizeMismatch(format!(
                "objectives sized ({}, {}) for solver dimensions ({}, {})",
                f.len(),
                g.len(),
                self.m,
                self.n
            )));
        }
        self.settings.apply(overrides)?;
        if let Some(x0) = self.settings.x0() {
            if x0.len() != self.n {
                return Err(PogsError::SizeMismatch(format!(
                    "warm-start x0 has length {}, expected {}",
                    x0.len(),
                    self.n
                )));
            }
        }
        if let Some(nu0) = self.settings.nu0() {
            if nu0.len() != self.m {
                return Err(PogsError::SizeMismatch(format!(
                    "warm-start nu0 has length {}, expected {}",
                    nu0.len(),
                    self.m
                )));
            }
        }

        encode_objective(f, &mut self.f_buf);
        encode_objective(g, &mut self.g_buf);

        let libs = ffi::libs()?;
        let c_settings = self.settings.to_native(libs)?;
        let f_vec = FunctionVector {
            size: self.f_buf.len(),
            objectives: self.f_buf.as_mut_ptr(),
        };
        let g_vec = FunctionVector {
            size: self.g_buf.len(),
            objectives: self.g_buf.as_mut_ptr(),
        };
        let mut c_info = PogsInfo::default();
        let mut c_output = self.output.as_native();

        ffi::check_status(
            unsafe {
                (libs.solve)(
                    raw,
                    &f_vec,
                    &g_vec,
                    &c_settings,
                    &mut c_info,
                    &mut c_output,
                )
            },
            "pogs_solve",
        )?;

        self.info = SolverInfo::from_native(&c_info);
        self.first_run = false;
        Ok(())
    }

    /// Snapshot the solver's current iterate and penalty parameter.
    ///
    /// Re-queries the native solver on every call.
    pub fn state(&mut self) -> PogsResult<&SolverState> {
        let raw = match &self.handle {
            Some(handle) => handle.raw,
            None => return Err(PogsError::NoSolver("state")),
        };
        let libs = ffi::libs()?;
        let mut state = self
            .state
            .take()
            .unwrap_or_else(|| SolverState::zeros(self.m, self.n));
        let mut rho = state.rho();
        let status = unsafe {
            (libs.save_state)(state.iterate_mut().as_mut_ptr(), &mut rho, raw)
        };
        state.set_rho(rho);
        let state = self.state.insert(state);
        ffi::check_status(status, "pogs_solver_save_state")?;
        Ok(state)
    }

    /// Export factorization/equilibration artifacts from the live solver
    /// without mutating it.
    ///
    /// The export is performed once per handle and memoized.
    pub fn export_cache(&mut self) -> PogsResult<&SolverCache> {
        let raw = match &self.handle {
            Some(handle) => handle.raw,
            None => return Err(PogsError::NoSolver("export_cache")),
        };
        let cache = match self.cache.take() {
            Some(cache) => cache,
            None => {
                let libs = ffi::libs()?;
                let mut cache =
                    SolverCache::zeros(self.variant.cache_shape(), self.variant.solver_flags());
                let mut state = self
                    .state
                    .take()
                    .unwrap_or_else(|| SolverState::zeros(self.m, self.n));
                let mut rho = state.rho();
                let mut priv_data = cache.as_native();
                let mut flags = cache.flags();
                let status = unsafe {
                    (libs.export_solver)(
                        &mut priv_data,
                        state.iterate_mut().as_mut_ptr(),
                        &mut rho,
                        &mut flags,
                        raw,
                    )
                };
                state.set_rho(rho);
                self.state = Some(state);
                ffi::check_status(status, "pogs_export_solver")?;
                cache.set_flags(flags);
                cache
            }
        };
        Ok(self.cache.insert(cache))
    }

    /// Rebuild the native solver from a layered cache (the cache build path).
    pub fn rebuild_from_cache(
        &mut self,
        cache: &LayeredCache,
        allow_cholesky: bool,
    ) -> PogsResult<()> {
        let solver_cache = self.variant.cache_from_layered(cache, allow_cholesky)?;
        let state = SolverState::from_layered(cache, self.m, self.n)?;
        self.import_parts(solver_cache, state)
    }

    /// Import previously exported artifacts into a new native handle,
    /// releasing any prior handle first.
    pub fn import_parts(
        &mut self,
        mut cache: SolverCache,
        state: SolverState,
    ) -> PogsResult<()> {
        let expected = STATE_BLOCKS * (self.m + self.n);
        if state.iterate().len() != expected {
            return Err(PogsError::SizeMismatch(format!(
                "state buffer has length {}, expected {}",
                state.iterate().len(),
                expected
            )));
        }

        let libs = ffi::libs()?;
        if let Some(mut prior) = self.handle.take() {
            prior.release()?;
        }
        let priv_data = cache.as_native();
        let flags = cache.flags();
        let raw = unsafe {
            (libs.load_solver)(&priv_data, state.iterate().as_ptr(), state.rho(), &flags)
        };
        self.handle = Some(SolverHandle::register(raw, "pogs_load_solver")?);
        self.cache = Some(cache);
        self.state = Some(state);
        Ok(())
    }

    /// Persist the session's warm-start data to `dir/name` (fixed extension
    /// appended when absent).
    ///
    /// Refuses a missing directory and never overwrites an existing file.
    /// `save_equil` adds the equilibration/factorization cache;
    /// `save_factorization = false` strips the heavy factor entry from it.
    /// Returns the path written.
    pub fn save(
        &mut self,
        dir: &Path,
        name: &str,
        save_equil: bool,
        save_factorization: bool,
    ) -> PogsResult<PathBuf> {
        if self.handle.is_none() {
            return Err(PogsError::NoSolver("save"));
        }
        if !dir.is_dir() {
            return Err(PogsError::MissingDirectory(dir.to_path_buf()));
        }
        let path = with_archive_ext(&dir.join(name));
        if path.exists() {
            return Err(PogsError::AlreadyExists(path));
        }

        let mut entries = ArchiveEntries::new();
        self.state()?.export_into(&mut entries);
        if save_equil {
            self.export_cache()?.export_into(&mut entries);
            if !save_factorization {
                entries.remove(CHOL_KEY);
            }
        }
        Archive::write_new(&path, entries)?;
        Ok(path)
    }

    /// Rebuild the session from an archive at `path` (fixed extension
    /// appended when absent).
    ///
    /// A missing or unreadable archive is not an error: the session degrades
    /// to the cache build path with an empty cache (cold start).
    pub fn load(&mut self, path: &Path, allow_cholesky: bool) -> PogsResult<()> {
        let path = with_archive_ext(path);
        let layered = match Archive::open(&path) {
            Ok(archive) => LayeredCache::from_archive(archive),
            Err(e) => {
                log::debug!(
                    "no usable warm-start archive at {}: {e}; starting cold",
                    path.display()
                );
                LayeredCache::empty()
            }
        };
        self.rebuild_from_cache(&layered, allow_cholesky)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Objective;
    use crate::variant::DenseVariant;
    use nalgebra::DMatrix;

    fn unbuilt_session() -> SolverSession {
        SolverSession::unbuilt(DenseVariant::new(DMatrix::zeros(2, 3)))
    }

    #[test]
    fn test_unbuilt_session_shape_and_buffers() {
        let session = unbuilt_session();
        assert_eq!(session.shape(), (2, 3));
        assert!(!session.is_built());
        assert!(session.first_run());
        assert_eq!(session.output().x().len(), 3);
        assert_eq!(session.output().y().len(), 2);
        assert_eq!(session.output().mu().len(), 3);
        assert_eq!(session.output().nu().len(), 2);
    }

    #[test]
    fn test_operations_require_a_live_solver() {
        let mut session = unbuilt_session();
        let f = Objective::new(2);
        let g = Objective::new(3);

        assert!(matches!(
            session.solve(&f, &g, &SettingsUpdate::new()),
            Err(PogsError::NoSolver("solve"))
        ));
        assert!(matches!(
            session.state(),
            Err(PogsError::NoSolver("state"))
        ));
        assert!(matches!(
            session.export_cache(),
            Err(PogsError::NoSolver("export_cache"))
        ));
        assert!(matches!(
            session.save(Path::new("/tmp"), "x", true, true),
            Err(PogsError::NoSolver("save"))
        ));
    }

    #[test]
    fn test_release_is_idempotent_without_a_handle() {
        let mut session = unbuilt_session();
        session.release().unwrap();
        session.release().unwrap();
        assert!(!session.is_built());
    }

    #[test]
    fn test_unbuilt_solve_fails_before_size_checks() {
        // The handle guard fires first, even when the objectives are also
        // mis-sized.
        let mut session = unbuilt_session();
        let f = Objective::new(2);
        let g = Objective::new(3);
        assert!(matches!(
            session.solve(&g, &f, &SettingsUpdate::new()),
            Err(PogsError::NoSolver(_))
        ));
    }

    #[test]
    fn test_import_parts_rejects_wrong_state_length() {
        let mut session = unbuilt_session();
        let cache = SolverCache::zeros(
            session.variant.cache_shape(),
            session.variant.solver_flags(),
        );
        let state = SolverState::zeros(1, 1);
        assert!(matches!(
            session.import_parts(cache, state),
            Err(PogsError::SizeMismatch(_))
        ));
    }

    #[test]
    fn test_live_handle_counter_starts_clean() {
        // No session in this test binary has built a native handle here.
        let _ = unbuilt_session();
        assert_eq!(live_handle_count(), 0);
    }
}
