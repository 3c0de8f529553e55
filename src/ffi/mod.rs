//! Dynamic bindings to the native POGS solver library.
//!
//! The library is loaded at first use via `libloading`, so the crate compiles
//! and its host-side functionality runs on systems without the native solver
//! installed. Operations that need a live solver return
//! [`PogsError::LibraryNotFound`] when loading fails.
//!
//! Platform-specific library *path resolution* is deliberately not handled
//! here; only the standard name list per platform is tried.

pub mod types;

use std::os::raw::{c_int, c_void};
use std::sync::OnceLock;

use libloading::Library;

use crate::error::{PogsError, PogsResult};
use types::{
    Float, FunctionVector, PogsInfo, PogsOutput, PogsPrivData, PogsProblemData, PogsSettings,
    SolverPtr, Status,
};

// ============================================================================
// Function pointer types
// ============================================================================

type PogsInitFn =
    unsafe extern "C" fn(data: *const PogsProblemData, flags: *const types::PogsSolverFlags) -> SolverPtr;

type PogsSolveFn = unsafe extern "C" fn(
    solver: SolverPtr,
    f: *const FunctionVector,
    g: *const FunctionVector,
    settings: *const PogsSettings,
    info: *mut PogsInfo,
    output: *mut PogsOutput,
) -> Status;

type PogsFinishFn = unsafe extern "C" fn(solver: SolverPtr, reset: c_int) -> Status;

type PogsSolverExistsFn = unsafe extern "C" fn(solver: SolverPtr) -> Status;

type PogsSaveStateFn =
    unsafe extern "C" fn(state: *mut Float, rho: *mut Float, solver: SolverPtr) -> Status;

type PogsExportSolverFn = unsafe extern "C" fn(
    priv_data: *mut PogsPrivData,
    state: *mut Float,
    rho: *mut Float,
    flags: *mut types::PogsSolverFlags,
    solver: SolverPtr,
) -> Status;

type PogsLoadSolverFn = unsafe extern "C" fn(
    priv_data: *const PogsPrivData,
    state: *const Float,
    rho: Float,
    flags: *const types::PogsSolverFlags,
) -> SolverPtr;

type PogsSetDefaultSettingsFn = unsafe extern "C" fn(settings: *mut PogsSettings) -> Status;

type PogsVersionFn = unsafe extern "C" fn(
    major: *mut c_int,
    minor: *mut c_int,
    change: *mut c_int,
    status: *mut c_int,
) -> Status;

type FunctionEvalVectorFn =
    unsafe extern "C" fn(f: *const FunctionVector, x: *const Float, size: usize) -> Float;

// ============================================================================
// Symbol table
// ============================================================================

/// Dynamically loaded native solver entry points.
pub struct PogsLibs {
    _lib: Library,

    pub init: PogsInitFn,
    pub solve: PogsSolveFn,
    pub finish: PogsFinishFn,
    pub solver_exists: PogsSolverExistsFn,
    pub save_state: PogsSaveStateFn,
    pub export_solver: PogsExportSolverFn,
    pub load_solver: PogsLoadSolverFn,
    pub set_default_settings: PogsSetDefaultSettingsFn,
    pub version: PogsVersionFn,
    pub function_eval_vector: FunctionEvalVectorFn,
}

// SAFETY: the native solver is callable from any thread as long as the caller
// serializes access per solver handle, which the session layer guarantees.
unsafe impl Send for PogsLibs {}
unsafe impl Sync for PogsLibs {}

impl PogsLibs {
    fn load() -> PogsResult<Self> {
        let names: &[&str] = if cfg!(target_os = "windows") {
            &["pogs.dll"]
        } else if cfg!(target_os = "macos") {
            &["libpogs.dylib"]
        } else {
            &["libpogs.so", "libpogs.so.0"]
        };

        let lib = Self::load_library(names).map_err(|e| {
            PogsError::LibraryNotFound(format!(
                "POGS solver library not found (tried {:?}): {}",
                names, e
            ))
        })?;

        macro_rules! sym {
            ($ty:ty, $name:literal) => {
                unsafe {
                    *lib.get::<$ty>($name).map_err(|e| {
                        PogsError::LibraryNotFound(format!(
                            "{}: {}",
                            String::from_utf8_lossy($name),
                            e
                        ))
                    })?
                }
            };
        }

        let init = sym!(PogsInitFn, b"pogs_init");
        let solve = sym!(PogsSolveFn, b"pogs_solve");
        let finish = sym!(PogsFinishFn, b"pogs_finish");
        let solver_exists = sym!(PogsSolverExistsFn, b"pogs_solver_exists");
        let save_state = sym!(PogsSaveStateFn, b"pogs_solver_save_state");
        let export_solver = sym!(PogsExportSolverFn, b"pogs_export_solver");
        let load_solver = sym!(PogsLoadSolverFn, b"pogs_load_solver");
        let set_default_settings = sym!(PogsSetDefaultSettingsFn, b"pogs_set_default_settings");
        let version = sym!(PogsVersionFn, b"pogs_version");
        let function_eval_vector = sym!(FunctionEvalVectorFn, b"function_eval_vector");

        Ok(Self {
            _lib: lib,
            init,
            solve,
            finish,
            solver_exists,
            save_state,
            export_solver,
            load_solver,
            set_default_settings,
            version,
            function_eval_vector,
        })
    }

    fn load_library(names: &[&str]) -> Result<Library, libloading::Error> {
        let mut last_error = None;
        for name in names {
            match unsafe { Library::new(name) } {
                Ok(lib) => return Ok(lib),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.expect("library name list is never empty"))
    }
}

static POGS_LIBS: OnceLock<PogsResult<PogsLibs>> = OnceLock::new();

/// Get the global native symbol table, loading the library on first call.
pub fn libs() -> PogsResult<&'static PogsLibs> {
    POGS_LIBS
        .get_or_init(PogsLibs::load)
        .as_ref()
        .map_err(|e| PogsError::LibraryNotFound(e.to_string()))
}

/// Quick probe: can the native solver library be loaded?
pub fn is_available() -> bool {
    libs().is_ok()
}

/// Map a native status code to a result, tagging the failing entry point.
pub fn check_status(status: Status, phase: &'static str) -> PogsResult<()> {
    if status == 0 {
        Ok(())
    } else {
        Err(PogsError::Native {
            code: status,
            phase,
        })
    }
}

/// Null-handle helper shared by the construction paths.
pub fn check_handle(handle: *mut c_void, phase: &'static str) -> PogsResult<SolverPtr> {
    if handle.is_null() {
        Err(PogsError::Native { code: 1, phase })
    } else {
        Ok(handle)
    }
}
