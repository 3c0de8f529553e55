//! `#[repr(C)]` mirror types for the native POGS call surface.
//!
//! Layouts here must match the native headers exactly. The native library is
//! built in either single or double precision; the `single` cargo feature
//! selects the matching [`Float`] width at compile time.

use std::os::raw::{c_int, c_uint, c_void};
use std::ptr;

/// Scalar type of the native solver build.
#[cfg(not(feature = "single"))]
pub type Float = f64;

/// Scalar type of the native solver build.
#[cfg(feature = "single")]
pub type Float = f32;

/// Opaque native solver handle.
pub type SolverPtr = *mut c_void;

/// Native status code; zero is success.
pub type Status = c_uint;

/// Storage order for dense data and sparse index layout (CBLAS values).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Row-major dense storage / CSR sparse layout.
    RowMajor = 101,
    /// Column-major dense storage / CSC sparse layout.
    ColMajor = 102,
}

/// One separable objective term: parameters of `c * k(a x - b) + d x + (e/2) x^2`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FunctionObj {
    /// Kernel tag (see `FunctionKind`)
    pub h: c_uint,
    pub a: Float,
    pub b: Float,
    pub c: Float,
    pub d: Float,
    pub e: Float,
    /// Kernel width parameter
    pub s: Float,
}

/// Contiguous array of objective terms handed to the native solve call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FunctionVector {
    pub size: usize,
    pub objectives: *mut FunctionObj,
}

/// Native settings record consumed by `pogs_solve`.
///
/// `x0`/`nu0` are optional caller-owned warm-start buffers; null when unused.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PogsSettings {
    pub alpha: Float,
    pub rho: Float,
    pub abstol: Float,
    pub reltol: Float,
    pub tolproj: Float,
    pub toladapt: Float,
    pub anderson_regularization: Float,
    pub maxiter: c_uint,
    pub anderson_lookback: c_uint,
    pub verbose: c_uint,
    pub suppress: c_uint,
    pub adaptiverho: c_int,
    pub accelerate: c_int,
    pub gapstop: c_int,
    pub warmstart: c_int,
    pub resume: c_int,
    pub diagnostic: c_int,
    pub x0: *mut Float,
    pub nu0: *mut Float,
}

impl PogsSettings {
    /// All-zero record, to be filled by the native default initializer.
    pub fn zeroed() -> Self {
        Self {
            alpha: 0.0,
            rho: 0.0,
            abstol: 0.0,
            reltol: 0.0,
            tolproj: 0.0,
            toladapt: 0.0,
            anderson_regularization: 0.0,
            maxiter: 0,
            anderson_lookback: 0,
            verbose: 0,
            suppress: 0,
            adaptiverho: 0,
            accelerate: 0,
            gapstop: 0,
            warmstart: 0,
            resume: 0,
            diagnostic: 0,
            x0: ptr::null_mut(),
            nu0: ptr::null_mut(),
        }
    }
}

/// Native per-solve diagnostics record, written by `pogs_solve`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PogsInfo {
    pub err: c_int,
    pub converged: c_int,
    pub k: c_uint,
    pub obj: Float,
    pub rho: Float,
    pub setup_time: Float,
    pub solve_time: Float,
}

/// Result buffer pointers written by `pogs_solve`.
///
/// Buffers are owned on the Rust side and outlive every solve call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PogsOutput {
    pub x: *mut Float,
    pub y: *mut Float,
    pub mu: *mut Float,
    pub nu: *mut Float,
}

/// Problem data descriptor for `pogs_init`.
///
/// Dense problems pass the contiguous value block and leave `ind`/`ptr` null;
/// sparse problems pass the compressed-storage triplet.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PogsProblemData {
    pub val: *const Float,
    pub ind: *const i64,
    pub ptr: *const i64,
    pub nnz: i64,
}

/// Factorization/equilibration buffer pointers for export/import.
///
/// `chol` is null for solver variants that keep no dense factor.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PogsPrivData {
    pub a_equil: *mut Float,
    pub chol: *mut Float,
    pub d: *mut Float,
    pub e: *mut Float,
}

/// Construction flags: problem dimensions, storage order, and how any
/// cached artifacts were produced.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PogsSolverFlags {
    pub m: usize,
    pub n: usize,
    pub ord: c_uint,
    /// Nonzero when the variant uses a direct (factorization-based) projection
    pub direct: c_int,
    /// Nonzero when a valid factor is present and factorization can be skipped
    pub factorized: c_int,
}
