//! Snapshots of solver numerical state and factorization caches.
//!
//! [`SolverState`] holds the warm-start iterate and penalty parameter;
//! [`SolverCache`] holds the equilibration/factorization artifacts plus the
//! flags describing how they were produced. Both are plain owned buffers,
//! independent of any live native handle: they are produced by exporting
//! from a solver and consumed to reconstruct one.

use crate::archive::{ArchiveEntries, ArchiveValue, LayeredCache};
use crate::error::{PogsError, PogsResult};
use crate::ffi::types::{Float, PogsPrivData, PogsSolverFlags};

/// Number of stacked `(m + n)` blocks in the native iterate layout
/// (primal/dual iterates, their half-step updates, and history buffers).
pub const STATE_BLOCKS: usize = 6;

/// Archive key of the iterate buffer.
pub const STATE_KEY: &str = "state";
/// Archive key of the penalty parameter.
pub const RHO_KEY: &str = "rho";
/// Archive key of the equilibrated data matrix.
pub const A_EQUIL_KEY: &str = "a_equil";
/// Archive key of the dense projection factor.
pub const CHOL_KEY: &str = "chol";
/// Archive key of the row equilibration scales.
pub const D_KEY: &str = "d";
/// Archive key of the column equilibration scales.
pub const E_KEY: &str = "e";
/// Archive key of the cache production flags.
pub const FLAGS_KEY: &str = "flags";

/// Warm-start snapshot: the solver iterate plus the penalty parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverState {
    vec: Vec<Float>,
    rho: Float,
}

impl SolverState {
    /// Zero state for problem dimensions `(m, n)`, with `rho = 1`.
    pub fn zeros(m: usize, n: usize) -> Self {
        Self {
            vec: vec![0.0; STATE_BLOCKS * (m + n)],
            rho: 1.0,
        }
    }

    /// Reconstruct from a layered cache.
    ///
    /// A missing `state` entry yields the zero iterate; a present one must
    /// match the expected length exactly. A missing `rho` defaults to `1.0`
    /// (persisted archives predating the penalty entry stay loadable).
    pub fn from_layered(cache: &LayeredCache, m: usize, n: usize) -> PogsResult<Self> {
        let mut state = Self::zeros(m, n);
        if cache.contains(STATE_KEY) {
            let data = cache.array(STATE_KEY)?;
            if data.len() != state.vec.len() {
                return Err(PogsError::ShapeMismatch {
                    key: STATE_KEY.to_owned(),
                    expected: state.vec.len(),
                    got: data.len(),
                });
            }
            for (dst, &src) in state.vec.iter_mut().zip(data) {
                *dst = src as Float;
            }
        }
        state.rho = cache.scalar_or(RHO_KEY, 1.0)? as Float;
        Ok(state)
    }

    /// Iterate buffer, length `STATE_BLOCKS * (m + n)`.
    pub fn iterate(&self) -> &[Float] {
        &self.vec
    }

    /// Penalty parameter at the snapshot.
    pub fn rho(&self) -> Float {
        self.rho
    }

    /// Add the state entries to an archive map.
    pub fn export_into(&self, entries: &mut ArchiveEntries) {
        entries.insert(STATE_KEY.to_owned(), ArchiveValue::from_floats(&self.vec));
        entries.insert(RHO_KEY.to_owned(), ArchiveValue::Scalar(self.rho as f64));
    }

    pub(crate) fn iterate_mut(&mut self) -> &mut [Float] {
        &mut self.vec
    }

    pub(crate) fn set_rho(&mut self, rho: Float) {
        self.rho = rho;
    }
}

/// Buffer lengths of the named cache arrays for one solver variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheShape {
    /// Equilibrated data matrix (dense `m * n`, sparse `nnz`).
    pub a_equil: usize,
    /// Dense projection factor (`min(m, n)^2`; zero when the variant keeps none).
    pub chol: usize,
    /// Row scales (`m`).
    pub d: usize,
    /// Column scales (`n`).
    pub e: usize,
}

/// Factorization/equilibration artifacts exported from a live solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverCache {
    a_equil: Vec<Float>,
    chol: Vec<Float>,
    d: Vec<Float>,
    e: Vec<Float>,
    flags: PogsSolverFlags,
}

impl SolverCache {
    /// Zero-filled cache of the given shape, flags from the variant.
    pub fn zeros(shape: CacheShape, flags: PogsSolverFlags) -> Self {
        Self {
            a_equil: vec![0.0; shape.a_equil],
            chol: vec![0.0; shape.chol],
            d: vec![0.0; shape.d],
            e: vec![0.0; shape.e],
            flags,
        }
    }

    /// Assemble a cache from a layered lookup.
    ///
    /// Each named buffer takes the cached array (length-checked, converted to
    /// the solver precision) when present, else zeros of the declared shape.
    /// The `flags` record overlays only the recognized production flags
    /// (`direct`, `factorized`); unknown names are ignored. With
    /// `allow_cholesky = false` any persisted factor is discarded and
    /// `factorized` cleared, forcing the native side to refactorize.
    pub fn from_layered(
        shape: CacheShape,
        base_flags: PogsSolverFlags,
        cache: &LayeredCache,
        allow_cholesky: bool,
    ) -> PogsResult<Self> {
        let mut out = Self::zeros(shape, base_flags);

        fill_buffer(&mut out.a_equil, cache, A_EQUIL_KEY)?;
        fill_buffer(&mut out.d, cache, D_KEY)?;
        fill_buffer(&mut out.e, cache, E_KEY)?;
        if allow_cholesky {
            fill_buffer(&mut out.chol, cache, CHOL_KEY)?;
        }

        if let Some(record) = cache.record(FLAGS_KEY)? {
            if let Some(&direct) = record.get("direct") {
                out.flags.direct = direct as i32;
            }
            if let Some(&factorized) = record.get("factorized") {
                out.flags.factorized = factorized as i32;
            }
        }
        if !allow_cholesky {
            out.flags.factorized = 0;
        }
        Ok(out)
    }

    /// Production flags.
    pub fn flags(&self) -> PogsSolverFlags {
        self.flags
    }

    pub(crate) fn set_flags(&mut self, flags: PogsSolverFlags) {
        self.flags = flags;
    }

    /// Equilibrated data buffer.
    pub fn a_equil(&self) -> &[Float] {
        &self.a_equil
    }

    /// Dense projection factor; empty for variants that keep none.
    pub fn chol(&self) -> &[Float] {
        &self.chol
    }

    /// Row equilibration scales.
    pub fn d(&self) -> &[Float] {
        &self.d
    }

    /// Column equilibration scales.
    pub fn e(&self) -> &[Float] {
        &self.e
    }

    /// Add the cache entries (and its flags record) to an archive map.
    ///
    /// An empty factor buffer is omitted rather than archived.
    pub fn export_into(&self, entries: &mut ArchiveEntries) {
        entries.insert(
            A_EQUIL_KEY.to_owned(),
            ArchiveValue::from_floats(&self.a_equil),
        );
        if !self.chol.is_empty() {
            entries.insert(CHOL_KEY.to_owned(), ArchiveValue::from_floats(&self.chol));
        }
        entries.insert(D_KEY.to_owned(), ArchiveValue::from_floats(&self.d));
        entries.insert(E_KEY.to_owned(), ArchiveValue::from_floats(&self.e));

        let mut flags = std::collections::BTreeMap::new();
        flags.insert("ord".to_owned(), self.flags.ord as i64);
        flags.insert("direct".to_owned(), i64::from(self.flags.direct));
        flags.insert("factorized".to_owned(), i64::from(self.flags.factorized));
        entries.insert(FLAGS_KEY.to_owned(), ArchiveValue::Record(flags));
    }

    /// Native pointer record for the export/import entry points.
    ///
    /// Pointers borrow the buffers owned by `self`; the record must not
    /// outlive the borrow. An empty factor buffer maps to a null pointer.
    pub(crate) fn as_native(&mut self) -> PogsPrivData {
        PogsPrivData {
            a_equil: self.a_equil.as_mut_ptr(),
            chol: if self.chol.is_empty() {
                std::ptr::null_mut()
            } else {
                self.chol.as_mut_ptr()
            },
            d: self.d.as_mut_ptr(),
            e: self.e.as_mut_ptr(),
        }
    }
}

fn fill_buffer(target: &mut [Float], cache: &LayeredCache, key: &str) -> PogsResult<()> {
    if !cache.contains(key) {
        return Ok(());
    }
    let data = cache.array(key)?;
    if data.len() != target.len() {
        return Err(PogsError::ShapeMismatch {
            key: key.to_owned(),
            expected: target.len(),
            got: data.len(),
        });
    }
    for (dst, &src) in target.iter_mut().zip(data) {
        *dst = src as Float;
    }
    Ok(())
}
