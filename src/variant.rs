//! Solver variant strategies: dense and sparse problem data.
//!
//! A [`SolverVariant`] supplies everything about a session that depends on
//! how the data matrix is stored: the native problem-data descriptor, the
//! construction flags, and the shape of the factorization cache. The session
//! holds one as a strategy object and stays agnostic of the storage.

use nalgebra::DMatrix;
use sprs::CsMatI;

use crate::archive::LayeredCache;
use crate::error::PogsResult;
use crate::ffi::types::{Float, Order, PogsProblemData, PogsSolverFlags};
use crate::state::{CacheShape, SolverCache};

/// Capability contract every solver variant implements.
pub trait SolverVariant {
    /// Problem dimensions `(m, n)`.
    fn shape(&self) -> (usize, usize);

    /// Native problem-data descriptor.
    ///
    /// Pointers borrow storage owned by the variant and are only valid while
    /// the variant is alive and unmoved; the session consumes the descriptor
    /// immediately in the native construction call.
    fn problem_data(&self) -> PogsProblemData;

    /// Native construction flags (dimensions, storage order, method).
    fn solver_flags(&self) -> PogsSolverFlags;

    /// Buffer lengths of the factorization/equilibration cache.
    fn cache_shape(&self) -> CacheShape;

    /// Resolve a layered cache into an importable [`SolverCache`].
    fn cache_from_layered(
        &self,
        cache: &LayeredCache,
        allow_cholesky: bool,
    ) -> PogsResult<SolverCache> {
        SolverCache::from_layered(
            self.cache_shape(),
            self.solver_flags(),
            cache,
            allow_cholesky,
        )
    }
}

/// Dense data matrix, stored column-major; uses the direct (factorizing)
/// projection and therefore keeps a `min(m, n)^2` Cholesky block in its cache.
pub struct DenseVariant {
    a: DMatrix<Float>,
}

impl DenseVariant {
    /// Wrap a dense data matrix.
    pub fn new(a: DMatrix<Float>) -> Self {
        Self { a }
    }

    /// Borrow the data matrix.
    pub fn matrix(&self) -> &DMatrix<Float> {
        &self.a
    }
}

impl SolverVariant for DenseVariant {
    fn shape(&self) -> (usize, usize) {
        (self.a.nrows(), self.a.ncols())
    }

    fn problem_data(&self) -> PogsProblemData {
        PogsProblemData {
            val: self.a.as_slice().as_ptr(),
            ind: std::ptr::null(),
            ptr: std::ptr::null(),
            nnz: (self.a.nrows() * self.a.ncols()) as i64,
        }
    }

    fn solver_flags(&self) -> PogsSolverFlags {
        let (m, n) = self.shape();
        PogsSolverFlags {
            m,
            n,
            ord: Order::ColMajor as u32,
            direct: 1,
            factorized: 0,
        }
    }

    fn cache_shape(&self) -> CacheShape {
        let (m, n) = self.shape();
        let k = m.min(n);
        CacheShape {
            a_equil: m * n,
            chol: k * k,
            d: m,
            e: n,
        }
    }
}

/// Sparse data matrix in compressed storage; uses the indirect projection
/// and keeps no dense factor.
pub struct SparseVariant {
    m: usize,
    n: usize,
    ord: Order,
    val: Vec<Float>,
    ind: Vec<i64>,
    ptr: Vec<i64>,
}

impl SparseVariant {
    /// Convert a `sprs` matrix into the native compressed layout, preserving
    /// its CSC/CSR storage kind.
    pub fn new(a: &CsMatI<Float, usize>) -> Self {
        let ord = if a.is_csr() {
            Order::RowMajor
        } else {
            Order::ColMajor
        };
        Self {
            m: a.rows(),
            n: a.cols(),
            ord,
            val: a.data().to_vec(),
            ind: a.indices().iter().map(|&i| i as i64).collect(),
            ptr: a.proper_indptr().iter().map(|&p| p as i64).collect(),
        }
    }

    /// Number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.val.len()
    }
}

impl SolverVariant for SparseVariant {
    fn shape(&self) -> (usize, usize) {
        (self.m, self.n)
    }

    fn problem_data(&self) -> PogsProblemData {
        PogsProblemData {
            val: self.val.as_ptr(),
            ind: self.ind.as_ptr(),
            ptr: self.ptr.as_ptr(),
            nnz: self.val.len() as i64,
        }
    }

    fn solver_flags(&self) -> PogsSolverFlags {
        PogsSolverFlags {
            m: self.m,
            n: self.n,
            ord: self.ord as u32,
            direct: 0,
            factorized: 0,
        }
    }

    fn cache_shape(&self) -> CacheShape {
        CacheShape {
            a_equil: self.nnz(),
            chol: 0,
            d: self.m,
            e: self.n,
        }
    }
}
