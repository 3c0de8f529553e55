//! Session layer for the POGS operator-splitting solver.
//!
//! POGS solves graph-form convex problems
//!
//! ```text
//! minimize    f(y) + g(x)
//! subject to  y = A x
//! ```
//!
//! with separable `f` and `g`, by ADMM over an equilibrated, factorized copy
//! of `A`. The native solver does the numerical work; this crate manages
//! everything around it:
//!
//! - **Objective encoding**: per-coordinate convex function parameters with
//!   validated sliced assignment ([`Objective`], [`FunctionKind`]).
//! - **Lifecycle**: at most one live native handle per [`SolverSession`],
//!   RAII release on every path, and a process-wide live-handle counter
//!   ([`live_handle_count`]) for leak auditing.
//! - **Warm starting**: snapshot and restore the solver iterate and penalty
//!   parameter ([`SolverState`]).
//! - **Factorization caching**: export equilibration and factorization
//!   artifacts from a live solver and import them into a new one, skipping
//!   the expensive re-factorization ([`SolverCache`]).
//! - **Persistence**: serialize the combined state to a durable archive and
//!   assemble warm starts from archived and freshly supplied values with
//!   override-wins precedence ([`LayeredCache`]).
//!
//! # Example
//!
//! ```ignore
//! use nalgebra::DMatrix;
//! use pogs::{
//!     DenseVariant, FunctionKind, Objective, ObjectiveUpdate, SettingsUpdate, SolverSession,
//! };
//!
//! // Nonnegative least squares: min ||Ax - b||^2 / 2  s.t.  x >= 0
//! let a = DMatrix::from_fn(20, 5, |i, j| ((i * 7 + j) % 11) as f64 / 11.0);
//! let mut session = SolverSession::new(DenseVariant::new(a))?;
//!
//! let mut f = Objective::new(20);
//! f.set(.., &ObjectiveUpdate::new().kind(FunctionKind::Square).b(1.0))?;
//! let mut g = Objective::new(5);
//! g.set(.., &ObjectiveUpdate::new().kind(FunctionKind::IndGe0))?;
//!
//! session.solve(&f, &g, &SettingsUpdate::new().reltol(1e-4))?;
//! println!("x = {:?}", session.output().x());
//!
//! // Persist the factorization for the next process.
//! session.save("run".as_ref(), "warm", true, true)?;
//! # Ok::<(), pogs::PogsError>(())
//! ```
//!
//! The native library is loaded dynamically on first use; everything that
//! does not touch a live solver (encoding, caches, archives) works without
//! it.

#![warn(clippy::all)]

pub mod archive;
pub mod error;
pub mod ffi;
pub mod objective;
pub mod session;
pub mod settings;
pub mod state;
pub mod variant;

pub use archive::{Archive, ArchiveEntries, ArchiveValue, LayeredCache};
pub use error::{PogsError, PogsResult};
pub use ffi::types::Float;
pub use objective::{FieldValue, FunctionKind, IndexRange, Objective, ObjectiveUpdate};
pub use session::{live_handle_count, SolverInfo, SolverOutput, SolverSession};
pub use settings::{SettingsUpdate, SolverSettings};
pub use state::{SolverCache, SolverState, STATE_BLOCKS};
pub use variant::{DenseVariant, SolverVariant, SparseVariant};

/// Native solver version `(major, minor, change, status)`.
pub fn native_version() -> PogsResult<(i32, i32, i32, i32)> {
    let libs = ffi::libs()?;
    let (mut major, mut minor, mut change, mut status) = (0, 0, 0, 0);
    ffi::check_status(
        unsafe { (libs.version)(&mut major, &mut minor, &mut change, &mut status) },
        "pogs_version",
    )?;
    Ok((major, minor, change, status))
}
