//! End-to-end warm-start scenarios against a live native solver.
//!
//! Everything here drives the real native library: fresh builds, solve
//! calls, save/load round trips, and export/import rebuilds. On hosts
//! without the library installed the tests skip with a message, mirroring
//! how the availability-gated backends are tested elsewhere.

use std::sync::Mutex;

use nalgebra::DMatrix;
use pogs::{
    live_handle_count, Archive, Float, FunctionKind, LayeredCache, Objective, ObjectiveUpdate,
    PogsError, SettingsUpdate, SolverSession, SolverState, DenseVariant,
};

// The live-handle counter is process-wide; serialize the native tests so
// its values are deterministic.
static NATIVE_LOCK: Mutex<()> = Mutex::new(());

fn native_available() -> bool {
    if pogs::ffi::is_available() {
        true
    } else {
        eprintln!("skipping: native POGS library not available");
        false
    }
}

fn test_matrix(m: usize, n: usize) -> DMatrix<Float> {
    // Deterministic, well-conditioned: diagonal dominance plus a dense tail.
    DMatrix::from_fn(m, n, |i, j| {
        let base = ((i * 31 + j * 17) % 13) as Float / 13.0;
        if i == j {
            base + 2.0
        } else {
            base * 0.3
        }
    })
}

fn ridge_objectives(m: usize, n: usize) -> (Objective, Objective) {
    // min ||y - 1||^2 / 2 + 0.1 ||x||^2 / 2  s.t.  y = A x
    let mut f = Objective::new(m);
    f.set(
        ..,
        &ObjectiveUpdate::new().kind(FunctionKind::Square).b(1.0),
    )
    .unwrap();
    let mut g = Objective::new(n);
    g.set(
        ..,
        &ObjectiveUpdate::new().kind(FunctionKind::Square).c(0.1),
    )
    .unwrap();
    (f, g)
}

fn quiet() -> SettingsUpdate {
    SettingsUpdate::new().verbose(0).maxiters(2000)
}

#[test]
fn test_fresh_build_solve_release() {
    let _guard = NATIVE_LOCK.lock().unwrap();
    if !native_available() {
        return;
    }

    let (m, n) = (10, 5);
    let mut session = SolverSession::new(DenseVariant::new(test_matrix(m, n))).unwrap();
    assert!(session.is_built());
    assert_eq!(live_handle_count(), 1);
    assert!(session.first_run());

    let (f, g) = ridge_objectives(m, n);
    session.solve(&f, &g, &quiet()).unwrap();
    assert!(!session.first_run());
    assert!(session.info().converged(), "ridge problem must converge");
    assert!(session.info().iterations() > 0);
    assert_eq!(session.output().x().len(), n);

    session.release().unwrap();
    assert!(!session.is_built());
    assert_eq!(live_handle_count(), 0);
    // Idempotent.
    session.release().unwrap();
    assert_eq!(live_handle_count(), 0);
}

#[test]
fn test_live_handle_accounting_across_sessions() {
    let _guard = NATIVE_LOCK.lock().unwrap();
    if !native_available() {
        return;
    }

    let a = test_matrix(6, 4);
    let mut first = SolverSession::new(DenseVariant::new(a.clone())).unwrap();
    assert_eq!(live_handle_count(), 1);
    {
        let _second = SolverSession::new(DenseVariant::new(a)).unwrap();
        assert_eq!(live_handle_count(), 2);
        // Dropping a session releases its handle through the RAII guard.
    }
    assert_eq!(live_handle_count(), 1);
    first.release().unwrap();
    assert_eq!(live_handle_count(), 0);
}

#[test]
fn test_save_load_round_trip() {
    let _guard = NATIVE_LOCK.lock().unwrap();
    if !native_available() {
        return;
    }

    let (m, n) = (10, 5);
    let dir = tempfile::tempdir().unwrap();
    let (f, g) = ridge_objectives(m, n);

    let mut session = SolverSession::new(DenseVariant::new(test_matrix(m, n))).unwrap();
    session.solve(&f, &g, &quiet()).unwrap();
    let reference_info = *session.info();
    let snapshot = session.state().unwrap().clone();

    let path = session.save(dir.path(), "warm", true, true).unwrap();
    assert!(path.to_string_lossy().ends_with(".json"));

    // Saving to the same name again must refuse and leave the file alone.
    let before = std::fs::read(&path).unwrap();
    assert!(matches!(
        session.save(dir.path(), "warm", true, true),
        Err(PogsError::AlreadyExists(_))
    ));
    assert_eq!(std::fs::read(&path).unwrap(), before);
    session.release().unwrap();

    // The archived state reproduces the snapshot exactly.
    let archive = Archive::open(&path).unwrap();
    let restored =
        SolverState::from_layered(&LayeredCache::from_archive(archive), m, n).unwrap();
    assert_eq!(restored, snapshot);

    // A session rebuilt from the archive solves the same problem to the
    // same convergence outcome, warm.
    let mut warm = SolverSession::unbuilt(DenseVariant::new(test_matrix(m, n)));
    warm.load(&path, true).unwrap();
    assert!(warm.is_built());
    warm.solve(&f, &g, &quiet()).unwrap();
    assert_eq!(warm.info().converged(), reference_info.converged());
    assert!(
        warm.info().iterations() <= reference_info.iterations(),
        "warm start must not iterate more than the cold solve"
    );
}

#[test]
fn test_save_can_strip_factorization() {
    let _guard = NATIVE_LOCK.lock().unwrap();
    if !native_available() {
        return;
    }

    let (m, n) = (8, 4);
    let dir = tempfile::tempdir().unwrap();
    let (f, g) = ridge_objectives(m, n);

    let mut session = SolverSession::new(DenseVariant::new(test_matrix(m, n))).unwrap();
    session.solve(&f, &g, &quiet()).unwrap();

    let full = session.save(dir.path(), "full", true, true).unwrap();
    let lean = session.save(dir.path(), "lean", true, false).unwrap();
    let none = session.save(dir.path(), "state-only", false, true).unwrap();
    session.release().unwrap();

    let full = Archive::open(&full).unwrap();
    assert!(full.contains("chol"));
    assert!(full.contains("a_equil"));

    let lean = Archive::open(&lean).unwrap();
    assert!(!lean.contains("chol"));
    assert!(lean.contains("a_equil"));
    assert!(lean.contains("flags"));

    let none = Archive::open(&none).unwrap();
    assert!(!none.contains("a_equil"));
    assert!(none.contains("state"));
    assert!(none.contains("rho"));
}

#[test]
fn test_load_missing_archive_starts_cold() {
    let _guard = NATIVE_LOCK.lock().unwrap();
    if !native_available() {
        return;
    }

    let (m, n) = (6, 3);
    let dir = tempfile::tempdir().unwrap();
    let mut session = SolverSession::unbuilt(DenseVariant::new(test_matrix(m, n)));
    session
        .load(&dir.path().join("never-written"), true)
        .unwrap();
    assert!(session.is_built());

    // Cold start: default penalty parameter, zero iterate.
    let state = session.state().unwrap();
    assert!((state.rho() - 1.0).abs() < 1e-12);

    let (f, g) = ridge_objectives(m, n);
    session.solve(&f, &g, &quiet()).unwrap();
    assert!(session.info().converged());
}

#[test]
fn test_export_import_reproduces_convergence() {
    let _guard = NATIVE_LOCK.lock().unwrap();
    if !native_available() {
        return;
    }

    let (m, n) = (10, 5);
    let (f, g) = ridge_objectives(m, n);

    let mut original = SolverSession::new(DenseVariant::new(test_matrix(m, n))).unwrap();
    original.solve(&f, &g, &quiet()).unwrap();
    let reference_info = *original.info();

    let cache = original.export_cache().unwrap().clone();
    let state = original.state().unwrap().clone();
    original.release().unwrap();

    let mut rebuilt =
        SolverSession::from_parts(DenseVariant::new(test_matrix(m, n)), cache, state).unwrap();
    assert!(rebuilt.is_built());
    assert_eq!(live_handle_count(), 1);

    rebuilt.solve(&f, &g, &quiet()).unwrap();
    assert_eq!(rebuilt.info().converged(), reference_info.converged());
    let obj_gap = (rebuilt.info().objective() - reference_info.objective()).abs();
    let scale = reference_info.objective().abs().max(1.0);
    assert!(
        obj_gap <= 1e-3 * scale,
        "objective {} too far from reference {}",
        rebuilt.info().objective(),
        reference_info.objective()
    );
    rebuilt.release().unwrap();
    assert_eq!(live_handle_count(), 0);
}
