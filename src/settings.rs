//! Solver settings: a closed, validated set of named solve options.
//!
//! [`SolverSettings`] is the host-side source of truth; a native record is
//! produced per solve call by seeding the native defaults and overlaying
//! every host field. Per-call overrides arrive as a [`SettingsUpdate`] and
//! are applied through the same validators as direct assignment.

use crate::error::{PogsError, PogsResult};
use crate::ffi::types::{Float, PogsSettings};
use crate::ffi::PogsLibs;

/// Solver options, defaulted at construction to mirror the native defaults.
///
/// Numeric fields are validated non-negative (and finite) at assignment
/// time; a rejected assignment leaves the prior value intact.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    alpha: Float,
    rho: Float,
    abstol: Float,
    reltol: Float,
    tolproj: Float,
    toladapt: Float,
    anderson_regularization: Float,
    maxiter: u32,
    anderson_lookback: u32,
    verbose: u32,
    suppress: u32,
    adaptiverho: bool,
    accelerate: bool,
    gapstop: bool,
    warmstart: bool,
    resume: bool,
    diagnostic: bool,
    x0: Option<Vec<Float>>,
    nu0: Option<Vec<Float>>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            alpha: 1.7,
            rho: 1.0,
            abstol: 1e-4,
            reltol: 1e-3,
            tolproj: 1e-8,
            toladapt: 1e-2,
            anderson_regularization: 1e-8,
            maxiter: 2000,
            anderson_lookback: 10,
            verbose: 2,
            suppress: 0,
            adaptiverho: true,
            accelerate: false,
            gapstop: false,
            warmstart: false,
            resume: false,
            diagnostic: false,
            x0: None,
            nu0: None,
        }
    }
}

macro_rules! float_getters {
    ($($field:ident),* $(,)?) => {
        $(
            pub fn $field(&self) -> Float {
                self.$field
            }
        )*
    };
}

macro_rules! uint_getters {
    ($($field:ident),* $(,)?) => {
        $(
            pub fn $field(&self) -> u32 {
                self.$field
            }
        )*
    };
}

macro_rules! bool_getters {
    ($($field:ident),* $(,)?) => {
        $(
            pub fn $field(&self) -> bool {
                self.$field
            }
        )*
    };
}

#[allow(missing_docs)] // Accessors are named after the native settings fields.
impl SolverSettings {
    float_getters!(
        alpha,
        rho,
        abstol,
        reltol,
        tolproj,
        toladapt,
        anderson_regularization,
    );
    uint_getters!(maxiter, anderson_lookback, verbose, suppress);
    bool_getters!(
        adaptiverho,
        accelerate,
        gapstop,
        warmstart,
        resume,
        diagnostic,
    );

    /// Warm-start primal iterate, if supplied (length `n`).
    pub fn x0(&self) -> Option<&[Float]> {
        self.x0.as_deref()
    }

    /// Warm-start dual iterate, if supplied (length `m`).
    pub fn nu0(&self) -> Option<&[Float]> {
        self.nu0.as_deref()
    }

    /// Apply per-call overrides.
    ///
    /// Fields are validated and assigned one at a time in declaration order;
    /// a failing validation surfaces immediately and leaves that field (and
    /// the not-yet-visited ones) at their prior values.
    pub fn apply(&mut self, update: &SettingsUpdate) -> PogsResult<()> {
        for (name, value, target) in [
            ("alpha", update.alpha, &mut self.alpha),
            ("rho", update.rho, &mut self.rho),
            ("abstol", update.abstol, &mut self.abstol),
            ("reltol", update.reltol, &mut self.reltol),
            ("tolproj", update.tolproj, &mut self.tolproj),
            ("toladapt", update.toladapt, &mut self.toladapt),
            (
                "anderson_regularization",
                update.anderson_regularization,
                &mut self.anderson_regularization,
            ),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(PogsError::InvalidParameter {
                        name,
                        reason: format!("must be >= 0, got {v}"),
                    });
                }
                *target = v;
            }
        }

        for (value, target) in [
            (update.maxiter, &mut self.maxiter),
            (update.anderson_lookback, &mut self.anderson_lookback),
            (update.verbose, &mut self.verbose),
            (update.suppress, &mut self.suppress),
        ] {
            if let Some(v) = value {
                *target = v;
            }
        }

        for (value, target) in [
            (update.adaptiverho, &mut self.adaptiverho),
            (update.accelerate, &mut self.accelerate),
            (update.gapstop, &mut self.gapstop),
            (update.warmstart, &mut self.warmstart),
            (update.resume, &mut self.resume),
            (update.diagnostic, &mut self.diagnostic),
        ] {
            if let Some(v) = value {
                *target = v;
            }
        }

        if let Some(x0) = &update.x0 {
            self.x0 = Some(x0.clone());
        }
        if let Some(nu0) = &update.nu0 {
            self.nu0 = Some(nu0.clone());
        }
        Ok(())
    }

    /// Build the native record for a solve call.
    ///
    /// Seeds the record through the native default initializer, then overlays
    /// every host field; warm-start pointers refer to the buffers owned by
    /// `self` and stay valid for the duration of the call.
    pub fn to_native(&self, libs: &PogsLibs) -> PogsResult<PogsSettings> {
        let mut c = PogsSettings::zeroed();
        crate::ffi::check_status(
            unsafe { (libs.set_default_settings)(&mut c) },
            "pogs_set_default_settings",
        )?;

        c.alpha = self.alpha;
        c.rho = self.rho;
        c.abstol = self.abstol;
        c.reltol = self.reltol;
        c.tolproj = self.tolproj;
        c.toladapt = self.toladapt;
        c.anderson_regularization = self.anderson_regularization;
        c.maxiter = self.maxiter;
        c.anderson_lookback = self.anderson_lookback;
        c.verbose = self.verbose;
        c.suppress = self.suppress;
        c.adaptiverho = self.adaptiverho as i32;
        c.accelerate = self.accelerate as i32;
        c.gapstop = self.gapstop as i32;
        c.warmstart = self.warmstart as i32;
        c.resume = self.resume as i32;
        c.diagnostic = self.diagnostic as i32;
        c.x0 = self
            .x0
            .as_deref()
            .map(|v| v.as_ptr() as *mut Float)
            .unwrap_or(std::ptr::null_mut());
        c.nu0 = self
            .nu0
            .as_deref()
            .map(|v| v.as_ptr() as *mut Float)
            .unwrap_or(std::ptr::null_mut());
        Ok(c)
    }
}

/// Per-call settings overrides; only the present fields are assigned.
///
/// The field set is closed, so an unrecognized option is a compile error
/// rather than a runtime surprise.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)] // Fields mirror `SolverSettings` one for one.
pub struct SettingsUpdate {
    pub alpha: Option<Float>,
    pub rho: Option<Float>,
    pub abstol: Option<Float>,
    pub reltol: Option<Float>,
    pub tolproj: Option<Float>,
    pub toladapt: Option<Float>,
    pub anderson_regularization: Option<Float>,
    pub maxiter: Option<u32>,
    pub anderson_lookback: Option<u32>,
    pub verbose: Option<u32>,
    pub suppress: Option<u32>,
    pub adaptiverho: Option<bool>,
    pub accelerate: Option<bool>,
    pub gapstop: Option<bool>,
    pub warmstart: Option<bool>,
    pub resume: Option<bool>,
    pub diagnostic: Option<bool>,
    pub x0: Option<Vec<Float>>,
    pub nu0: Option<Vec<Float>>,
}

impl SettingsUpdate {
    /// Empty update; chain setters to populate it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Penalty parameter override.
    pub fn rho(mut self, rho: Float) -> Self {
        self.rho = Some(rho);
        self
    }

    /// Absolute tolerance override.
    pub fn abstol(mut self, tol: Float) -> Self {
        self.abstol = Some(tol);
        self
    }

    /// Relative tolerance override.
    pub fn reltol(mut self, tol: Float) -> Self {
        self.reltol = Some(tol);
        self
    }

    /// Iteration cap override.
    pub fn maxiter(mut self, maxiter: u32) -> Self {
        self.maxiter = Some(maxiter);
        self
    }

    /// Long-standing alias for [`SettingsUpdate::maxiter`].
    pub fn maxiters(self, maxiter: u32) -> Self {
        self.maxiter(maxiter)
    }

    /// Verbosity override.
    pub fn verbose(mut self, level: u32) -> Self {
        self.verbose = Some(level);
        self
    }

    /// Toggle adaptive penalty updates.
    pub fn adaptiverho(mut self, on: bool) -> Self {
        self.adaptiverho = Some(on);
        self
    }

    /// Toggle Anderson acceleration.
    pub fn accelerate(mut self, on: bool) -> Self {
        self.accelerate = Some(on);
        self
    }

    /// Resume from the solver's retained iterate.
    pub fn resume(mut self, on: bool) -> Self {
        self.resume = Some(on);
        self
    }

    /// Warm-start primal iterate (length `n`, checked at solve time).
    pub fn x0(mut self, x0: Vec<Float>) -> Self {
        self.x0 = Some(x0);
        self
    }

    /// Warm-start dual iterate (length `m`, checked at solve time).
    pub fn nu0(mut self, nu0: Vec<Float>) -> Self {
        self.nu0 = Some(nu0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = SolverSettings::default();
        assert_eq!(s.alpha(), 1.7);
        assert_eq!(s.rho(), 1.0);
        assert_eq!(s.maxiter(), 2000);
        assert!(s.adaptiverho());
        assert!(!s.accelerate());
        assert!(s.x0().is_none());
    }

    #[test]
    fn test_apply_overrides() {
        let mut s = SolverSettings::default();
        s.apply(
            &SettingsUpdate::new()
                .rho(2.5)
                .maxiters(500)
                .accelerate(true),
        )
        .unwrap();
        assert_eq!(s.rho(), 2.5);
        assert_eq!(s.maxiter(), 500);
        assert!(s.accelerate());
        // Untouched fields keep their defaults.
        assert_eq!(s.alpha(), 1.7);
    }

    #[test]
    fn test_negative_float_rejected() {
        let mut s = SolverSettings::default();
        let err = s.apply(&SettingsUpdate::new().abstol(-1.0)).unwrap_err();
        assert!(matches!(
            err,
            PogsError::InvalidParameter { name: "abstol", .. }
        ));
        assert_eq!(s.abstol(), 1e-4);
    }

    #[test]
    fn test_nan_rejected() {
        let mut s = SolverSettings::default();
        assert!(s.apply(&SettingsUpdate::new().rho(Float::NAN)).is_err());
        assert_eq!(s.rho(), 1.0);
    }

    #[test]
    fn test_warm_start_buffers() {
        let mut s = SolverSettings::default();
        s.apply(&SettingsUpdate::new().x0(vec![1.0, 2.0]).nu0(vec![3.0]))
            .unwrap();
        assert_eq!(s.x0().unwrap(), &[1.0, 2.0]);
        assert_eq!(s.nu0().unwrap(), &[3.0]);
    }
}
