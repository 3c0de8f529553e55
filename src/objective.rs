//! Per-coordinate encoding of separable convex objectives.
//!
//! A separable objective is a sum of independent scalar terms
//!
//! ```text
//! f(x) = sum_i  c_i * k_i(a_i * x_i - b_i) + d_i * x_i + (e_i / 2) * x_i^2
//! ```
//!
//! where each kernel `k_i` is drawn from the closed [`FunctionKind`] set.
//! [`Objective`] stores one `(kind, a, b, c, d, e, s)` tuple per coordinate
//! and supports validated sliced assignment, bulk copies between encodings
//! of different sizes, and host-side evaluation.

use std::str::FromStr;

use crate::error::{PogsError, PogsResult};
use crate::ffi::types::Float;

/// Supported separable convex kernels.
///
/// The discriminants match the native solver's function enumeration and are
/// stable across releases; they are what gets encoded into the per-term
/// records handed to the native solve call.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionKind {
    /// k(z) = 0
    #[default]
    Zero = 0,
    /// k(z) = |z|
    Abs = 1,
    /// k(z) = e^z
    Exp = 2,
    /// Huber loss with transition width `s`
    Huber = 3,
    /// k(z) = z
    Identity = 4,
    /// Indicator of z in [0, 1]
    IndBox01 = 5,
    /// Indicator of z = 0
    IndEq0 = 6,
    /// Indicator of z >= 0
    IndGe0 = 7,
    /// Indicator of z <= 0
    IndLe0 = 8,
    /// k(z) = ln(1 + e^z)
    Logistic = 9,
    /// k(z) = max(-z, 0)
    MaxNeg0 = 10,
    /// k(z) = max(z, 0)
    MaxPos0 = 11,
    /// k(z) = z ln z
    NegEntr = 12,
    /// k(z) = -ln z
    NegLog = 13,
    /// k(z) = 1 / z
    Recip = 14,
    /// k(z) = z^2 / 2
    Square = 15,
}

impl FunctionKind {
    const ALL: [FunctionKind; 16] = [
        FunctionKind::Zero,
        FunctionKind::Abs,
        FunctionKind::Exp,
        FunctionKind::Huber,
        FunctionKind::Identity,
        FunctionKind::IndBox01,
        FunctionKind::IndEq0,
        FunctionKind::IndGe0,
        FunctionKind::IndLe0,
        FunctionKind::Logistic,
        FunctionKind::MaxNeg0,
        FunctionKind::MaxPos0,
        FunctionKind::NegEntr,
        FunctionKind::NegLog,
        FunctionKind::Recip,
        FunctionKind::Square,
    ];

    /// Lower-case name, matching the accepted `FromStr` form.
    pub fn name(self) -> &'static str {
        match self {
            FunctionKind::Zero => "zero",
            FunctionKind::Abs => "abs",
            FunctionKind::Exp => "exp",
            FunctionKind::Huber => "huber",
            FunctionKind::Identity => "identity",
            FunctionKind::IndBox01 => "indbox01",
            FunctionKind::IndEq0 => "indeq0",
            FunctionKind::IndGe0 => "indge0",
            FunctionKind::IndLe0 => "indle0",
            FunctionKind::Logistic => "logistic",
            FunctionKind::MaxNeg0 => "maxneg0",
            FunctionKind::MaxPos0 => "maxpos0",
            FunctionKind::NegEntr => "negentr",
            FunctionKind::NegLog => "neglog",
            FunctionKind::Recip => "recip",
            FunctionKind::Square => "square",
        }
    }

    /// Kernel value k(z). Indicator kernels contribute zero to the objective.
    fn eval(self, z: Float, s: Float) -> Float {
        match self {
            FunctionKind::Zero
            | FunctionKind::IndBox01
            | FunctionKind::IndEq0
            | FunctionKind::IndGe0
            | FunctionKind::IndLe0 => 0.0,
            FunctionKind::Abs => z.abs(),
            FunctionKind::Exp => z.exp(),
            FunctionKind::Huber => {
                let w = s.abs();
                if z.abs() <= w {
                    0.5 * z * z
                } else {
                    w * (z.abs() - 0.5 * w)
                }
            }
            FunctionKind::Identity => z,
            FunctionKind::Logistic => z.exp().ln_1p(),
            FunctionKind::MaxNeg0 => (-z).max(0.0),
            FunctionKind::MaxPos0 => z.max(0.0),
            FunctionKind::NegEntr => {
                if z > 0.0 {
                    z * z.ln()
                } else {
                    0.0
                }
            }
            FunctionKind::NegLog => {
                if z > 0.0 {
                    -z.ln()
                } else {
                    Float::INFINITY
                }
            }
            FunctionKind::Recip => {
                if z > 0.0 {
                    1.0 / z
                } else {
                    Float::INFINITY
                }
            }
            FunctionKind::Square => 0.5 * z * z,
        }
    }
}

impl FromStr for FunctionKind {
    type Err = PogsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        FunctionKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == lower)
            .ok_or_else(|| PogsError::InvalidParameter {
                name: "kind",
                reason: format!("unknown function kind `{s}`"),
            })
    }
}

impl TryFrom<u32> for FunctionKind {
    type Error = PogsError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        FunctionKind::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| PogsError::InvalidParameter {
                name: "kind",
                reason: format!("function kind tag {tag} out of range"),
            })
    }
}

/// A parameter value for a range assignment: one value broadcast across the
/// range, or one value per entry (length must equal the range length).
#[derive(Debug, Clone)]
pub enum FieldValue<T> {
    /// Broadcast a single value across the whole range.
    Uniform(T),
    /// Assign entry-by-entry; the vector length must match the range length.
    PerEntry(Vec<T>),
}

impl<T: Copy> FieldValue<T> {
    fn check_len(&self, field: &'static str, range_len: usize) -> PogsResult<()> {
        if let FieldValue::PerEntry(values) = self {
            if values.len() != range_len {
                return Err(PogsError::SizeMismatch(format!(
                    "objective parameter `{field}` has {} values for a slice of length {range_len}",
                    values.len()
                )));
            }
        }
        Ok(())
    }

    fn at(&self, i: usize) -> T {
        match self {
            FieldValue::Uniform(v) => *v,
            FieldValue::PerEntry(values) => values[i],
        }
    }
}

/// Partial update of an [`Objective`]: only the present fields are assigned.
///
/// The field set is closed; there is no way to address an unknown parameter.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveUpdate {
    pub kind: Option<FieldValue<FunctionKind>>,
    pub a: Option<FieldValue<Float>>,
    pub b: Option<FieldValue<Float>>,
    pub c: Option<FieldValue<Float>>,
    pub d: Option<FieldValue<Float>>,
    pub e: Option<FieldValue<Float>>,
    pub s: Option<FieldValue<Float>>,
}

macro_rules! update_setters {
    ($($field:ident, $per_entry:ident);* $(;)?) => {
        $(
            /// Broadcast this parameter across the assigned range.
            pub fn $field(mut self, value: Float) -> Self {
                self.$field = Some(FieldValue::Uniform(value));
                self
            }

            /// Assign this parameter entry-by-entry.
            pub fn $per_entry(mut self, values: Vec<Float>) -> Self {
                self.$field = Some(FieldValue::PerEntry(values));
                self
            }
        )*
    };
}

impl ObjectiveUpdate {
    /// Empty update; chain setters to populate it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the kernel for the whole range.
    pub fn kind(mut self, kind: FunctionKind) -> Self {
        self.kind = Some(FieldValue::Uniform(kind));
        self
    }

    /// Set the kernel entry-by-entry.
    pub fn kinds(mut self, kinds: Vec<FunctionKind>) -> Self {
        self.kind = Some(FieldValue::PerEntry(kinds));
        self
    }

    update_setters! {
        a, a_values;
        b, b_values;
        c, c_values;
        d, d_values;
        e, e_values;
        s, s_values;
    }
}

/// Index range over an encoding, with negative endpoints measured from the
/// end (end-exclusive). Built from the std range syntaxes over `isize`.
#[derive(Debug, Clone, Copy)]
pub struct IndexRange {
    start: Option<isize>,
    end: Option<isize>,
}

impl IndexRange {
    /// Resolve against length `n`: apply negative offsets and defaults, then
    /// require a non-empty in-bounds `[start, end)`.
    fn resolve(self, n: usize) -> PogsResult<(usize, usize)> {
        let resolve_end = |v: isize| if v < 0 { v + n as isize } else { v };
        let start = self.start.map(resolve_end).unwrap_or(0);
        let end = self.end.map(resolve_end).unwrap_or(n as isize);

        if start < 0 || end > n as isize || start >= end {
            return Err(PogsError::InvalidRange { start, end, len: n });
        }
        Ok((start as usize, end as usize))
    }
}

impl From<std::ops::RangeFull> for IndexRange {
    fn from(_: std::ops::RangeFull) -> Self {
        IndexRange {
            start: None,
            end: None,
        }
    }
}

impl From<std::ops::Range<isize>> for IndexRange {
    fn from(r: std::ops::Range<isize>) -> Self {
        IndexRange {
            start: Some(r.start),
            end: Some(r.end),
        }
    }
}

impl From<std::ops::RangeFrom<isize>> for IndexRange {
    fn from(r: std::ops::RangeFrom<isize>) -> Self {
        IndexRange {
            start: Some(r.start),
            end: None,
        }
    }
}

impl From<std::ops::RangeTo<isize>> for IndexRange {
    fn from(r: std::ops::RangeTo<isize>) -> Self {
        IndexRange {
            start: None,
            end: Some(r.end),
        }
    }
}

/// Separable objective of fixed size: one kernel + shape tuple per coordinate.
///
/// Created once per problem dimension and mutated in place between solves;
/// never resized.
#[derive(Debug, Clone)]
pub struct Objective {
    kind: Vec<FunctionKind>,
    a: Vec<Float>,
    b: Vec<Float>,
    c: Vec<Float>,
    d: Vec<Float>,
    e: Vec<Float>,
    s: Vec<Float>,
}

impl Objective {
    /// Identity encoding of length `n`: every term is `Zero` with
    /// `a = c = s = 1` and `b = d = e = 0`.
    pub fn new(n: usize) -> Self {
        Self {
            kind: vec![FunctionKind::Zero; n],
            a: vec![1.0; n],
            b: vec![0.0; n],
            c: vec![1.0; n],
            d: vec![0.0; n],
            e: vec![0.0; n],
            s: vec![1.0; n],
        }
    }

    /// Number of separable terms.
    pub fn len(&self) -> usize {
        self.kind.len()
    }

    /// True for the zero-dimensional encoding.
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }

    /// Per-field read access: `(kind, a, b, c, d, e, s)`.
    #[allow(clippy::type_complexity)]
    pub fn arrays(
        &self,
    ) -> (
        &[FunctionKind],
        &[Float],
        &[Float],
        &[Float],
        &[Float],
        &[Float],
        &[Float],
    ) {
        (
            &self.kind, &self.a, &self.b, &self.c, &self.d, &self.e, &self.s,
        )
    }

    /// Kernel tags.
    pub fn kinds(&self) -> &[FunctionKind] {
        &self.kind
    }

    /// Assign parameters over a validated index range.
    ///
    /// `range` accepts `..`, `s..`, `..e`, and `s..e` with negative endpoints
    /// measured from the end. Values broadcast ([`FieldValue::Uniform`]) or
    /// assign per entry ([`FieldValue::PerEntry`], length checked against the
    /// range). Exactly the entries in the resolved range are mutated; an
    /// empty or out-of-bounds range is an error and no update validation
    /// error mutates anything.
    pub fn set(&mut self, range: impl Into<IndexRange>, update: &ObjectiveUpdate) -> PogsResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let (start, end) = range.into().resolve(self.len())?;
        let range_len = end - start;

        // Validate everything before touching any entry.
        if let Some(kind) = &update.kind {
            kind.check_len("kind", range_len)?;
        }
        for (field, value) in [
            ("a", &update.a),
            ("b", &update.b),
            ("c", &update.c),
            ("d", &update.d),
            ("e", &update.e),
            ("s", &update.s),
        ] {
            if let Some(value) = value {
                value.check_len(field, range_len)?;
                for i in 0..range_len {
                    let v = value.at(i);
                    if !v.is_finite() {
                        return Err(PogsError::InvalidParameter {
                            name: field,
                            reason: format!("value {v} is not finite"),
                        });
                    }
                }
            }
        }

        if let Some(kind) = &update.kind {
            for i in 0..range_len {
                self.kind[start + i] = kind.at(i);
            }
        }
        for (target, value) in [
            (&mut self.a, &update.a),
            (&mut self.b, &update.b),
            (&mut self.c, &update.c),
            (&mut self.d, &update.d),
            (&mut self.e, &update.e),
            (&mut self.s, &update.s),
        ] {
            if let Some(value) = value {
                for i in 0..range_len {
                    target[start + i] = value.at(i);
                }
            }
        }
        Ok(())
    }

    /// Bounds-clamped bulk copy from another encoding.
    ///
    /// Both start offsets are clamped into `[0, len]`; the copied span is
    /// `min(target remainder, source remainder, count)`. All seven fields are
    /// copied. Never errors; returns the number of entries copied.
    pub fn copy_from(
        &mut self,
        source: &Objective,
        target_start: usize,
        source_start: usize,
        count: Option<usize>,
    ) -> usize {
        let ts = target_start.min(self.len());
        let ss = source_start.min(source.len());
        let mut span = (self.len() - ts).min(source.len() - ss);
        if let Some(count) = count {
            span = span.min(count);
        }

        self.kind[ts..ts + span].copy_from_slice(&source.kind[ss..ss + span]);
        self.a[ts..ts + span].copy_from_slice(&source.a[ss..ss + span]);
        self.b[ts..ts + span].copy_from_slice(&source.b[ss..ss + span]);
        self.c[ts..ts + span].copy_from_slice(&source.c[ss..ss + span]);
        self.d[ts..ts + span].copy_from_slice(&source.d[ss..ss + span]);
        self.e[ts..ts + span].copy_from_slice(&source.e[ss..ss + span]);
        self.s[ts..ts + span].copy_from_slice(&source.s[ss..ss + span]);
        span
    }

    /// Objective value at `x`, evaluated host-side.
    ///
    /// Returns `0` for a zero-size encoding; errors when `x` and the encoding
    /// differ in length.
    pub fn eval(&self, x: &[Float]) -> PogsResult<Float> {
        if self.is_empty() {
            return Ok(0.0);
        }
        if x.len() != self.len() {
            return Err(PogsError::SizeMismatch(format!(
                "eval argument has length {}, encoding has length {}",
                x.len(),
                self.len()
            )));
        }

        let mut total = 0.0;
        for i in 0..self.len() {
            let xi = x[i];
            let z = self.a[i] * xi - self.b[i];
            total += self.c[i] * self.kind[i].eval(z, self.s[i])
                + self.d[i] * xi
                + 0.5 * self.e[i] * xi * xi;
        }
        Ok(total)
    }
}
