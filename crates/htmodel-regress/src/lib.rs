//! No-intercept ordinary least squares for one or two predictors.
//!
//! Fits `y = a * x` or `y = a * x1 + b * x2` by solving the normal
//! equations in closed form. The intercept is fixed at zero: a model of
//! retired instructions against unhalted cycles must predict nothing when
//! no cycles elapse.
//!
//! Rank-deficient inputs (an all-zero predictor, collinear predictors, or
//! fewer rows than predictors) are not rejected. They resolve to the
//! minimum-norm least-squares solution, the same answer an SVD-based
//! `lstsq` gives, and the fit is flagged as `rank_deficient`.

/// Relative tolerance on `det(XᵀX) / (s11 * s22)` below which the 2×2
/// normal matrix is treated as singular.
const RANK_TOLERANCE: f64 = 1e-12;

/// Single-predictor no-intercept model: `y = a * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneVarModel {
    /// Slope.
    pub a: f64,
}

impl OneVarModel {
    #[inline]
    pub fn predict(&self, x: f64) -> f64 {
        self.a * x
    }
}

/// Two-variable no-intercept linear model: `y = a * x1 + b * x2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoVarModel {
    /// Coefficient for the first predictor.
    pub a: f64,
    /// Coefficient for the second predictor.
    pub b: f64,
}

impl TwoVarModel {
    #[inline]
    pub fn predict(&self, x1: f64, x2: f64) -> f64 {
        self.a * x1 + self.b * x2
    }
}

/// Result of a least-squares fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit<M> {
    pub model: M,
    /// No-intercept R² over the fitted rows.
    pub r_squared: f64,
    /// True when the normal matrix was singular and the minimum-norm
    /// solution was returned.
    pub rank_deficient: bool,
}

/// Fits `y = a * x` over `(x, y)` rows.
#[must_use]
pub fn fit_one_var(data: &[(f64, f64)]) -> Fit<OneVarModel> {
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &(x, y) in data {
        sxx += x * x;
        sxy += x * y;
    }

    // A zero predictor carries no information; the minimum-norm slope is 0.
    let rank_deficient = sxx == 0.0;
    let a = if rank_deficient { 0.0 } else { sxy / sxx };
    let model = OneVarModel { a };

    let r_squared = r_squared_no_intercept_with(
        data.iter().map(|&(x, y)| (model.predict(x), y)),
    );
    Fit {
        model,
        r_squared,
        rank_deficient,
    }
}

/// Fits `y = a * x1 + b * x2` over `(x1, x2, y)` rows.
#[must_use]
pub fn fit_two_var(data: &[(f64, f64, f64)]) -> Fit<TwoVarModel> {
    let mut s11 = 0.0;
    let mut s12 = 0.0;
    let mut s22 = 0.0;
    let mut sy1 = 0.0;
    let mut sy2 = 0.0;

    for &(x1, x2, y) in data {
        s11 += x1 * x1;
        s12 += x1 * x2;
        s22 += x2 * x2;
        sy1 += x1 * y;
        sy2 += x2 * y;
    }

    let (model, rank_deficient) = solve_normal_equations(s11, s12, s22, sy1, sy2);
    let r_squared = r_squared_no_intercept(data, model);
    Fit {
        model,
        r_squared,
        rank_deficient,
    }
}

/// Computes R² for a no-intercept two-variable model.
///
/// Without an intercept the total sum of squares is taken about zero
/// (`Σy²`), not about the mean. An all-zero response is fitted perfectly by
/// any model through the origin and scores 1.
#[must_use]
pub fn r_squared_no_intercept(
    data: &[(f64, f64, f64)],
    model: TwoVarModel,
) -> f64 {
    r_squared_no_intercept_with(
        data.iter().map(|&(x1, x2, y)| (model.predict(x1, x2), y)),
    )
}

fn r_squared_no_intercept_with(
    pairs: impl Iterator<Item = (f64, f64)>,
) -> f64 {
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (predicted, y) in pairs {
        ss_res += (y - predicted).powi(2);
        ss_tot += y * y;
    }
    if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Solves the 2×2 normal equations `S·β = b`.
///
/// For a singular `S` (rank ≤ 1) the pseudo-inverse is `S / trace(S)²`,
/// which gives the minimum-norm solution. With one predictor identically
/// zero this reduces to the single-predictor slope for the other.
fn solve_normal_equations(
    s11: f64,
    s12: f64,
    s22: f64,
    sy1: f64,
    sy2: f64,
) -> (TwoVarModel, bool) {
    let det = s11 * s22 - s12 * s12;
    if det.abs() > RANK_TOLERANCE * s11 * s22 {
        let a = (s22 * sy1 - s12 * sy2) / det;
        let b = (s11 * sy2 - s12 * sy1) / det;
        return (TwoVarModel { a, b }, false);
    }

    let trace = s11 + s22;
    if trace == 0.0 {
        return (TwoVarModel { a: 0.0, b: 0.0 }, true);
    }
    let scale = trace * trace;
    let a = (s11 * sy1 + s12 * sy2) / scale;
    let b = (s12 * sy1 + s22 * sy2) / scale;
    (TwoVarModel { a, b }, true)
}
