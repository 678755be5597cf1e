use crate::{params::ParameterSet, point::Point, traits::ScalarField};
use nalgebra::{Complex, DMatrix};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default minimum separation between two distinct equilibria.
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Rest points collected from trajectory endpoints.
///
/// A candidate joins the set only if no member lies closer than the
/// threshold. Members are never removed and keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumSet {
    points: Vec<Point>,
    threshold: f64,
}

impl Default for EquilibriumSet {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl EquilibriumSet {
    pub fn new(threshold: f64) -> Self {
        Self {
            points: Vec::new(),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Adds `candidate` unless an existing member is within the threshold.
    /// Returns whether it was added.
    pub fn add_if_distinct(&mut self, candidate: Point) -> bool {
        let duplicate = self
            .points
            .iter()
            .any(|existing| candidate.distance(existing) < self.threshold);
        if !duplicate {
            self.points.push(candidate);
        }
        !duplicate
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Members ordered by ascending y; ties keep insertion order.
    pub fn sorted_by_y(&self) -> Vec<Point> {
        sort_by_y(&self.points)
    }
}

pub(crate) fn sort_by_y(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal));
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquilibriumKind {
    StableNode,
    UnstableNode,
    StableFocus,
    UnstableFocus,
    Saddle,
    Center,
    /// At least one eigenvalue has zero real part without being a center.
    Degenerate,
    /// The Jacobian could not be evaluated.
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex<f64>> for ComplexNumber {
    fn from(value: Complex<f64>) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEquilibrium {
    pub point: Point,
    pub kind: EquilibriumKind,
    /// Row-major 2x2 Jacobian; empty when indeterminate.
    pub jacobian: Vec<f64>,
    pub eigenvalues: Vec<ComplexNumber>,
}

const JACOBIAN_STEP: f64 = 1e-6;
const ZERO_EPS: f64 = 1e-9;

/// Central-difference Jacobian of the vector field at `point`, row-major.
pub fn compute_jacobian<F, G>(
    f_dx: &F,
    f_dy: &G,
    point: Point,
    params: &ParameterSet,
) -> Option<[f64; 4]>
where
    F: ScalarField + ?Sized,
    G: ScalarField + ?Sized,
{
    let h = JACOBIAN_STEP * (1.0 + point.x.abs().max(point.y.abs()));
    let Point { x, y } = point;
    let d = |f: &dyn Fn(f64, f64) -> f64, dx: f64, dy: f64| {
        (f(x + dx, y + dy) - f(x - dx, y - dy)) / (2.0 * h)
    };
    let fx = |a: f64, b: f64| f_dx.eval(a, b, params);
    let fy = |a: f64, b: f64| f_dy.eval(a, b, params);

    let jacobian = [d(&fx, h, 0.0), d(&fx, 0.0, h), d(&fy, h, 0.0), d(&fy, 0.0, h)];
    jacobian.iter().all(|v| v.is_finite()).then_some(jacobian)
}

/// Linear stability of the equilibrium at `point`.
///
/// The point itself is never refined; classification is descriptive only.
pub fn classify_equilibrium<F, G>(
    f_dx: &F,
    f_dy: &G,
    point: Point,
    params: &ParameterSet,
) -> ClassifiedEquilibrium
where
    F: ScalarField + ?Sized,
    G: ScalarField + ?Sized,
{
    let Some(jacobian) = compute_jacobian(f_dx, f_dy, point, params) else {
        return ClassifiedEquilibrium {
            point,
            kind: EquilibriumKind::Indeterminate,
            jacobian: Vec::new(),
            eigenvalues: Vec::new(),
        };
    };

    let matrix = DMatrix::from_row_slice(2, 2, &jacobian);
    let eigenvalues: Vec<Complex<f64>> = matrix.complex_eigenvalues().iter().copied().collect();
    let determinant = jacobian[0] * jacobian[3] - jacobian[1] * jacobian[2];

    ClassifiedEquilibrium {
        point,
        kind: kind_from_eigenvalues(&eigenvalues, determinant),
        jacobian: jacobian.to_vec(),
        eigenvalues: eigenvalues.into_iter().map(ComplexNumber::from).collect(),
    }
}

fn kind_from_eigenvalues(eigenvalues: &[Complex<f64>], determinant: f64) -> EquilibriumKind {
    if eigenvalues.len() != 2 || eigenvalues.iter().any(|l| !l.re.is_finite() || !l.im.is_finite())
    {
        return EquilibriumKind::Indeterminate;
    }
    if determinant < -ZERO_EPS {
        return EquilibriumKind::Saddle;
    }

    let scale = 1.0 + eigenvalues.iter().map(|l| l.norm()).fold(0.0, f64::max);
    let tol = ZERO_EPS * scale;
    let oscillating = eigenvalues.iter().any(|l| l.im.abs() > tol);
    let re = [eigenvalues[0].re, eigenvalues[1].re];

    if oscillating {
        let trace = re[0] + re[1];
        return if trace < -tol {
            EquilibriumKind::StableFocus
        } else if trace > tol {
            EquilibriumKind::UnstableFocus
        } else {
            EquilibriumKind::Center
        };
    }
    if re.iter().all(|&r| r < -tol) {
        EquilibriumKind::StableNode
    } else if re.iter().all(|&r| r > tol) {
        EquilibriumKind::UnstableNode
    } else {
        EquilibriumKind::Degenerate
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_equilibrium, EquilibriumKind, EquilibriumSet, DEFAULT_THRESHOLD};
    use crate::params::ParameterSet;
    use crate::point::Point;
    use crate::traits::field_fn;

    #[test]
    fn adding_the_same_point_twice_keeps_one() {
        let mut set = EquilibriumSet::default();
        assert!(set.add_if_distinct(Point::new(1.0, 1.0)));
        assert!(!set.add_if_distinct(Point::new(1.0, 1.0)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn threshold_separates_candidates() {
        let mut set = EquilibriumSet::new(DEFAULT_THRESHOLD);
        assert!(set.add_if_distinct(Point::new(0.0, 0.0)));
        assert!(!set.add_if_distinct(Point::new(0.05, 0.05)));
        assert!(set.add_if_distinct(Point::new(0.0, 0.2)));
        assert!(!set.add_if_distinct(Point::new(0.01, 0.19)));
        assert_eq!(set.points(), &[Point::new(0.0, 0.0), Point::new(0.0, 0.2)]);
    }

    #[test]
    fn sorted_by_y_orders_ascending() {
        let mut set = EquilibriumSet::default();
        set.add_if_distinct(Point::new(0.0, 5.0));
        set.add_if_distinct(Point::new(1.0, -1.0));
        set.add_if_distinct(Point::new(2.0, 2.0));
        let ys: Vec<f64> = set.sorted_by_y().iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![-1.0, 2.0, 5.0]);
        assert_eq!(set.points()[0], Point::new(0.0, 5.0));
    }

    fn classify_linear(a: f64, b: f64, c: f64, d: f64) -> EquilibriumKind {
        let params = ParameterSet::new();
        let f_dx = field_fn(move |x, y, _p| a * x + b * y);
        let f_dy = field_fn(move |x, y, _p| c * x + d * y);
        classify_equilibrium(&f_dx, &f_dy, Point::new(0.0, 0.0), &params).kind
    }

    #[test]
    fn linear_systems_are_classified() {
        assert_eq!(classify_linear(-1.0, 0.0, 0.0, -2.0), EquilibriumKind::StableNode);
        assert_eq!(classify_linear(1.0, 0.0, 0.0, 3.0), EquilibriumKind::UnstableNode);
        assert_eq!(classify_linear(1.0, 0.0, 0.0, -1.0), EquilibriumKind::Saddle);
        assert_eq!(classify_linear(-0.1, 1.0, -1.0, -0.1), EquilibriumKind::StableFocus);
        assert_eq!(classify_linear(0.1, 1.0, -1.0, 0.1), EquilibriumKind::UnstableFocus);
        assert_eq!(classify_linear(0.0, 1.0, -1.0, 0.0), EquilibriumKind::Center);
        assert_eq!(classify_linear(0.0, 0.0, 0.0, -1.0), EquilibriumKind::Degenerate);
    }

    #[test]
    fn classification_reports_jacobian_and_eigenvalues() {
        let params = ParameterSet::new();
        let f_dx = field_fn(|x, _y, _p| -2.0 * x);
        let f_dy = field_fn(|_x, y, _p| -3.0 * y);
        let result = classify_equilibrium(&f_dx, &f_dy, Point::new(0.0, 0.0), &params);
        assert_eq!(result.jacobian.len(), 4);
        assert!((result.jacobian[0] + 2.0).abs() < 1e-6);
        assert!((result.jacobian[3] + 3.0).abs() < 1e-6);
        let mut re: Vec<f64> = result.eigenvalues.iter().map(|l| l.re).collect();
        re.sort_by(|a, b| a.partial_cmp(b).expect("finite"));
        assert!((re[0] + 3.0).abs() < 1e-6 && (re[1] + 2.0).abs() < 1e-6, "eigenvalues {re:?}");
    }

    #[test]
    fn non_finite_field_is_indeterminate() {
        let params = ParameterSet::new();
        let f_dx = field_fn(|x, _y, _p| x.ln());
        let f_dy = field_fn(|_x, y, _p| y);
        let result = classify_equilibrium(&f_dx, &f_dy, Point::new(0.0, 0.0), &params);
        assert_eq!(result.kind, EquilibriumKind::Indeterminate);
        assert!(result.eigenvalues.is_empty());
    }
}
