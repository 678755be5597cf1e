use crate::error::PortraitError;
use crate::params::ParameterSet;
use crate::point::Point;
use crate::traits::ScalarField;

/// Ordered states of one integration; index 0 is the seed.
pub type Trajectory = Vec<Point>;

/// Classic Runge-Kutta 4th order stepper for the planar system
/// `dx/dt = f_dx(x, y)`, `dy/dt = f_dy(x, y)` with a fixed step.
///
/// Every stage evaluation is checked; a non-finite value aborts the step
/// with [`PortraitError::NumericOverflow`] instead of leaking NaN into the
/// trajectory.
pub struct Rk4<'a, F: ?Sized, G: ?Sized> {
    f_dx: &'a F,
    f_dy: &'a G,
    h: f64,
    params: &'a ParameterSet,
}

impl<'a, F, G> Rk4<'a, F, G>
where
    F: ScalarField + ?Sized,
    G: ScalarField + ?Sized,
{
    pub fn new(f_dx: &'a F, f_dy: &'a G, h: f64, params: &'a ParameterSet) -> Self {
        Self {
            f_dx,
            f_dy,
            h,
            params,
        }
    }

    pub fn step_size(&self) -> f64 {
        self.h
    }

    fn stage(&self, stage: [&'static str; 2], x: f64, y: f64) -> Result<(f64, f64), PortraitError> {
        let dx = self.f_dx.eval(x, y, self.params);
        if !dx.is_finite() {
            return Err(PortraitError::NumericOverflow {
                stage: stage[0],
                point: Point::new(x, y),
            });
        }
        let dy = self.f_dy.eval(x, y, self.params);
        if !dy.is_finite() {
            return Err(PortraitError::NumericOverflow {
                stage: stage[1],
                point: Point::new(x, y),
            });
        }
        Ok((self.h * dx, self.h * dy))
    }

    /// Advances `point` by one step of size `h`.
    pub fn step(&self, point: Point) -> Result<Point, PortraitError> {
        let Point { x, y } = point;

        let (k1, l1) = self.stage(["k1", "l1"], x, y)?;
        let (k2, l2) = self.stage(["k2", "l2"], x + k1 / 2.0, y + l1 / 2.0)?;
        let (k3, l3) = self.stage(["k3", "l3"], x + k2 / 2.0, y + l2 / 2.0)?;
        let (k4, l4) = self.stage(["k4", "l4"], x + k3, y + l3)?;

        let next = Point::new(
            x + (k1 + 2.0 * k2 + 2.0 * k3 + k4) / 6.0,
            y + (l1 + 2.0 * l2 + 2.0 * l3 + l4) / 6.0,
        );
        if !next.is_finite() {
            return Err(PortraitError::NumericOverflow {
                stage: "update",
                point,
            });
        }
        Ok(next)
    }

    /// Applies `steps` steps from `seed`, keeping every state.
    /// The result holds `steps + 1` points.
    pub fn integrate_path(&self, seed: Point, steps: usize) -> Result<Trajectory, PortraitError> {
        let len = steps.checked_add(1).ok_or_else(|| {
            PortraitError::InvalidSettings(format!("cannot keep {steps} steps plus the seed"))
        })?;
        let mut path = Vec::with_capacity(len);
        path.push(seed);
        let mut point = seed;
        for _ in 0..steps {
            point = self.step(point)?;
            path.push(point);
        }
        Ok(path)
    }

    /// Same stepping as [`Rk4::integrate_path`], keeping only the last state.
    pub fn integrate_final(&self, seed: Point, steps: usize) -> Result<Point, PortraitError> {
        let mut point = seed;
        for _ in 0..steps {
            point = self.step(point)?;
        }
        Ok(point)
    }
}

/// One RK4 step; see [`Rk4::step`].
pub fn rk4_step<F, G>(
    point: Point,
    f_dx: &F,
    f_dy: &G,
    h: f64,
    params: &ParameterSet,
) -> Result<Point, PortraitError>
where
    F: ScalarField + ?Sized,
    G: ScalarField + ?Sized,
{
    Rk4::new(f_dx, f_dy, h, params).step(point)
}

pub fn integrate_path<F, G>(
    seed: Point,
    f_dx: &F,
    f_dy: &G,
    steps: usize,
    h: f64,
    params: &ParameterSet,
) -> Result<Trajectory, PortraitError>
where
    F: ScalarField + ?Sized,
    G: ScalarField + ?Sized,
{
    Rk4::new(f_dx, f_dy, h, params).integrate_path(seed, steps)
}

pub fn integrate_final<F, G>(
    seed: Point,
    f_dx: &F,
    f_dy: &G,
    steps: usize,
    h: f64,
    params: &ParameterSet,
) -> Result<Point, PortraitError>
where
    F: ScalarField + ?Sized,
    G: ScalarField + ?Sized,
{
    Rk4::new(f_dx, f_dy, h, params).integrate_final(seed, steps)
}
