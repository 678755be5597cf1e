use crate::params::ParameterSet;

/// A scalar function of the two state variables and the parameters.
///
/// Both derivatives `dx/dt`, `dy/dt` and the solving equations are supplied
/// through this trait. Implementations must be pure; the core treats any
/// non-finite return value as a numeric failure.
pub trait ScalarField: Sync {
    fn eval(&self, x: f64, y: f64, params: &ParameterSet) -> f64;
}

impl<T: ScalarField + ?Sized> ScalarField for &T {
    fn eval(&self, x: f64, y: f64, params: &ParameterSet) -> f64 {
        (**self).eval(x, y, params)
    }
}

impl<T: ScalarField + ?Sized> ScalarField for Box<T> {
    fn eval(&self, x: f64, y: f64, params: &ParameterSet) -> f64 {
        (**self).eval(x, y, params)
    }
}

/// Adapts a closure to [`ScalarField`]; see [`field_fn`].
#[derive(Clone, Copy)]
pub struct FnField<F>(F);

impl<F> ScalarField for FnField<F>
where
    F: Fn(f64, f64, &ParameterSet) -> f64 + Sync,
{
    fn eval(&self, x: f64, y: f64, params: &ParameterSet) -> f64 {
        (self.0)(x, y, params)
    }
}

/// Wraps a closure `(x, y, params) -> value` as a [`ScalarField`].
pub fn field_fn<F>(f: F) -> FnField<F>
where
    F: Fn(f64, f64, &ParameterSet) -> f64 + Sync,
{
    FnField(f)
}

#[cfg(test)]
mod tests {
    use super::{field_fn, ScalarField};
    use crate::params::ParameterSet;

    #[test]
    fn closures_references_and_boxes_evaluate_alike() {
        let params = ParameterSet::new().with("k", 3.0);
        let field = field_fn(|x, y, p| p.get("k").unwrap_or(0.0) * x + y);
        let by_ref: &dyn ScalarField = &field;
        let boxed: Box<dyn ScalarField> = Box::new(field);
        assert_eq!(field.eval(1.0, 2.0, &params), 5.0);
        assert_eq!(by_ref.eval(1.0, 2.0, &params), 5.0);
        assert_eq!(boxed.eval(1.0, 2.0, &params), 5.0);
    }
}
