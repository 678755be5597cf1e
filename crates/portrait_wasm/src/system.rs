//! Compiled planar system exposed to JavaScript.

use portrait_core::equation_engine::Expression;
use portrait_core::params::ParameterSet;
use portrait_core::point::Point;
use portrait_core::roots::solve;
use portrait_core::solvers::Rk4;
use portrait_core::traits::ScalarField;
use wasm_bindgen::prelude::*;

/// Binds `params` to `param_names` by position.
pub(crate) fn build_params(param_names: &[String], params: &[f64]) -> Result<ParameterSet, String> {
    if param_names.len() != params.len() {
        return Err(format!(
            "Expected {} parameter values, got {}",
            param_names.len(),
            params.len()
        ));
    }
    Ok(param_names.iter().cloned().zip(params.iter().copied()).collect())
}

/// Compiles the two derivative expressions.
pub(crate) fn build_fields(
    equations: &[String],
    param_names: &[String],
    var_names: &[String],
) -> Result<(Expression, Expression), String> {
    let [dx, dy] = equations else {
        return Err(format!("Expected 2 equations, got {}", equations.len()));
    };
    Ok((
        Expression::compile(dx, var_names, param_names)?,
        Expression::compile(dy, var_names, param_names)?,
    ))
}

/// Flattens points into `[x0, y0, x1, y1, ...]`.
pub(crate) fn flatten(points: &[Point]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

#[wasm_bindgen]
pub struct WasmPlanarSystem {
    f_dx: Expression,
    f_dy: Expression,
    var_names: Vec<String>,
    param_names: Vec<String>,
    params: ParameterSet,
    state: Point,
}

impl WasmPlanarSystem {
    pub(crate) fn build(
        equations: Vec<String>,
        params: Vec<f64>,
        param_names: Vec<String>,
        var_names: Vec<String>,
    ) -> Result<Self, String> {
        let (f_dx, f_dy) = build_fields(&equations, &param_names, &var_names)?;
        let params = build_params(&param_names, &params)?;
        Ok(Self {
            f_dx,
            f_dy,
            var_names,
            param_names,
            params,
            state: Point::default(),
        })
    }

    fn stepper(&self, dt: f64) -> Rk4<'_, Expression, Expression> {
        Rk4::new(&self.f_dx, &self.f_dy, dt, &self.params)
    }
}

#[wasm_bindgen]
impl WasmPlanarSystem {
    #[wasm_bindgen(constructor)]
    pub fn new(
        equations: Vec<String>,
        params: Vec<f64>,
        param_names: Vec<String>,
        var_names: Vec<String>,
    ) -> Result<WasmPlanarSystem, JsValue> {
        console_error_panic_hook::set_once();
        Self::build(equations, params, param_names, var_names).map_err(|e| JsValue::from_str(&e))
    }

    pub fn set_state(&mut self, state: &[f64]) -> Result<(), JsValue> {
        let [x, y] = state else {
            return Err(JsValue::from_str(&format!(
                "Invalid state.len(): expected 2, got {}",
                state.len()
            )));
        };
        self.state = Point::new(*x, *y);
        Ok(())
    }

    pub fn get_state(&self) -> Vec<f64> {
        vec![self.state.x, self.state.y]
    }

    pub fn step(&mut self, dt: f64) -> Result<(), JsValue> {
        self.state = self
            .stepper(dt)
            .step(self.state)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(())
    }

    /// Integrates `steps` steps from the current state and returns the
    /// flattened path, seed included. The state moves to the last point.
    pub fn integrate(&mut self, steps: u32, dt: f64) -> Result<Vec<f64>, JsValue> {
        let path = self
            .stepper(dt)
            .integrate_path(self.state, steps as usize)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        if let Some(&last) = path.last() {
            self.state = last;
        }
        Ok(flatten(&path))
    }

    /// Roots of `expression(x, 0)` on `[lo, hi]`.
    pub fn solve_roots(
        &self,
        expression: &str,
        lo: f64,
        hi: f64,
        samples: u32,
    ) -> Result<Vec<f64>, JsValue> {
        let field = Expression::compile(expression, &self.var_names, &self.param_names)
            .map_err(|e| JsValue::from_str(&e))?;
        solve(
            &|x: f64| field.eval(x, 0.0, &self.params),
            (lo, hi),
            samples as usize,
        )
        .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
