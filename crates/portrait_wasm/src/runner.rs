//! Stepped separating-curve runner.

use crate::system::{build_fields, build_params};
use portrait_core::basin::{BasinBoundaryTracer, BasinSettings, BoundaryCurve};
use portrait_core::equation_engine::Expression;
use portrait_core::point::Point;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SeparatrixProgress {
    pub done: bool,
    pub columns_done: usize,
    pub columns_total: usize,
    pub points: usize,
}

type Tracer = BasinBoundaryTracer<Expression, Expression>;

pub(crate) fn build_tracer(
    equations: Vec<String>,
    params: Vec<f64>,
    param_names: Vec<String>,
    var_names: Vec<String>,
    equilibria: &[f64],
    settings: BasinSettings,
) -> Result<Tracer, String> {
    if equilibria.len() % 2 != 0 {
        return Err(format!(
            "Invalid equilibria.len(): expected pairs of coordinates, got {}",
            equilibria.len()
        ));
    }
    let (f_dx, f_dy) = build_fields(&equations, &param_names, &var_names)?;
    let params = build_params(&param_names, &params)?;
    let points: Vec<Point> = equilibria
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0], pair[1]))
        .collect();
    BasinBoundaryTracer::new(f_dx, f_dy, params, &points, settings).map_err(|e| e.to_string())
}

pub(crate) fn progress(tracer: &Tracer) -> SeparatrixProgress {
    SeparatrixProgress {
        done: tracer.is_done(),
        columns_done: tracer.columns_done(),
        columns_total: tracer.columns_total(),
        points: tracer.curve().len(),
    }
}

/// WASM-exported runner for the basin boundary trace.
/// Runs batches of grid columns so the host can report progress.
#[wasm_bindgen]
pub struct WasmSeparatrixRunner {
    tracer: Option<Tracer>,
}

#[wasm_bindgen]
impl WasmSeparatrixRunner {
    /// `equilibria` holds the two rest points as `[x0, y0, x1, y1]`.
    /// `settings_val` may be `undefined` to use the default region and grid.
    #[wasm_bindgen(constructor)]
    pub fn new(
        equations: Vec<String>,
        params: Vec<f64>,
        param_names: Vec<String>,
        var_names: Vec<String>,
        equilibria: Vec<f64>,
        settings_val: JsValue,
    ) -> Result<WasmSeparatrixRunner, JsValue> {
        console_error_panic_hook::set_once();

        let settings = if settings_val.is_undefined() || settings_val.is_null() {
            BasinSettings::default()
        } else {
            from_value(settings_val)
                .map_err(|e| JsValue::from_str(&format!("Invalid separatrix settings: {}", e)))?
        };

        let tracer = build_tracer(equations, params, param_names, var_names, &equilibria, settings)
            .map_err(|e| JsValue::from_str(&format!("Separatrix init failed: {}", e)))?;

        Ok(WasmSeparatrixRunner {
            tracer: Some(tracer),
        })
    }

    pub fn is_done(&self) -> bool {
        self.tracer.as_ref().map_or(true, |tracer| tracer.is_done())
    }

    /// Run a batch of grid columns and return progress.
    pub fn run_steps(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let tracer = self
            .tracer
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        tracer
            .run_columns(batch_size as usize, &mut ())
            .map_err(|e| JsValue::from_str(&format!("Separatrix step failed: {}", e)))?;

        to_value(&progress(tracer))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Get the traced curve. The runner is consumed.
    pub fn get_result(&mut self) -> Result<JsValue, JsValue> {
        let tracer = self
            .tracer
            .take()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        let curve: BoundaryCurve = tracer.into_curve();

        to_value(&curve).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::{build_tracer, progress};
    use portrait_core::basin::BasinSettings;
    use portrait_core::point::Point;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn settings() -> BasinSettings {
        BasinSettings {
            point_start: Point::new(-1.0, 0.0),
            point_end: Point::new(1.0, 10.0),
            len_x: 6,
            len_y: 100,
            ..BasinSettings::default()
        }
    }

    #[test]
    fn tracer_runs_in_batches() {
        let mut tracer = build_tracer(
            names(&["-x", "-y * (y - 5) * (y - 10)"]),
            vec![],
            vec![],
            names(&["x", "y"]),
            &[0.0, 10.0, 0.0, 0.0],
            settings(),
        )
        .expect("tracer");

        tracer.run_columns(4, &mut ()).expect("first batch");
        let report = progress(&tracer);
        assert!(!report.done);
        assert_eq!((report.columns_done, report.columns_total), (4, 6));

        tracer.run_columns(4, &mut ()).expect("second batch");
        let report = progress(&tracer);
        assert!(report.done);
        assert_eq!(report.points, 6);
        assert!(tracer.curve().iter().all(|p| (p.y - 5.0).abs() <= 0.1));
    }

    #[test]
    fn tracer_rejects_odd_coordinates_and_wrong_counts() {
        let build = |equilibria: &[f64]| {
            build_tracer(
                names(&["-x", "-y"]),
                vec![],
                vec![],
                names(&["x", "y"]),
                equilibria,
                settings(),
            )
        };
        let err = build(&[0.0, 1.0, 2.0]).err().expect("odd length");
        assert!(err.contains("Invalid equilibria.len()"), "unexpected error: {err}");
        let err = build(&[0.0, 1.0]).err().expect("single equilibrium");
        assert!(err.contains("exactly 2"), "unexpected error: {err}");
    }

    #[cfg(target_arch = "wasm32")]
    mod wasm {
        use super::names;
        use crate::runner::WasmSeparatrixRunner;
        use wasm_bindgen::JsValue;
        use wasm_bindgen_test::wasm_bindgen_test;

        #[wasm_bindgen_test]
        fn runner_errors_after_result_taken() {
            let mut runner = WasmSeparatrixRunner::new(
                names(&["-x", "-y * (y - 5) * (y - 10)"]),
                vec![],
                vec![],
                names(&["x", "y"]),
                vec![0.0, 0.0, 0.0, 10.0],
                JsValue::UNDEFINED,
            )
            .expect("runner");
            runner.get_result().expect("result");
            assert!(runner.is_done());

            let message = runner
                .run_steps(1)
                .err()
                .and_then(|err| err.as_string())
                .unwrap_or_default();
            assert!(message.contains("Runner not initialized"));
        }

        #[wasm_bindgen_test]
        fn runner_rejects_invalid_settings() {
            let message = WasmSeparatrixRunner::new(
                names(&["-x", "-y"]),
                vec![],
                vec![],
                names(&["x", "y"]),
                vec![0.0, 0.0, 0.0, 10.0],
                JsValue::from_str("nope"),
            )
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
            assert!(message.contains("Invalid separatrix settings"));
        }
    }
}
