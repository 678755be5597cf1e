//! WASM bindings for the phase portrait core.
//!
//! The JavaScript host plays the rendering and document roles: it receives
//! computed portraits and draws them.

mod observer;
mod runner;
mod system;

pub use runner::WasmSeparatrixRunner;
pub use system::WasmPlanarSystem;

use anyhow::Result;
use observer::JsObserver;
use portrait_core::config::PortraitConfig;
use portrait_core::error::PortraitError;
use portrait_core::point::Point;
use portrait_core::portrait::{render_all, DocumentAssembler, EntryFailure, PhasePortrait, Renderer};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Keeps computed portraits for the host; the artifact id is the index.
#[derive(Default)]
struct PortraitCollector {
    portraits: Vec<PhasePortrait>,
}

impl Renderer for PortraitCollector {
    fn render(&mut self, portrait: &PhasePortrait) -> Result<String> {
        self.portraits.push(portrait.clone());
        Ok((self.portraits.len() - 1).to_string())
    }
}

#[derive(Default)]
struct PageOrder {
    pages: Vec<String>,
}

impl DocumentAssembler for PageOrder {
    fn assemble(&mut self, artifacts: &[String]) -> Result<()> {
        self.pages = artifacts.to_vec();
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PortraitRun {
    portraits: Vec<PhasePortrait>,
    pages: Vec<String>,
    failures: Vec<EntryFailure>,
}

fn run_config(config: &PortraitConfig, callback: Option<js_sys::Function>) -> Result<PortraitRun> {
    config.validate()?;
    let functions = config.compile()?;
    let mut collector = PortraitCollector::default();
    let mut order = PageOrder::default();
    let mut observer = JsObserver::new(callback);
    let report = render_all(config, &functions, &mut collector, &mut order, &mut observer)?;
    Ok(PortraitRun {
        portraits: collector.portraits,
        pages: order.pages,
        failures: report.failures,
    })
}

/// Computes every portrait of `config` and returns
/// `{ portraits, pages, failures }`. `progress` receives milestone events.
#[wasm_bindgen]
pub fn compute_portraits(
    config: JsValue,
    progress: Option<js_sys::Function>,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let config: PortraitConfig = from_value(config)
        .map_err(|e| JsValue::from_str(&format!("Invalid portrait configuration: {}", e)))?;
    let run = run_config(&config, progress)
        .map_err(|e| JsValue::from_str(&format!("Portrait run failed: {:#}", e)))?;

    to_value(&run).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Parses `(x, y)`. Malformed text yields `undefined`; a non-string is an error.
#[wasm_bindgen]
pub fn parse_point(value: JsValue) -> Result<JsValue, JsValue> {
    let Some(text) = value.as_string() else {
        let err = PortraitError::TypeMismatch {
            expected: "string",
            found: format!("{:?}", value),
        };
        return Err(JsValue::from_str(&err.to_string()));
    };
    match Point::try_parse(&text) {
        Some(point) => {
            to_value(&point).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
        }
        None => Ok(JsValue::UNDEFINED),
    }
}

#[cfg(test)]
mod tests {
    use super::run_config;
    use portrait_core::config::PortraitConfig;

    const CONFIG: &str = r#"{
        "expressions": {
            "derivatives": ["-x", "-k * y"],
            "solving": ["x - 0.4321", "x"],
            "variables": ["x", "y"],
            "parameters": ["k"]
        },
        "amount_iterations": 100,
        "h_step": 0.01,
        "dataset": [
            {"name": "sink", "parameters": {"k": 2.0},
             "trajectories": [{"point": "(1, 1)", "color": "red", "tend_to_rest": true}]},
            {"name": "unbound",
             "trajectories": [{"point": "(1, 1)", "color": "red"}]}
        ]
    }"#;

    #[test]
    fn run_collects_portraits_and_isolates_failures() {
        let config = PortraitConfig::from_json(CONFIG).expect("config");
        let run = run_config(&config, None).expect("run");
        assert_eq!(run.portraits.len(), 1);
        assert_eq!(run.portraits[0].name, "sink");
        assert_eq!(run.portraits[0].equilibria.len(), 1);
        assert_eq!(run.pages, vec!["0".to_string()]);
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].name, "unbound");
        assert!(run.failures[0].message.contains("`k`"));
    }

    #[test]
    fn run_reports_compile_errors() {
        let config = PortraitConfig::from_json(&CONFIG.replace("-k * y", "-q * y")).expect("config");
        let err = run_config(&config, None).err().expect("unknown symbol");
        assert!(format!("{err:#}").contains("dy/dt"));
    }

    #[cfg(target_arch = "wasm32")]
    mod wasm {
        use crate::parse_point;
        use wasm_bindgen::JsValue;
        use wasm_bindgen_test::wasm_bindgen_test;

        #[wasm_bindgen_test]
        fn parse_point_distinguishes_mismatch_from_no_match() {
            let parsed = parse_point(JsValue::from_str("(1.5, 2)")).expect("point");
            let x = js_sys::Reflect::get(&parsed, &"x".into()).expect("x");
            assert_eq!(x.as_f64(), Some(1.5));

            let missing = parse_point(JsValue::from_str("(1, 2")).expect("no match");
            assert!(missing.is_undefined());

            let message = parse_point(JsValue::from_f64(3.0))
                .err()
                .and_then(|err| err.as_string())
                .unwrap_or_default();
            assert!(message.contains("expected string"));
        }
    }
}
