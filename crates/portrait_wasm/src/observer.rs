//! Progress events forwarded to a JavaScript callback.

use portrait_core::observer::PortraitObserver;
use portrait_core::point::Point;
use serde::Serialize;
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ProgressEvent<'a> {
    PortraitStarted { name: &'a str },
    TrajectoryComputed { index: usize, points: usize },
    EquilibriumFound { point: Point },
    SeparatrixStarted { lower: Point, upper: Point },
    SeparatrixFinished { points: usize },
    SolutionsFound { solutions: &'a [Point] },
    PortraitFinished { name: &'a str },
    PortraitFailed { name: &'a str, message: String },
    Warning { message: &'a str },
}

/// Sends every milestone to `callback`, if one was given.
///
/// Per-column boundary points are not forwarded; the separatrix runner
/// reports them in its batch results instead.
pub(crate) struct JsObserver {
    callback: Option<js_sys::Function>,
}

impl JsObserver {
    pub(crate) fn new(callback: Option<js_sys::Function>) -> Self {
        Self { callback }
    }

    fn emit(&self, event: ProgressEvent<'_>) {
        let Some(callback) = &self.callback else {
            return;
        };
        // Progress is best effort; a throwing callback must not abort the run.
        if let Ok(value) = serde_wasm_bindgen::to_value(&event) {
            let _ = callback.call1(&JsValue::NULL, &value);
        }
    }
}

impl PortraitObserver for JsObserver {
    fn portrait_started(&mut self, name: &str) {
        self.emit(ProgressEvent::PortraitStarted { name });
    }

    fn trajectory_computed(&mut self, index: usize, trajectory: &[Point]) {
        self.emit(ProgressEvent::TrajectoryComputed {
            index,
            points: trajectory.len(),
        });
    }

    fn equilibrium_found(&mut self, point: Point) {
        self.emit(ProgressEvent::EquilibriumFound { point });
    }

    fn separatrix_started(&mut self, equilibria: [Point; 2]) {
        self.emit(ProgressEvent::SeparatrixStarted {
            lower: equilibria[0],
            upper: equilibria[1],
        });
    }

    fn separatrix_finished(&mut self, points: usize) {
        self.emit(ProgressEvent::SeparatrixFinished { points });
    }

    fn solutions_found(&mut self, solutions: &[Point]) {
        self.emit(ProgressEvent::SolutionsFound { solutions });
    }

    fn portrait_finished(&mut self, name: &str) {
        self.emit(ProgressEvent::PortraitFinished { name });
    }

    fn portrait_failed(&mut self, name: &str, error: &anyhow::Error) {
        self.emit(ProgressEvent::PortraitFailed {
            name,
            message: format!("{error:#}"),
        });
    }

    fn warning(&mut self, message: &str) {
        self.emit(ProgressEvent::Warning { message });
    }
}

#[cfg(test)]
mod tests {
    use super::JsObserver;
    use portrait_core::observer::PortraitObserver;
    use portrait_core::point::Point;

    #[test]
    fn observer_without_callback_ignores_events() {
        let mut observer = JsObserver::new(None);
        observer.portrait_started("quiet");
        observer.equilibrium_found(Point::new(1.0, 2.0));
        observer.warning("nothing listens");
    }

    #[cfg(target_arch = "wasm32")]
    mod wasm {
        use super::super::ProgressEvent;
        use portrait_core::point::Point;
        use wasm_bindgen_test::wasm_bindgen_test;

        #[wasm_bindgen_test]
        fn events_serialize_with_a_kind_tag() {
            let value = serde_wasm_bindgen::to_value(&ProgressEvent::EquilibriumFound {
                point: Point::new(1.0, 2.0),
            })
            .expect("event");
            let kind = js_sys::Reflect::get(&value, &"kind".into()).expect("kind");
            assert_eq!(kind.as_string().as_deref(), Some("equilibrium_found"));
        }
    }
}
