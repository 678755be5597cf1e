//! Milestone notifications from the engine.
//!
//! The core never logs on its own. Callers pass a [`PortraitObserver`] and
//! decide what to do with each milestone: `()` ignores everything,
//! [`TracingObserver`] forwards to `tracing`.

use crate::point::Point;

pub trait PortraitObserver {
    fn portrait_started(&mut self, _name: &str) {}

    fn trajectory_computed(&mut self, _index: usize, _trajectory: &[Point]) {}

    fn equilibrium_found(&mut self, _point: Point) {}

    fn separatrix_started(&mut self, _equilibria: [Point; 2]) {}

    fn boundary_point_found(&mut self, _column: usize, _point: Point) {}

    fn separatrix_finished(&mut self, _points: usize) {}

    fn solutions_found(&mut self, _solutions: &[Point]) {}

    fn portrait_finished(&mut self, _name: &str) {}

    fn portrait_failed(&mut self, _name: &str, _error: &anyhow::Error) {}

    fn artifact_rendered(&mut self, _name: &str, _artifact: &str) {}

    fn document_assembled(&mut self, _artifacts: usize) {}

    fn warning(&mut self, _message: &str) {}
}

impl PortraitObserver for () {}

/// Reports milestones as `tracing` events under the `portrait` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PortraitObserver for TracingObserver {
    fn portrait_started(&mut self, name: &str) {
        tracing::info!(target: "portrait", name, "building phase portrait");
    }

    fn trajectory_computed(&mut self, index: usize, trajectory: &[Point]) {
        if let Some(last) = trajectory.last() {
            tracing::debug!(target: "portrait", index, points = trajectory.len(), end = %last, "trajectory computed");
        }
    }

    fn equilibrium_found(&mut self, point: Point) {
        tracing::info!(target: "portrait", %point, "equilibrium detected");
    }

    fn separatrix_started(&mut self, equilibria: [Point; 2]) {
        tracing::info!(target: "portrait", lower = %equilibria[0], upper = %equilibria[1], "tracing separating curve");
    }

    fn boundary_point_found(&mut self, column: usize, point: Point) {
        tracing::debug!(target: "portrait", column, %point, "boundary point");
    }

    fn separatrix_finished(&mut self, points: usize) {
        tracing::info!(target: "portrait", points, "separating curve traced");
    }

    fn solutions_found(&mut self, solutions: &[Point]) {
        tracing::info!(target: "portrait", count = solutions.len(), ?solutions, "solutions found");
    }

    fn portrait_finished(&mut self, name: &str) {
        tracing::info!(target: "portrait", name, "phase portrait built");
    }

    fn portrait_failed(&mut self, name: &str, error: &anyhow::Error) {
        tracing::error!(target: "portrait", name, error = %format!("{error:#}"), "phase portrait failed");
    }

    fn artifact_rendered(&mut self, name: &str, artifact: &str) {
        tracing::info!(target: "portrait", name, artifact, "portrait rendered");
    }

    fn document_assembled(&mut self, artifacts: usize) {
        tracing::info!(target: "portrait", artifacts, "document assembled");
    }

    fn warning(&mut self, message: &str) {
        tracing::warn!(target: "portrait", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::{PortraitObserver, TracingObserver};
    use crate::point::Point;

    #[derive(Default)]
    struct Counter {
        points: usize,
        warnings: Vec<String>,
    }

    impl PortraitObserver for Counter {
        fn boundary_point_found(&mut self, _column: usize, _point: Point) {
            self.points += 1;
        }

        fn warning(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }
    }

    fn drive(observer: &mut dyn PortraitObserver) {
        let origin = Point::new(0.0, 0.0);
        observer.portrait_started("demo");
        observer.trajectory_computed(0, &[origin, Point::new(1.0, 1.0)]);
        observer.trajectory_computed(1, &[]);
        observer.equilibrium_found(origin);
        observer.separatrix_started([origin, Point::new(0.0, 10.0)]);
        observer.boundary_point_found(0, Point::new(0.0, 5.0));
        observer.boundary_point_found(1, Point::new(0.1, 5.0));
        observer.separatrix_finished(2);
        observer.solutions_found(&[origin]);
        observer.portrait_finished("demo");
        observer.portrait_failed("other", &anyhow::anyhow!("boom"));
        observer.artifact_rendered("demo", "demo.png");
        observer.document_assembled(1);
        observer.warning("careful");
    }

    #[test]
    fn unhandled_milestones_are_ignored() {
        let mut counter = Counter::default();
        drive(&mut counter);
        assert_eq!(counter.points, 2);
        assert_eq!(counter.warnings, vec!["careful".to_string()]);
    }

    #[test]
    fn builtin_observers_accept_every_milestone() {
        drive(&mut ());
        drive(&mut TracingObserver);
    }
}
