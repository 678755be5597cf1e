//! Phase portrait assembly for the configured dataset.
//!
//! [`compute_portrait`] turns one dataset entry into a [`PhasePortrait`]:
//! trajectories, the rest points they settle on, an optional separating
//! curve and the marked solutions. [`render_all`] drives every entry
//! through a [`Renderer`] and hands the artifact ids to a
//! [`DocumentAssembler`].

use crate::{
    basin::{trace_basin_boundary, BoundaryCurve},
    config::{DatasetEntry, PortraitConfig},
    equilibrium::{classify_equilibrium, ClassifiedEquilibrium, EquilibriumSet},
    error::PortraitError,
    observer::PortraitObserver,
    point::Point,
    roots::solve,
    solvers::{integrate_path, Trajectory},
    traits::ScalarField,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The four functions of a configured system.
pub struct SystemFunctions {
    pub f_dx: Box<dyn ScalarField>,
    pub f_dy: Box<dyn ScalarField>,
    /// Marked solutions are the roots of `solve_x(x, 0)`.
    pub solve_x: Box<dyn ScalarField>,
    /// Ordinate of the marked solution at root `x`, evaluated at `(x, 0)`.
    pub solve_y: Box<dyn ScalarField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPlot {
    pub points: Trajectory,
    pub color: String,
    pub tend_to_rest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePortrait {
    pub name: String,
    pub trajectories: Vec<TrajectoryPlot>,
    pub equilibria: Vec<ClassifiedEquilibrium>,
    pub boundary: Option<BoundaryCurve>,
    pub solutions: Vec<Point>,
    pub show_grid: bool,
    pub show_legend: bool,
}

/// Builds the portrait of one dataset entry.
pub fn compute_portrait(
    entry: &DatasetEntry,
    functions: &SystemFunctions,
    config: &PortraitConfig,
    observer: &mut dyn PortraitObserver,
) -> Result<PhasePortrait> {
    observer.portrait_started(&entry.name);

    let params = &entry.parameters;
    if let Some(name) = params.missing(&config.expressions.parameters).first() {
        return Err(PortraitError::MissingParameter(name.to_string()).into());
    }

    let f_dx = &*functions.f_dx;
    let f_dy = &*functions.f_dy;
    let mut rest_points = EquilibriumSet::new(config.equilibrium_threshold);
    let mut trajectories = Vec::with_capacity(entry.trajectories.len());

    for (index, spec) in entry.trajectories.iter().enumerate() {
        let seed = Point::try_parse(&spec.point).ok_or_else(|| PortraitError::TypeMismatch {
            expected: "point of the form (x, y)",
            found: spec.point.clone(),
        })?;
        let points = integrate_path(seed, f_dx, f_dy, config.amount_iterations, config.h_step, params)
            .with_context(|| format!("Trajectory {index} from {seed} diverged."))?;
        observer.trajectory_computed(index, &points);

        if spec.tend_to_rest {
            if let Some(&last) = points.last() {
                if rest_points.add_if_distinct(last) {
                    observer.equilibrium_found(last);
                }
            }
        }
        trajectories.push(TrajectoryPlot {
            points,
            color: spec.color.clone(),
            tend_to_rest: spec.tend_to_rest,
        });
    }

    let boundary = if entry.plot_separate_line {
        let sorted = rest_points.sorted_by_y();
        let [lower, upper] = sorted.as_slice() else {
            return Err(PortraitError::UnsupportedBasinCount(sorted.len()).into());
        };
        observer.separatrix_started([*lower, *upper]);
        let curve = trace_basin_boundary(
            f_dx,
            f_dy,
            params.clone(),
            rest_points.points(),
            config.separatrix,
            observer,
        )
        .context("Failed to trace the separating curve.")?;
        observer.separatrix_finished(curve.len());
        Some(curve)
    } else {
        None
    };

    let solve_x = &*functions.solve_x;
    let solve_y = &*functions.solve_y;
    let range = (config.solve_range[0], config.solve_range[1]);
    let roots = solve(&|x: f64| solve_x.eval(x, 0.0, params), range, config.solve_samples)
        .context("Failed to solve the solving equation.")?;
    let mut solutions = Vec::with_capacity(roots.len());
    for x in roots {
        let y = solve_y.eval(x, 0.0, params);
        if !y.is_finite() {
            return Err(PortraitError::DomainError { x }.into());
        }
        solutions.push(Point::new(x, y));
    }
    observer.solutions_found(&solutions);

    let equilibria = rest_points
        .points()
        .iter()
        .map(|&point| classify_equilibrium(f_dx, f_dy, point, params))
        .collect();

    observer.portrait_finished(&entry.name);
    Ok(PhasePortrait {
        name: entry.name.clone(),
        trajectories,
        equilibria,
        boundary,
        solutions,
        show_grid: config.plotting.show_grid,
        show_legend: config.plotting.show_legend,
    })
}

/// Produces a visual artifact for one portrait and returns its id.
pub trait Renderer {
    fn render(&mut self, portrait: &PhasePortrait) -> Result<String>;
}

/// Combines rendered artifacts, in order, into one document.
pub trait DocumentAssembler {
    fn assemble(&mut self, artifacts: &[String]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Artifact ids in dataset order.
    pub artifacts: Vec<String>,
    pub failures: Vec<EntryFailure>,
}

/// Computes and renders every dataset entry, then assembles the document.
///
/// A failing entry is reported and skipped unless `config.fail_fast` is set,
/// in which case the first failure aborts the run before assembly.
pub fn render_all(
    config: &PortraitConfig,
    functions: &SystemFunctions,
    renderer: &mut dyn Renderer,
    assembler: &mut dyn DocumentAssembler,
    observer: &mut dyn PortraitObserver,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    for entry in &config.dataset {
        let rendered = compute_portrait(entry, functions, config, observer)
            .and_then(|portrait| renderer.render(&portrait));
        match rendered {
            Ok(artifact) => {
                observer.artifact_rendered(&entry.name, &artifact);
                report.artifacts.push(artifact);
            }
            Err(err) => {
                observer.portrait_failed(&entry.name, &err);
                if config.fail_fast {
                    return Err(err.context(format!("Portrait `{}` failed.", entry.name)));
                }
                report.failures.push(EntryFailure {
                    name: entry.name.clone(),
                    message: format!("{err:#}"),
                });
            }
        }
    }

    if report.artifacts.is_empty() {
        observer.warning("no portraits were rendered; skipping document assembly");
        return Ok(report);
    }

    assembler
        .assemble(&report.artifacts)
        .context("Failed to assemble the document.")?;
    observer.document_assembled(report.artifacts.len());
    Ok(report)
}
