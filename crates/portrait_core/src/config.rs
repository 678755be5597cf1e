use crate::{
    basin::BasinSettings, equation_engine::Expression, equilibrium::DEFAULT_THRESHOLD,
    params::ParameterSet, portrait::SystemFunctions, roots::DEFAULT_SAMPLES,
};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionsConfig {
    /// `dx/dt` and `dy/dt`.
    pub derivatives: [String; 2],
    /// The equation whose roots along `y = 0` are marked, and the function
    /// mapping each root to its ordinate.
    pub solving: [String; 2],
    /// Names of the two state variables.
    pub variables: [String; 2],
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySpec {
    /// Start point in the textual form `(x, y)`.
    pub point: String,
    pub color: String,
    #[serde(default)]
    pub tend_to_rest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default)]
    pub trajectories: Vec<TrajectorySpec>,
    #[serde(default)]
    pub plot_separate_line: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlottingConfig {
    pub show_legend: bool,
    pub show_grid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortraitConfig {
    pub expressions: ExpressionsConfig,
    pub amount_iterations: usize,
    pub h_step: f64,
    pub dataset: Vec<DatasetEntry>,
    #[serde(default)]
    pub plotting: PlottingConfig,
    #[serde(default)]
    pub separatrix: BasinSettings,
    #[serde(default = "default_solve_range")]
    pub solve_range: [f64; 2],
    #[serde(default = "default_solve_samples")]
    pub solve_samples: usize,
    #[serde(default = "default_equilibrium_threshold")]
    pub equilibrium_threshold: f64,
    /// Abort the whole run on the first failing entry.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_solve_range() -> [f64; 2] {
    [0.0, 1.0]
}

fn default_solve_samples() -> usize {
    DEFAULT_SAMPLES
}

fn default_equilibrium_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl PortraitConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).context("Failed to parse portrait configuration.")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.h_step.is_finite() || self.h_step == 0.0 {
            bail!("h_step must be finite and non-zero, got {}.", self.h_step);
        }
        if self.amount_iterations == usize::MAX {
            bail!("amount_iterations is too large to keep every state.");
        }
        if self.solve_samples == 0 {
            bail!("solve_samples must be greater than zero.");
        }
        if !self.solve_range.iter().all(|v| v.is_finite()) {
            bail!("solve_range must be finite.");
        }
        if !(self.equilibrium_threshold > 0.0) {
            bail!("equilibrium_threshold must be positive.");
        }

        let vars = &self.expressions.variables;
        if vars[0] == vars[1] {
            bail!("State variables must have distinct names, got `{}` twice.", vars[0]);
        }
        let mut seen = HashSet::new();
        for name in &self.expressions.parameters {
            if vars.contains(name) {
                bail!("Parameter `{name}` shadows a state variable.");
            }
            if !seen.insert(name.as_str()) {
                bail!("Parameter `{name}` is declared twice.");
            }
        }

        let mut names = HashSet::new();
        for entry in &self.dataset {
            if !names.insert(entry.name.as_str()) {
                bail!("Dataset entry name `{}` is not unique.", entry.name);
            }
        }

        self.separatrix.validate()?;
        Ok(())
    }

    /// Compiles the four configured expressions.
    pub fn compile(&self) -> Result<SystemFunctions> {
        let exprs = &self.expressions;
        let compile = |role: &str, source: &str| -> Result<Box<Expression>> {
            Expression::compile(source, &exprs.variables, &exprs.parameters)
                .map(Box::new)
                .map_err(|err| anyhow!("Failed to compile {role} expression `{source}`: {err}"))
        };

        Ok(SystemFunctions {
            f_dx: compile("dx/dt", &exprs.derivatives[0])?,
            f_dy: compile("dy/dt", &exprs.derivatives[1])?,
            solve_x: compile("solving", &exprs.solving[0])?,
            solve_y: compile("solution ordinate", &exprs.solving[1])?,
        })
    }
}
