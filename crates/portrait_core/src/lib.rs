//! The `portrait_core` crate is the numeric engine behind the phase portrait builder.
//! It integrates planar systems with a fixed-step RK4, collects the rest points
//! trajectories settle on, traces the curve separating two basins of attraction
//! and marks the roots of a solving equation.
//!
//! Key components:
//! - **Traits**: `ScalarField` (a function of the state and the parameters).
//! - **Equation Engine**: A bytecode VM for evaluating configured expressions.
//! - **Solvers**: RK4 stepping, full trajectories and final-state integration.
//! - **Roots**: Sign-change scanning and bisection.
//! - **Basin**: Windowed, resumable basin boundary tracing.
//! - **Portrait**: Per-entry assembly, rendering and document hand-off.
pub mod basin;
pub mod config;
pub mod equation_engine;
pub mod equilibrium;
pub mod error;
pub mod observer;
pub mod params;
pub mod point;
pub mod portrait;
pub mod roots;
pub mod solvers;
pub mod traits;

pub use basin::{BasinSettings, BoundaryCurve, CancellationToken};
pub use config::PortraitConfig;
pub use error::PortraitError;
pub use observer::{PortraitObserver, TracingObserver};
pub use params::ParameterSet;
pub use point::Point;
pub use portrait::{compute_portrait, render_all, PhasePortrait, SystemFunctions};
pub use traits::ScalarField;
