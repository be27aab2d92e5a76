//! Launch side of pemu: render resolved instances into QEMU argv and
//! either print or start them.

mod error;
mod launcher;
mod process;
mod render;

pub use error::{LaunchError, Result};
pub use launcher::{DryRunLauncher, Launched, Launcher, ProcessLauncher};
pub use render::{LaunchPlan, render};
