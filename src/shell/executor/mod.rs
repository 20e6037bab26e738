#[allow(clippy::module_inception)]
mod executor;
mod reaper;

pub use executor::{ExecOutcome, Executor};
pub use reaper::{exit_code, BackgroundReaper};
