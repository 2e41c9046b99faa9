pub mod apply;
pub mod cycle;

pub use apply::{apply_observation, select_pending};
pub use cycle::{run_cycle, CycleOptions};
