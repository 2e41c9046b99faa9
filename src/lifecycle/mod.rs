pub mod classifier;
pub mod dates;

pub use classifier::classify;
pub use dates::{Clock, SystemClock};

#[cfg(test)]
pub use dates::FixedClock;
