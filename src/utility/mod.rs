pub mod timing;

pub use timing::{timed_async, Timer};
