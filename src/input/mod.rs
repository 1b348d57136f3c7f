pub mod calibration;
pub mod touch;

pub use calibration::Calibration;
pub use touch::{Intent, TouchHandler, TouchListener, TouchNavigator};
