//! Application state: markers, diagnoses, settings and the repair session.

mod analysis;
mod marker;
mod session;
mod settings;

pub use analysis::*;
pub use marker::*;
pub use session::*;
pub use settings::*;
