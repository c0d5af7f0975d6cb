pub mod bounds;
pub mod dataset;
pub mod error;
pub mod features;
pub mod index;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod segment;
pub mod signal;
pub mod subjects;

pub use bounds::*;
pub use error::*;
pub use segment::*;
pub use signal::*;
