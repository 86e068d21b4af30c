mod config;
mod constants;
mod data;
mod error;
mod stage;
mod stats;
mod threshold;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use error::*;
pub use stage::*;
pub use stats::*;
pub use threshold::*;
