pub mod config;
pub mod error;
pub mod run;

pub use error::{Error, Result};
pub use run::{build_state, main_router};
