pub mod access;
pub mod general;
pub mod utils;
