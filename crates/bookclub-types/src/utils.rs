pub mod naming;

pub use naming::slugify;
