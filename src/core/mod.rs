pub mod flatten;
pub mod value;
