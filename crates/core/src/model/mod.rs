pub mod junit;
pub mod span;
