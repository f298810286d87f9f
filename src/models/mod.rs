pub mod gallery;
pub mod generation;
pub mod health;

pub use gallery::*;
pub use generation::*;
pub use health::*;
