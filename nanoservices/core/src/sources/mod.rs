pub mod traits;

pub use traits::Source;
