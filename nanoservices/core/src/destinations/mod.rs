pub mod traits;

pub use traits::Destination;
