pub mod traits;

pub use traits::Transform;
