pub mod reading;
pub mod station;

pub use reading::*;
pub use station::*;
