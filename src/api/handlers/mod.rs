pub mod predict;
pub mod records;
pub mod system;

pub use predict::*;
pub use records::*;
pub use system::*;
