pub mod commit;
pub mod proposal;

pub use commit::*;
pub use proposal::*;
