pub mod agent;
pub mod mutation;

pub use agent::*;
pub use mutation::*;
