pub mod analyze;
pub mod config;
pub mod inspect;
pub mod util;

pub use analyze::*;
pub use config::*;
pub use inspect::*;
pub use util::*;
