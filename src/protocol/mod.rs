mod packet;
mod command;
mod control;
mod data;
pub mod constants;

pub use packet::*;
pub use command::*;
pub use control::*;
pub use data::*;
pub use constants::*;
