//! Session handles over a running driver

pub mod replay;


pub use replay::ReplaySession;
