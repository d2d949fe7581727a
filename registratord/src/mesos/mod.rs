pub mod client;
pub mod state;

pub use client::Mesos;
