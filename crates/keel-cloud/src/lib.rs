pub mod client;
pub mod command;
pub mod controller;
pub mod executor;

pub use client::{HostClient, HostError};
pub use command::CommandError;
pub use controller::{
    BuildHook, ConfigRequest, ControllerApi, ControllerError, HttpController, ReleaseRecord,
};
pub use executor::{CommandExecutor, RealExecutor};
