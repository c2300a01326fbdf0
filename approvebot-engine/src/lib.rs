pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod interpreter;
pub mod memory;
pub mod trigger;

pub use client::{HostingClient, OwnershipResolver};
pub use config::{RepoConfig, TriggerConfig, CONFIG_ENV};
pub use error::{TriggerError, WriteErrors};
pub use event::{Event, EventKind};
pub use interpreter::execute_effects;
pub use memory::{HostSnapshot, InMemoryHost, StaticOwnership, Write};
pub use trigger::{Outcome, ReviewTrigger};
