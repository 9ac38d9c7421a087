//! edgeview-core: descriptor parsing, SSH identity and configuration.
//! All other EdgeView launcher crates depend on this one.

pub mod config;
pub mod descriptor;
pub mod identity;

pub use descriptor::{ClaimProblem, ConnectionDescriptor, DescriptorError};
pub use identity::{IdentityError, IdentityProvider, KeyMaterial};
