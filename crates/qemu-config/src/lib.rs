//! Configuration side of pemu.
//!
//! Turns an INI file describing QEMU/KVM instances into a validated,
//! conflict-free set of [`InstanceSpec`]s:
//! - [`load`] / [`parse`] read the file into a [`RawConfig`]
//! - [`resolve`] layers built-in defaults, `[global]` and each instance
//!   section, assigns display ports and NIC addresses, and rejects configs
//!   whose instances would fight over a port or a disk image

mod defaults;
mod diagnostics;
mod error;
mod instance;
mod loader;
mod network;
mod ports;
mod resolve;
mod source;

pub use defaults::{
    DEFAULTS, DefaultValues, ENV_SECTION, GLOBAL_KEYS, GLOBAL_SECTION, INSTANCE_KEYS, OptionKey,
    VM_NB,
};
pub use diagnostics::Diagnostic;
pub use error::{ConfigError, Rejected, Result};
pub use instance::InstanceSpec;
pub use loader::{load, parse};
pub use network::{MAC_PREFIX, MacAddress, NetworkDevice, derive_mac};
pub use ports::PortAllocator;
pub use resolve::{Resolution, resolve, resolve_with};
pub use source::{ConfigSource, RawConfig, Section};
