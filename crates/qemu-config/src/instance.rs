use serde::Serialize;

use crate::network::NetworkDevice;

/// Fully resolved launch settings for one VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceSpec {
    /// Section name.
    pub name: String,
    pub qemu: String,
    pub image: String,
    pub memory: String,
    pub cpu: String,
    pub smp: String,
    pub nic_nb: u32,
    pub vnc_port: String,
    /// `true` when the port came from `base_vnc_port`.
    pub vnc_port_auto: bool,
    /// Trailing arguments as written in the config.
    pub extra: String,
    /// `extra` split with shell quoting rules.
    pub extra_args: Vec<String>,
    pub nics: Vec<NetworkDevice>,
}
