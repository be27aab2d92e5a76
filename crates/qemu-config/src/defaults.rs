/// Reserved section holding run-wide settings.
pub const ENV_SECTION: &str = "env";
/// Reserved section holding defaults shared by every instance.
pub const GLOBAL_SECTION: &str = "global";

/// Option name for the instance limit in `[env]`.
pub const VM_NB: &str = "vm_nb";

/// Option keys understood in `[global]` and instance sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    Qemu,
    Image,
    Memory,
    Cpu,
    Smp,
    NicNb,
    BaseVncPort,
    VncPort,
    Extra,
}

impl OptionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qemu => "qemu",
            Self::Image => "image",
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::Smp => "smp",
            Self::NicNb => "nic_nb",
            Self::BaseVncPort => "base_vnc_port",
            Self::VncPort => "vnc_port",
            Self::Extra => "extra",
        }
    }

    /// Look `name` up in an allow-list.
    pub fn lookup(name: &str, allowed: &[OptionKey]) -> Option<OptionKey> {
        allowed.iter().copied().find(|k| k.as_str() == name)
    }
}

/// Keys accepted in `[global]`.
pub const GLOBAL_KEYS: &[OptionKey] = &[
    OptionKey::Qemu,
    OptionKey::Image,
    OptionKey::Memory,
    OptionKey::Cpu,
    OptionKey::Smp,
    OptionKey::NicNb,
    OptionKey::BaseVncPort,
    OptionKey::Extra,
];

/// Keys accepted in an instance section.
pub const INSTANCE_KEYS: &[OptionKey] = &[
    OptionKey::Qemu,
    OptionKey::Image,
    OptionKey::Memory,
    OptionKey::Cpu,
    OptionKey::Smp,
    OptionKey::NicNb,
    OptionKey::VncPort,
    OptionKey::Extra,
];

/// Built-in values used when neither `[global]` nor the instance sets a key.
///
/// Bump `version` whenever a value changes: resolved plans are only
/// reproducible against the same table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultValues {
    pub version: u32,
    pub qemu: &'static str,
    pub image: &'static str,
    pub memory: &'static str,
    pub cpu: &'static str,
    pub smp: &'static str,
    pub nic_nb: u32,
    pub extra: &'static str,
}

pub const DEFAULTS: DefaultValues = DefaultValues {
    version: 1,
    qemu: "qemu-system-x86_64",
    image: "",
    memory: "2G",
    cpu: "host",
    smp: "cores=2,threads=1,sockets=1",
    nic_nb: 1,
    extra: "",
};
