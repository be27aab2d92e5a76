use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::defaults::{
    DEFAULTS, DefaultValues, ENV_SECTION, GLOBAL_KEYS, GLOBAL_SECTION, INSTANCE_KEYS, OptionKey,
    VM_NB,
};
use crate::diagnostics::Diagnostic;
use crate::error::{ConfigError, Rejected, Result};
use crate::instance::InstanceSpec;
use crate::network::NetworkDevice;
use crate::ports::PortAllocator;
use crate::source::ConfigSource;

/// Outcome of a successful resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Accepted instances in file order.
    pub instances: Vec<InstanceSpec>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn get(&self, name: &str) -> Option<&InstanceSpec> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.iter().map(|i| i.name.as_str())
    }
}

/// Settings contributed by one scope. `None` means the scope is silent on
/// that key and a lower layer shows through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Layer {
    qemu: Option<String>,
    image: Option<String>,
    memory: Option<String>,
    cpu: Option<String>,
    smp: Option<String>,
    nic_nb: Option<u32>,
    base_vnc_port: Option<u16>,
    vnc_port: Option<ExplicitPort>,
    extra: Option<String>,
}

/// A `vnc_port` set in the config: the display number it names plus the
/// text it was written as.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExplicitPort {
    number: u16,
    text: String,
}

impl Layer {
    fn from_defaults(defaults: &DefaultValues) -> Self {
        Self {
            qemu: Some(defaults.qemu.to_string()),
            image: Some(defaults.image.to_string()),
            memory: Some(defaults.memory.to_string()),
            cpu: Some(defaults.cpu.to_string()),
            smp: Some(defaults.smp.to_string()),
            nic_nb: Some(defaults.nic_nb),
            base_vnc_port: None,
            vnc_port: None,
            extra: Some(defaults.extra.to_string()),
        }
    }

    /// Read the allow-listed keys of `section`, reporting the rest.
    fn read<S: ConfigSource + ?Sized>(
        source: &S,
        section: &str,
        allowed: &[OptionKey],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Self> {
        let mut layer = Self::default();
        for (key, value) in source.items(section) {
            match OptionKey::lookup(key, allowed) {
                Some(option) => layer.set(section, option, value)?,
                None => diagnostics.push(Diagnostic::UnknownOption {
                    section: section.to_string(),
                    key: key.to_string(),
                }),
            }
        }
        Ok(layer)
    }

    fn set(&mut self, section: &str, key: OptionKey, value: &str) -> Result<()> {
        let text = Some(value.to_string());
        match key {
            OptionKey::Qemu => self.qemu = text,
            OptionKey::Image => self.image = text,
            OptionKey::Memory => self.memory = text,
            OptionKey::Cpu => self.cpu = text,
            OptionKey::Smp => self.smp = text,
            OptionKey::Extra => self.extra = text,
            OptionKey::NicNb => {
                self.nic_nb = Some(parse_number(section, key.as_str(), value, "an integer >= 0")?);
            }
            OptionKey::BaseVncPort => {
                self.base_vnc_port =
                    Some(parse_number(section, key.as_str(), value, "a port number")?);
            }
            // An explicitly empty port means "pick one for me".
            OptionKey::VncPort if value.is_empty() => self.vnc_port = None,
            OptionKey::VncPort => {
                self.vnc_port = Some(ExplicitPort {
                    number: parse_number(section, key.as_str(), value, "a port number")?,
                    text: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Overwrite key by key with whatever `upper` sets.
    fn overlay(self, upper: &Layer) -> Self {
        Self {
            qemu: upper.qemu.clone().or(self.qemu),
            image: upper.image.clone().or(self.image),
            memory: upper.memory.clone().or(self.memory),
            cpu: upper.cpu.clone().or(self.cpu),
            smp: upper.smp.clone().or(self.smp),
            nic_nb: upper.nic_nb.or(self.nic_nb),
            base_vnc_port: upper.base_vnc_port.or(self.base_vnc_port),
            vnc_port: upper.vnc_port.clone().or(self.vnc_port),
            extra: upper.extra.clone().or(self.extra),
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    section: &str,
    key: &str,
    value: &str,
    expected: &'static str,
) -> Result<T> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

/// Run-wide settings from `[env]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EnvironmentSettings {
    instance_limit: Option<u32>,
}

impl EnvironmentSettings {
    fn read<S: ConfigSource + ?Sized>(
        source: &S,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Self> {
        let mut env = Self::default();
        for (key, value) in source.items(ENV_SECTION) {
            if key != VM_NB {
                diagnostics.push(Diagnostic::UnknownOption {
                    section: ENV_SECTION.to_string(),
                    key: key.to_string(),
                });
                continue;
            }
            let limit: u32 = parse_number(ENV_SECTION, VM_NB, value, "a positive integer")?;
            if limit == 0 {
                return Err(ConfigError::InvalidNumber {
                    section: ENV_SECTION.to_string(),
                    key: VM_NB.to_string(),
                    value: value.to_string(),
                    expected: "a positive integer",
                });
            }
            env.instance_limit = Some(limit);
        }
        Ok(env)
    }
}

/// Resources already claimed in this pass, naming the owner.
///
/// Ports are keyed by display number, so `040` and `40` collide.
#[derive(Debug, Default)]
struct Claims {
    ports: HashMap<u16, String>,
    images: HashMap<String, String>,
}

impl Claims {
    fn claim(&mut self, instance: &str, port: u16, image: &str) -> Result<()> {
        if let Some(first) = self.ports.get(&port) {
            return Err(ConfigError::PortConflict {
                port,
                first: first.clone(),
                second: instance.to_string(),
            });
        }
        if let Some(first) = self.images.get(image) {
            return Err(ConfigError::ImageConflict {
                image: image.to_string(),
                first: first.clone(),
                second: instance.to_string(),
            });
        }
        self.ports.insert(port, instance.to_string());
        self.images.insert(image.to_string(), instance.to_string());
        Ok(())
    }
}

/// Resolve every instance section of `source` against the built-in [`DEFAULTS`].
pub fn resolve<S: ConfigSource + ?Sized>(source: &S) -> std::result::Result<Resolution, Rejected> {
    resolve_with(source, &DEFAULTS)
}

/// Resolve every instance section of `source`.
///
/// Sections are processed strictly in file order: port numbering and the
/// conflict checks depend on what earlier sections claimed. Any fatal error
/// discards the partial result; diagnostics gathered up to that point are
/// returned either way.
pub fn resolve_with<S: ConfigSource + ?Sized>(
    source: &S,
    defaults: &DefaultValues,
) -> std::result::Result<Resolution, Rejected> {
    let mut diagnostics = Vec::new();
    match resolve_instances(source, defaults, &mut diagnostics) {
        Ok(instances) => Ok(Resolution {
            instances,
            diagnostics,
        }),
        Err(error) => Err(Rejected { error, diagnostics }),
    }
}

fn resolve_instances<S: ConfigSource + ?Sized>(
    source: &S,
    defaults: &DefaultValues,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Vec<InstanceSpec>> {
    if !source.has_section(GLOBAL_SECTION) {
        return Err(ConfigError::MissingGlobalSection);
    }
    let env = EnvironmentSettings::read(source, diagnostics)?;
    let global = Layer::read(source, GLOBAL_SECTION, GLOBAL_KEYS, diagnostics)?;
    let base = Layer::from_defaults(defaults).overlay(&global);

    let mut ports = PortAllocator::new(global.base_vnc_port);
    let mut claims = Claims::default();
    let mut instances = Vec::new();

    for name in source.sections() {
        if name == ENV_SECTION || name == GLOBAL_SECTION {
            continue;
        }
        if let Some(limit) = env.instance_limit
            && instances.len() >= limit as usize
        {
            diagnostics.push(Diagnostic::InstanceLimitExceeded {
                section: name.to_string(),
                limit,
            });
            continue;
        }

        let own = Layer::read(source, name, INSTANCE_KEYS, diagnostics)?;
        let spec = materialize(name, base.clone().overlay(&own), &mut ports, &mut claims)?;
        debug!(
            instance = %spec.name,
            vnc_port = %spec.vnc_port,
            auto = spec.vnc_port_auto,
            nics = spec.nics.len(),
            "instance resolved"
        );
        instances.push(spec);
    }

    Ok(instances)
}

fn materialize(
    name: &str,
    layer: Layer,
    ports: &mut PortAllocator,
    claims: &mut Claims,
) -> Result<InstanceSpec> {
    let image = layer.image.unwrap_or_default();
    if image.is_empty() {
        return Err(ConfigError::MissingImage {
            instance: name.to_string(),
        });
    }

    let (port, vnc_port, vnc_port_auto) = match layer.vnc_port {
        Some(ExplicitPort { number, text }) => (number, text, false),
        None => {
            let port = ports.allocate(name)?;
            (port, port.to_string(), true)
        }
    };
    claims.claim(name, port, &image)?;

    let extra = layer.extra.unwrap_or_default();
    let extra_args = shlex::split(&extra).ok_or_else(|| ConfigError::InvalidExtra {
        instance: name.to_string(),
        value: extra.clone(),
    })?;

    let nic_nb = layer.nic_nb.unwrap_or_default();
    let nics = (0..nic_nb)
        .map(|index| NetworkDevice::derive(&image, index))
        .collect();

    Ok(InstanceSpec {
        name: name.to_string(),
        qemu: layer.qemu.unwrap_or_default(),
        image,
        memory: layer.memory.unwrap_or_default(),
        cpu: layer.cpu.unwrap_or_default(),
        smp: layer.smp.unwrap_or_default(),
        nic_nb,
        vnc_port,
        vnc_port_auto,
        extra,
        extra_args,
        nics,
    })
}
