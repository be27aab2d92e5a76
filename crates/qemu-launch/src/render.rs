use std::borrow::Cow;

use qemu_config::InstanceSpec;

/// Hardware acceleration; pemu only drives KVM guests.
const ACCEL_FLAG: &str = "--enable-kvm";
/// Serial console on stdio, no SDL window; the display is exported over VNC.
const DISPLAY_FLAG: &str = "-nographic";

/// Argv for one hypervisor process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub instance: String,
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchPlan {
    pub fn from_spec(spec: &InstanceSpec) -> Self {
        let mut args: Vec<String> = [
            ACCEL_FLAG,
            DISPLAY_FLAG,
            "-m",
            spec.memory.as_str(),
            "-cpu",
            spec.cpu.as_str(),
            "-smp",
            spec.smp.as_str(),
            "-hda",
            spec.image.as_str(),
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        for nic in &spec.nics {
            args.push("-netdev".into());
            args.push(nic.backend.clone());
            args.push("-device".into());
            args.push(nic.frontend.clone());
        }

        args.push("-vnc".into());
        args.push(format!(":{}", spec.vnc_port));
        args.extend(spec.extra_args.iter().cloned());

        Self {
            instance: spec.name.clone(),
            program: spec.qemu.clone(),
            args,
        }
    }

    /// Program followed by all arguments.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }

    /// Single-line form, quoted so a shell runs exactly this argv.
    pub fn raw_command(&self) -> String {
        shlex::try_join(self.tokens())
            .unwrap_or_else(|_| self.tokens().map(quote).collect::<Vec<_>>().join(" "))
    }

    /// One flag group per line, joined with shell continuations.
    pub fn pretty_command(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for token in self.tokens() {
            let quoted = quote(token);
            match lines.last_mut() {
                Some(line) if !is_flag(token) => {
                    line.push(' ');
                    line.push_str(&quoted);
                }
                _ => lines.push(quoted.into_owned()),
            }
        }
        lines.join(" \\\n    ")
    }
}

/// Shell-quote `token`; a token with a NUL byte cannot come from the config
/// file and is passed through as is.
fn quote(token: &str) -> Cow<'_, str> {
    shlex::try_quote(token).unwrap_or(Cow::Borrowed(token))
}

/// `-x` or `--long-name`, but not a bare `-` or a negative number.
fn is_flag(token: &str) -> bool {
    let name = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))
        .unwrap_or("");
    name.starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Render `spec` as `(raw_command, pretty_command)`.
pub fn render(spec: &InstanceSpec) -> (String, String) {
    let plan = LaunchPlan::from_spec(spec);
    (plan.raw_command(), plan.pretty_command())
}
