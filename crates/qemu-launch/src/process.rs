use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::{LaunchError, Result};
use crate::render::LaunchPlan;

/// Spawn the hypervisor for `plan` directly, without a shell.
///
/// The child leads its own process group so that [`kill_process_group`]
/// also takes down anything QEMU forks (helpers, tap scripts).
pub(crate) fn spawn(plan: &LaunchPlan) -> Result<Child> {
    Command::new(&plan.program)
        .args(&plan.args)
        .stdin(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            instance: plan.instance.clone(),
            program: plan.program.clone(),
            source,
        })
}

/// Kill the entire process group led by `pid` via `killpg(SIGKILL)`.
///
/// Requires the child to have been spawned with `process_group(0)` so that its
/// PGID equals its PID. Returns `false` if the group is already gone or the
/// PID cannot be represented as `i32`.
pub(crate) fn kill_process_group(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    let pgid = nix::unistd::Pid::from_raw(pid);
    nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL).is_ok()
}
