use std::io::Write;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::{LaunchError, Result};
use crate::process::{kill_process_group, spawn};
use crate::render::LaunchPlan;

/// One instance handed to a launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launched {
    pub instance: String,
    /// `None` for dry runs.
    pub pid: Option<u32>,
}

/// Where rendered plans go: printed for review, or started for real.
#[async_trait]
pub trait Launcher: Send {
    /// Human-readable name for this launcher (e.g. "dry-run").
    fn name(&self) -> &str;
    /// Launch every plan in order.
    async fn launch(&mut self, plans: &[LaunchPlan]) -> Result<Vec<Launched>>;
}

/// Writes each plan's pretty command instead of running it.
pub struct DryRunLauncher<W> {
    out: W,
}

impl<W> DryRunLauncher<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: Write + Send> Launcher for DryRunLauncher<W> {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn launch(&mut self, plans: &[LaunchPlan]) -> Result<Vec<Launched>> {
        let mut launched = Vec::with_capacity(plans.len());
        for plan in plans {
            writeln!(self.out, "# {}", plan.instance)?;
            writeln!(self.out, "{}", plan.pretty_command())?;
            writeln!(self.out)?;
            launched.push(Launched {
                instance: plan.instance.clone(),
                pid: None,
            });
        }
        self.out.flush()?;
        Ok(launched)
    }
}

/// Spawns one hypervisor process per plan.
///
/// With `wait` unset the processes are left running when `launch` returns.
/// With `wait` set, all processes are watched at once: `launch` returns once
/// every one has exited, fails as soon as any exits non-zero (the others keep
/// running), and kills all process groups on Ctrl-C.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher {
    wait: bool,
}

impl ProcessLauncher {
    pub fn new(wait: bool) -> Self {
        Self { wait }
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    fn name(&self) -> &str {
        "process"
    }

    async fn launch(&mut self, plans: &[LaunchPlan]) -> Result<Vec<Launched>> {
        let mut children: Vec<(String, Child)> = Vec::with_capacity(plans.len());
        for plan in plans {
            let child = match spawn(plan) {
                Ok(child) => child,
                Err(e) => {
                    error!(instance = %plan.instance, error = %e, "spawn failed, stopping started instances");
                    kill_all(children.iter().filter_map(|(_, c)| c.id()));
                    return Err(e);
                }
            };
            info!(instance = %plan.instance, pid = ?child.id(), "hypervisor started");
            children.push((plan.instance.clone(), child));
        }

        let launched: Vec<Launched> = children
            .iter()
            .map(|(instance, child)| Launched {
                instance: instance.clone(),
                pid: child.id(),
            })
            .collect();

        if !self.wait {
            return Ok(launched);
        }

        let pids: Vec<u32> = launched.iter().filter_map(|l| l.pid).collect();
        tokio::select! {
            result = wait_all(children) => result.map(|()| launched),
            _ = tokio::signal::ctrl_c() => {
                let count = kill_all(pids.into_iter());
                Err(LaunchError::Interrupted { count })
            }
        }
    }
}

/// Wait for every child concurrently, in exit order.
async fn wait_all(children: Vec<(String, Child)>) -> Result<()> {
    let mut waits = JoinSet::new();
    for (instance, mut child) in children {
        waits.spawn(async move {
            let status = child.wait().await;
            (instance, status)
        });
    }

    while let Some(joined) = waits.join_next().await {
        let (instance, status) = joined?;
        let status = status.map_err(|source| LaunchError::Wait {
            instance: instance.clone(),
            source,
        })?;
        info!(instance = %instance, %status, "hypervisor exited");
        if !status.success() {
            return Err(LaunchError::Exited {
                instance,
                code: status.code(),
            });
        }
    }
    Ok(())
}

fn kill_all(pids: impl Iterator<Item = u32>) -> usize {
    pids.filter(|&pid| kill_process_group(pid)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(instance: &str, program: &str, args: &[&str]) -> LaunchPlan {
        LaunchPlan {
            instance: instance.into(),
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn dry_run_writes_pretty_commands() {
        let plans = vec![
            plan("a", "qemu-system-x86_64", &["-m", "2G", "-cpu", "host"]),
            plan("b", "qemu-system-x86_64", &["-m", "1G", "-cpu", "qemu64"]),
        ];
        let mut launcher = DryRunLauncher::new(Vec::<u8>::new());
        let launched = launcher.launch(&plans).await.unwrap();
        assert!(launched.iter().all(|l| l.pid.is_none()));
        assert_eq!(launched.len(), 2);

        let out = String::from_utf8(launcher.into_inner()).unwrap();
        assert_eq!(
            out,
            "# a\nqemu-system-x86_64 \\\n    -m 2G \\\n    -cpu host\n\n\
             # b\nqemu-system-x86_64 \\\n    -m 1G \\\n    -cpu qemu64\n\n"
        );
    }

    #[tokio::test]
    async fn dry_run_with_no_plans_writes_nothing() {
        let mut launcher = DryRunLauncher::new(Vec::<u8>::new());
        assert!(launcher.launch(&[]).await.unwrap().is_empty());
        assert!(launcher.into_inner().is_empty());
    }

    #[tokio::test]
    async fn process_launcher_reports_pids() {
        let plans = vec![plan("a", "true", &[]), plan("b", "true", &[])];
        let launched = ProcessLauncher::new(true).launch(&plans).await.unwrap();
        assert_eq!(
            launched.iter().map(|l| l.instance.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(launched.iter().all(|l| l.pid.is_some()));
    }

    #[tokio::test]
    async fn process_launcher_without_wait_returns_immediately() {
        let plans = vec![plan("a", "sleep", &["0.2"])];
        let launched = ProcessLauncher::new(false).launch(&plans).await.unwrap();
        assert_eq!(launched.len(), 1);
        assert!(launched[0].pid.is_some());
    }

    #[tokio::test]
    async fn process_launcher_fails_on_nonzero_exit() {
        let plans = vec![plan("a", "true", &[]), plan("b", "sh", &["-c", "exit 3"])];
        let err = ProcessLauncher::new(true).launch(&plans).await.unwrap_err();
        assert!(
            matches!(err, LaunchError::Exited { ref instance, code: Some(3) } if instance == "b"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn later_failure_is_reported_while_earlier_vm_runs() {
        let plans = vec![plan("a", "sleep", &["5"]), plan("b", "sh", &["-c", "exit 3"])];
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            ProcessLauncher::new(true).launch(&plans),
        )
        .await
        .expect("launch should not wait for the sleeping VM");
        let err = result.unwrap_err();
        assert!(
            matches!(err, LaunchError::Exited { ref instance, code: Some(3) } if instance == "b"),
            "got: {err}"
        );
    }

    #[tokio::test]
    async fn process_launcher_spawn_failure() {
        let plans = vec![
            plan("a", "sleep", &["30"]),
            plan("b", "/nonexistent/qemu", &[]),
        ];
        let err = ProcessLauncher::new(false).launch(&plans).await.unwrap_err();
        assert!(
            matches!(err, LaunchError::Spawn { ref instance, .. } if instance == "b"),
            "got: {err}"
        );
    }

    #[test]
    fn launcher_names() {
        assert_eq!(DryRunLauncher::new(Vec::<u8>::new()).name(), "dry-run");
        assert_eq!(ProcessLauncher::default().name(), "process");
    }
}
