//! Launching the configured shell commands

use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{debug, warn};

/// Something that can launch a rendered command line
pub(crate) trait CommandRunner {
    /// Start `command` without waiting for it to finish
    fn run(&self, command: &str);
}

/// Runs command lines through the platform shell, detached
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) {
        if command.trim().is_empty() {
            debug!("empty command line, nothing to run");
            return;
        }

        match shell(command).stdin(Stdio::null()).spawn() {
            Ok(child) => {
                debug!(pid = child.id(), command, "command started");
                reap(child);
            }
            Err(e) => warn!(command, error = %e, "failed to start command"),
        }
    }
}

/// Wait for `child` on a detached thread so it never lingers as a zombie
fn reap(mut child: Child) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name("command-reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) => debug!(pid, %status, "command exited"),
            Err(e) => warn!(pid, error = %e, "failed to wait for command"),
        });
    if let Err(e) = spawned {
        warn!(pid, error = %e, "failed to start reaper thread");
    }
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{fs, thread, time::Duration};

    #[test]
    fn test_shell_runner_starts_command() {
        let marker = std::env::temp_dir().join(format!("cardaction-runner-{}", std::process::id()));
        let _ = fs::remove_file(&marker);

        ShellRunner.run(&format!("echo 9000 > '{}'", marker.display()));

        // The child is detached, so poll for its output
        let mut contents = None;
        for _ in 0..100 {
            if let Ok(text) = fs::read_to_string(&marker) {
                if !text.is_empty() {
                    contents = Some(text);
                    break;
                }
            }
            thread::sleep(Duration::from_millis(20));
        }
        let _ = fs::remove_file(&marker);
        assert_eq!(contents.as_deref(), Some("9000\n"));
    }

    /// Children of this process currently in the zombie state
    #[cfg(target_os = "linux")]
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();
        let Ok(entries) = fs::read_dir("/proc") else {
            return 0;
        };
        entries
            .filter_map(|e| fs::read_to_string(e.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                // Fields after the parenthesised command name: state, ppid, ...
                let Some((_, rest)) = stat.rsplit_once(')') else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_finished_commands_are_reaped() {
        for _ in 0..5 {
            ShellRunner.run("true");
        }

        let mut zombies = usize::MAX;
        for _ in 0..100 {
            zombies = zombie_children();
            if zombies == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(zombies, 0);
    }

    #[test]
    fn test_blank_command_is_skipped() {
        ShellRunner.run("   ");
    }
}
