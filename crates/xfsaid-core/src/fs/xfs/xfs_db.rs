//! Subprocess runner for `xfs_db`

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::CommandRunner;
use crate::config::OracleConfig;
use crate::error::{Result, XfsAidError};

/// Runs `xfs_db [-r] <device> -c <cmd>...` and returns its stdout
pub struct XfsDb {
    device: PathBuf,
    config: OracleConfig,
}

impl XfsDb {
    pub fn new(device: impl Into<PathBuf>, config: OracleConfig) -> Self {
        Self {
            device: device.into(),
            config,
        }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    fn args(&self, commands: &[&str]) -> Vec<OsString> {
        let mut args = Vec::with_capacity(commands.len() * 2 + 2);
        if self.config.read_only {
            args.push(OsString::from("-r"));
        }
        args.push(self.device.as_os_str().to_os_string());
        for command in commands {
            args.push(OsString::from("-c"));
            args.push(OsString::from(command));
        }
        args
    }

    /// Shell-style rendering of an invocation, for diagnostics
    pub fn describe(&self, commands: &[&str]) -> String {
        let mut line = self.config.program.display().to_string();
        if self.config.read_only {
            line.push_str(" -r");
        }
        line.push(' ');
        line.push_str(&self.device.display().to_string());
        for command in commands {
            line.push_str(&format!(" -c '{command}'"));
        }
        line
    }
}

impl CommandRunner for XfsDb {
    fn run(&self, commands: &[&str]) -> Result<String> {
        let described = self.describe(commands);
        tracing::debug!("Running {}", described);

        let output = Command::new(&self.config.program)
            .args(self.args(commands))
            .output()
            .map_err(|source| XfsAidError::OracleSpawn {
                program: self.config.program.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::debug!(
                "{} failed: {}",
                described,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(XfsAidError::OracleCommand {
                code: output.status.code(),
                command: described,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
