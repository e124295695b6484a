mod command_exec;

use crate::backends::config::BackendConfig;
use crate::backends::parsers;
use crate::core::types::{ActionOutcome, Backend, InstalledPackages};
use crate::core::{ExecContext, version};
use crate::error::{PkgtrailError, Result};
use crate::packages::traits::{
    DETAIL_BACKEND_UNAVAILABLE, DETAIL_CANCELLED, PackageManager, Presence,
};
use crate::ui;
use crate::utils::{platform, sanitize};
use command_exec::{describe_failure, run_command};
use std::process::{Command, Output};

/// Package manager driven entirely by a `BackendConfig`
pub struct GenericManager {
    config: BackendConfig,
    backend: Backend,
    ctx: ExecContext,
}

#[derive(Clone, Copy)]
enum CommandMode {
    ReadOnly,
    Mutating,
}

impl GenericManager {
    pub fn from_config(config: BackendConfig, ctx: ExecContext) -> Self {
        let backend = Backend::from(config.name.as_str());
        Self {
            config,
            backend,
            ctx,
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// First available binary from the configured alternatives
    fn get_binary(&self) -> Result<String> {
        self.config
            .binary
            .find_available()
            .ok_or_else(|| PkgtrailError::BackendUnavailable(self.config.name.clone()))
    }

    /// Fill `{package}`/`{packages}`/`{version}`; `{binary}` is filled later.
    ///
    /// SECURITY: names and versions are validated, then shell-quoted.
    fn render(&self, template: &str, name: &str, version: Option<&str>) -> Result<String> {
        sanitize::validate_package_name(name)?;
        let quoted_name = sanitize::shell_escape(name)?;
        let mut rendered = template
            .replace("{packages}", &quoted_name)
            .replace("{package}", &quoted_name);

        if let Some(version) = version {
            sanitize::validate_version(version)?;
            rendered = rendered.replace("{version}", &sanitize::shell_escape(version)?);
        }

        Ok(rendered)
    }

    /// Build the shell command, with sudo for mutating commands if configured
    fn build_command(&self, cmd_str: &str, mode: CommandMode) -> Result<Command> {
        let binary = self.get_binary()?;
        let cmd_str = cmd_str.replace("{binary}", &binary);

        let use_sudo = self.config.needs_sudo && matches!(mode, CommandMode::Mutating);
        let mut cmd = platform::build_shell_command(&cmd_str, use_sudo)?;

        if let Some(env_vars) = &self.config.env {
            for (key, value) in env_vars {
                cmd.env(key, value);
            }
        }

        Ok(cmd)
    }

    fn run(&self, cmd_str: &str, mode: CommandMode) -> Result<Output> {
        let mut cmd = self.build_command(cmd_str, mode)?;
        ui::verbose(&format!("[{}] running: {}", self.backend, cmd_str));
        run_command(&mut cmd, &self.ctx)
    }

    fn query_error(&self, message: impl Into<String>) -> PkgtrailError {
        PkgtrailError::BackendQueryError {
            backend: self.config.name.clone(),
            message: message.into(),
        }
    }

    fn parse(&self, output: &Output) -> Result<InstalledPackages> {
        parsers::parse_package_list(&output.stdout, &self.config).map_err(|e| self.query_error(e))
    }

    /// Look a package up in parsed output. Falls back to a case-insensitive
    /// match because pip and friends normalize names.
    fn find_in(packages: &InstalledPackages, name: &str) -> Presence {
        let hit = packages.get(name).or_else(|| {
            packages
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
                .map(|(_, version)| version)
        });

        match hit {
            Some(version) => Presence::Installed {
                version: version.clone(),
            },
            None => Presence::Absent,
        }
    }

    /// Run a mutating command, turning every failure into diagnostic text.
    fn run_mutation(&self, cmd_str: &str) -> std::result::Result<(), String> {
        match self.run(cmd_str, CommandMode::Mutating) {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(describe_failure(&output)),
            Err(e) => Err(failure_detail(&e)),
        }
    }
}

/// Ledger detail text for an error raised while running a backend command.
pub fn failure_detail(err: &PkgtrailError) -> String {
    match err {
        PkgtrailError::Cancelled => DETAIL_CANCELLED.to_string(),
        PkgtrailError::BackendUnavailable(_) => DETAIL_BACKEND_UNAVAILABLE.to_string(),
        PkgtrailError::CommandTimedOut { seconds, .. } => {
            format!("timed out after {} seconds", seconds)
        }
        other => other.to_string(),
    }
}

impl PackageManager for GenericManager {
    fn backend(&self) -> Backend {
        self.backend.clone()
    }

    fn detect(&self) -> bool {
        self.config.binary.find_available().is_some()
    }

    fn list_installed(&self) -> Result<InstalledPackages> {
        let list_cmd = self.config.list_cmd.as_ref().ok_or_else(|| {
            self.query_error("no list command configured for this backend")
        })?;

        let output = self.run(list_cmd, CommandMode::ReadOnly)?;

        if !output.status.success() {
            return Err(self.query_error(format!(
                "list command failed ({})",
                describe_failure(&output)
            )));
        }

        self.parse(&output)
    }

    fn query(&self, name: &str) -> Result<Presence> {
        let Some(template) = &self.config.query_cmd else {
            return Ok(Self::find_in(&self.list_installed()?, name));
        };

        let cmd_str = self.render(template, name, None)?;
        let output = self.run(&cmd_str, CommandMode::ReadOnly)?;

        if !output.status.success() {
            return Ok(Presence::Absent);
        }

        Ok(Self::find_in(&self.parse(&output)?, name))
    }

    fn install(&self, name: &str, version: Option<&str>) -> ActionOutcome {
        if !self.detect() {
            return ActionOutcome::failed(DETAIL_BACKEND_UNAVAILABLE);
        }

        let template = match version {
            None => &self.config.install_cmd,
            Some(_) => match &self.config.install_version_cmd {
                Some(template) => template,
                None => {
                    return ActionOutcome::failed(format!(
                        "version pinning not supported by backend '{}'",
                        self.backend
                    ));
                }
            },
        };

        let cmd_str = match self.render(template, name, version) {
            Ok(cmd_str) => cmd_str,
            Err(e) => return ActionOutcome::failed(e.to_string()),
        };

        match self.query(name) {
            Ok(Presence::Installed { version: current })
                if version::satisfies_request(current.as_deref(), version) =>
            {
                return ActionOutcome::skipped(current, "already installed");
            }
            Ok(_) => {}
            Err(PkgtrailError::Cancelled) => return ActionOutcome::failed(DETAIL_CANCELLED),
            Err(e) => {
                ui::verbose(&format!(
                    "[{}] could not query {} before install: {}",
                    self.backend, name, e
                ));
            }
        }

        if let Err(detail) = self.run_mutation(&cmd_str) {
            return ActionOutcome::failed(detail);
        }

        match self.query(name) {
            // An unreported version cannot be checked and is accepted
            Ok(Presence::Installed {
                version: Some(found),
            }) if !version::satisfies_request(Some(found.as_str()), version) => {
                ActionOutcome::failed(format!(
                    "{} install exited successfully but {} is at {}, requested {}",
                    self.backend,
                    name,
                    found,
                    version.unwrap_or_default()
                ))
            }
            Ok(Presence::Installed { version }) => ActionOutcome::success(version),
            Ok(Presence::Absent) => ActionOutcome::failed(format!(
                "{} install exited successfully but {} is not installed",
                self.backend, name
            )),
            Err(e) => {
                ui::warning(&format!(
                    "[{}] installed {} but could not resolve its version: {}",
                    self.backend, name, e
                ));
                ActionOutcome::success(None)
            }
        }
    }

    fn remove(&self, name: &str) -> ActionOutcome {
        if !self.detect() {
            return ActionOutcome::failed(DETAIL_BACKEND_UNAVAILABLE);
        }

        match self.query(name) {
            Ok(Presence::Absent) => return ActionOutcome::skipped(None, "not installed"),
            Ok(Presence::Installed { .. }) => {}
            Err(PkgtrailError::Cancelled) => return ActionOutcome::failed(DETAIL_CANCELLED),
            Err(e) => {
                ui::verbose(&format!(
                    "[{}] could not query {} before remove: {}",
                    self.backend, name, e
                ));
            }
        }

        let Some(template) = &self.config.remove_cmd else {
            return ActionOutcome::failed(format!(
                "remove not supported by backend '{}'",
                self.backend
            ));
        };

        let cmd_str = match self.render(template, name, None) {
            Ok(cmd_str) => cmd_str,
            Err(e) => return ActionOutcome::failed(e.to_string()),
        };

        if let Err(detail) = self.run_mutation(&cmd_str) {
            return ActionOutcome::failed(detail);
        }

        match self.query(name) {
            Ok(Presence::Installed { .. }) => ActionOutcome::failed(format!(
                "{} remove exited successfully but {} is still installed",
                self.backend, name
            )),
            _ => ActionOutcome::success(None),
        }
    }

    fn install_command_preview(&self, name: &str, version: Option<&str>) -> Option<String> {
        let template = match version {
            Some(_) => self.config.install_version_cmd.as_ref()?,
            None => &self.config.install_cmd,
        };
        let rendered = self.render(template, name, version).ok()?;
        let rendered = rendered.replace("{binary}", &self.config.binary.primary());
        if self.config.needs_sudo {
            Some(format!("sudo {}", rendered))
        } else {
            Some(rendered)
        }
    }
}
