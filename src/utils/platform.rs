use crate::error::Result;
#[cfg(not(unix))]
use crate::error::PkgtrailError;
use std::process::Command;

/// Build a shell command in a platform-aware way.
///
/// - Unix: `sh -c <command>` or `sudo sh -c <command>`
/// - Windows: `cmd /C <command>` (elevated shell not supported)
pub fn build_shell_command(command: &str, elevated: bool) -> Result<Command> {
    #[cfg(unix)]
    {
        let cmd = if elevated {
            let mut c = Command::new("sudo");
            c.arg("sh").arg("-c").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };

        Ok(cmd)
    }

    #[cfg(windows)]
    {
        if elevated {
            return Err(PkgtrailError::Other(
                "Elevated shell execution is not implemented for Windows yet".to_string(),
            ));
        }

        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        Ok(cmd)
    }

    #[cfg(not(any(unix, windows)))]
    {
        if elevated {
            return Err(PkgtrailError::Other(
                "Elevated shell execution is not implemented on this platform".to_string(),
            ));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        Ok(cmd)
    }
}
