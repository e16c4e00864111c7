//! Invoking the dbt executable
//!
//! Blocking subprocess calls with no timeout. Callers that need one wrap
//! the invocation themselves.

use std::path::Path;
use std::process::Command;

/// Runs dbt subcommands inside a project directory
pub trait DbtInvoker {
    /// Run `dbt <args>` and return its stdout
    fn run(&self, project_dir: &Path, args: &[&str]) -> Result<String, InvokeError>;

    /// `dbt compile`, refreshing `target/manifest.json`
    fn compile(&self, project_dir: &Path) -> Result<(), InvokeError> {
        self.run(project_dir, &["compile"]).map(|_| ())
    }

    /// `dbt debug`, checking the profile and warehouse connection
    fn debug(&self, project_dir: &Path) -> Result<String, InvokeError> {
        self.run(project_dir, &["debug"])
    }
}

/// Process-backed invoker
#[derive(Debug, Clone)]
pub struct DbtCli {
    executable: String,
}

impl DbtCli {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for DbtCli {
    fn default() -> Self {
        Self::new("dbt")
    }
}

impl DbtInvoker for DbtCli {
    fn run(&self, project_dir: &Path, args: &[&str]) -> Result<String, InvokeError> {
        let command = format!("{} {}", self.executable, args.join(" "));
        tracing::info!(command = %command, dir = %project_dir.display(), "running dbt");

        let output = Command::new(&self.executable)
            .args(args)
            .current_dir(project_dir)
            .output()
            .map_err(|e| InvokeError::Spawn {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            // dbt writes most of its diagnostics to stdout
            let diagnostic = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr
            };

            return Err(InvokeError::Failed {
                command,
                status: output.status.code(),
                diagnostic,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// dbt invocation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    #[error("Failed to start `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("`{command}` failed:\n{diagnostic}")]
    Failed {
        command: String,
        status: Option<i32>,
        diagnostic: String,
    },
}

impl InvokeError {
    /// Text to show the user: the tool's own output when it ran, else the spawn error
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Spawn { .. } => self.to_string(),
            Self::Failed { diagnostic, .. } => diagnostic.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let cli = DbtCli::new("chatdbt-no-such-dbt-binary");
        let err = cli.compile(Path::new(".")).unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }));
        assert!(err.diagnostic().contains("chatdbt-no-such-dbt-binary compile"));
    }

    #[test]
    fn failure_diagnostic_is_verbatim() {
        let err = InvokeError::Failed {
            command: "dbt compile".to_string(),
            status: Some(2),
            diagnostic: "Compilation Error in model orders\n  unexpected '}'\n".to_string(),
        };

        assert_eq!(err.diagnostic(), "Compilation Error in model orders\n  unexpected '}'\n");
        assert!(err.to_string().starts_with("`dbt compile` failed:"));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_reported() {
        // `false` ignores its arguments and exits 1
        let cli = DbtCli::new("false");
        let err = cli.run(Path::new("."), &["compile"]).unwrap_err();
        assert!(matches!(err, InvokeError::Failed { status: Some(1), .. }));
    }
}
