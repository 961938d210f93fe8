/// External tool invocation (helm, kubectl)
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished tool invocation
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Builder for one invocation of an external tool
pub struct ToolCommand {
    command: Command,
    description: Option<String>,
}

impl ToolCommand {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        let mut command = Command::new(program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Self {
            command,
            description: None,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.command.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.command.env(key, val);
        self
    }

    /// Point the tool at one kubeconfig file and nothing else
    pub fn kubeconfig(self, path: &Path) -> Self {
        self.env("KUBECONFIG", path)
    }

    /// What the command is for, used as error context
    pub fn describe<S: Into<String>>(mut self, msg: S) -> Self {
        self.description = Some(msg.into());
        self
    }

    /// Program and arguments as a single line
    pub fn rendered(&self) -> String {
        let std = self.command.as_std();
        std::iter::once(std.get_program())
            .chain(std.get_args())
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute and capture output regardless of exit status
    pub async fn output(mut self) -> Result<ToolOutput> {
        let rendered = self.rendered();
        debug!("Running: {}", rendered);

        let output = self
            .command
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", rendered))?;

        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }

    /// Execute and return stdout, failing on a non-zero exit
    pub async fn run(self) -> Result<String> {
        let description = self.description.clone();
        let output = self.output().await?;

        if output.success() {
            return Ok(output.stdout);
        }

        let detail = output.stderr.trim();
        match description {
            Some(desc) => anyhow::bail!("{}: {}", desc, detail),
            None => anyhow::bail!("{}", detail),
        }
    }
}

/// Fail early when a required tool is missing from PATH
pub async fn ensure_tool(tool: &str, version_args: &[&str], install_url: &str) -> Result<()> {
    match ToolCommand::new(tool).args(version_args).output().await {
        Ok(out) if out.success() => Ok(()),
        _ => anyhow::bail!(
            "{} is not installed or not in PATH. Please install from {}",
            tool,
            install_url
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_command_line() {
        let cmd = ToolCommand::new("helm").args(["repo", "list"]).arg("-o").arg("json");
        assert_eq!(cmd.rendered(), "helm repo list -o json");
    }

    #[tokio::test]
    async fn test_run_reads_kubeconfig_env() {
        let stdout = ToolCommand::new("sh")
            .args(["-c", "echo $KUBECONFIG"])
            .kubeconfig(Path::new("/tmp/cluster-a.kubeconfig"))
            .run()
            .await
            .unwrap();

        assert_eq!(stdout.trim(), "/tmp/cluster-a.kubeconfig");
    }

    #[tokio::test]
    async fn test_run_failure_carries_description_and_stderr() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .describe("Failed to install chart")
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to install chart: boom");
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let result =
            ensure_tool("definitely-not-a-real-tool", &["version"], "https://example.com").await;
        tokio_test::assert_err!(result);
    }
}
