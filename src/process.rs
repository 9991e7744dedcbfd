use crate::error::{Error, Result};
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `argv` to completion with `env` laid over the inherited environment.
pub async fn run(argv: &[OsString], env: &[(&str, &str)]) -> Result<CommandOutput> {
    let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;
    let output = Command::new(program)
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| Error::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;
    Ok(CommandOutput {
        exit_code: exit_code(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    // killed by a signal: report it negated
    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<OsString> {
        vec![OsString::from("sh"), OsString::from("-c"), OsString::from(script)]
    }

    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let output = run(&sh("echo out; echo err >&2; exit 3"), &[]).await.unwrap();
        assert_eq!(
            output,
            CommandOutput {
                exit_code: 3,
                stdout: String::from("out\n"),
                stderr: String::from("err\n"),
            }
        );
    }

    #[tokio::test]
    async fn test_env_overlays_inherited_environment() {
        let path = std::env::var("PATH").unwrap();
        let output = run(
            &sh("echo \"$PATH $AWS_ACCESS_KEY_ID\""),
            &[("AWS_ACCESS_KEY_ID", "AKID")],
        )
        .await
        .unwrap();
        assert_eq!(output.stdout, format!("{path} AKID\n"));
        assert_eq!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_signal_exit_code() {
        let output = run(&sh("kill -9 $$"), &[]).await.unwrap();
        assert_eq!(output.exit_code, -9);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let argv = vec![OsString::from("/nonexistent/ssorepeat-test-binary")];
        let err = run(&argv, &[]).await.unwrap_err();
        assert!(
            matches!(err, Error::Spawn { ref program, .. } if program == "/nonexistent/ssorepeat-test-binary")
        );
    }

    #[tokio::test]
    async fn test_non_unicode_argument_reaches_child() {
        use std::os::unix::ffi::OsStringExt;
        let mut argv = sh("printf %s \"$0\" | od -An -tx1");
        argv.push(OsString::from_vec(vec![b'a', 0xff]));
        let output = run(&argv, &[]).await.unwrap();
        assert_eq!(output.stdout.split_whitespace().collect::<Vec<_>>(), ["61", "ff"]);
    }

    #[tokio::test]
    async fn test_empty_command() {
        assert!(matches!(run(&[], &[]).await, Err(Error::EmptyCommand)));
    }
}
