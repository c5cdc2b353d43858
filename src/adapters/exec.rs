use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Run `program` with `args`, optionally in `cwd` and feeding `stdin_data`.
///
/// Blocks until the child exits; there is no timeout.
pub fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    stdin_data: Option<&[u8]>,
) -> io::Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    tracing::debug!("running {program} {}", args.join(" "));

    let Some(data) = stdin_data else {
        return cmd.stdin(Stdio::null()).output();
    };

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(data)?;
    }
    child.wait_with_output()
}

/// Trimmed stderr of a finished command, for error messages.
pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
