use std::io::Read;
use std::process::{Child, Command, Stdio};

use crate::error::PileupError;
use crate::growbuf::GrowBuf;

const INITIAL_CAPACITY: usize = 1024 * 1024;
const READ_CHUNK: usize = 64 * 1024;

/// A `sh -c <command_line>` process whose stdout has not been drained yet.
/// Split from capture so a caller can spawn the process, then synchronize
/// a FIFO writer with it, and only then block reading its output.
pub struct CapturedProcess {
    child: Child,
}

pub fn spawn(command_line: &str) -> Result<CapturedProcess, PileupError> {
    let child = Command::new("sh")
        .arg("-c")
        .arg(command_line)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(PileupError::from)?;
    Ok(CapturedProcess { child })
}

impl CapturedProcess {
    pub fn finish(mut self, command_line: &str) -> Result<Vec<u8>, PileupError> {
        let mut stdout = self.child.stdout.take().expect("stdout was piped");
        let mut buf = GrowBuf::with_capacity(INITIAL_CAPACITY);
        let mut scratch = [0u8; READ_CHUNK];
        loop {
            let n = stdout.read(&mut scratch).map_err(PileupError::from)?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&scratch[..n]);
        }
        drop(stdout);

        let status = self.child.wait().map_err(PileupError::from)?;
        if !status.success() {
            return Err(PileupError::SubprocessFailed(
                command_line.to_string(),
                status.code().unwrap_or(-1),
            ));
        }
        Ok(buf.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_a_successful_command() {
        let process = spawn("printf 'hello\\n'").unwrap();
        let out = process.finish("printf 'hello\\n'").unwrap();
        assert_eq!(out, b"hello\n");
    }

    #[test]
    fn nonzero_exit_is_reported_as_subprocess_failed() {
        let process = spawn("exit 3").unwrap();
        let err = process.finish("exit 3").unwrap_err();
        match err {
            PileupError::SubprocessFailed(_, code) => assert_eq!(code, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
