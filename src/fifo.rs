use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::PileupError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const FIFO_MODE: libc::mode_t = 0o666;

/// Creates a named pipe at `path`. From:
/// https://github.com/kotauskas/interprocess/blob/main/src/os/unix/fifo_file.rs
pub fn create_fifo(path: &Path) -> Result<(), PileupError> {
    let c_path = CString::new(path.as_os_str().as_encoded_bytes().to_vec()).map_err(|e| {
        PileupError::FifoSetup {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    })?;
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), FIFO_MODE) };
    if rc != 0 {
        return Err(PileupError::FifoSetup {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Opens `path` for writing once a reader has attached. Opening a FIFO for
/// writing blocks until a reader opens the other end; probing with
/// `O_NONBLOCK` first (retrying on `ENXIO`) lets this thread notice a
/// reader without committing to a blocking open before one exists, then a
/// second, ordinary open hands back a descriptor that won't stall.
pub fn open_for_write_synchronized(path: &Path) -> Result<File, PileupError> {
    loop {
        match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
        {
            Ok(probe) => {
                drop(probe);
                break;
            }
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(PileupError::FifoSetup {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
    }

    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| PileupError::FifoSetup {
            path: path.to_path_buf(),
            source: e,
        })
}

/// A thread that waits for a reader on `fifo_path`, then hands the opened
/// write end to `write_payload`.
pub struct FifoWriterHandle {
    handle: JoinHandle<Result<(), PileupError>>,
}

impl FifoWriterHandle {
    pub fn spawn<F>(fifo_path: PathBuf, write_payload: F) -> Self
    where
        F: FnOnce(File) -> Result<(), PileupError> + Send + 'static,
    {
        let handle = thread::spawn(move || -> Result<(), PileupError> {
            let file = open_for_write_synchronized(&fifo_path)?;
            write_payload(file)
        });
        Self { handle }
    }

    pub fn join(self) -> Result<(), PileupError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(PileupError::IoFailure(
                "FIFO writer thread panicked".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn create_fifo_makes_a_fifo_special_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1");
        create_fifo(&path).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.file_type().is_fifo());
    }

    #[test]
    fn writer_does_not_race_a_delayed_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1");
        create_fifo(&path).unwrap();

        let reader_path = path.clone();
        let reader = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            let mut f = File::open(&reader_path).unwrap();
            let mut buf = Vec::new();
            f.read_to_end(&mut buf).unwrap();
            buf
        });

        let writer = FifoWriterHandle::spawn(path, |mut file: File| {
            file.write_all(b"hello fifo").map_err(PileupError::from)
        });

        writer.join().unwrap();
        let received = reader.join().unwrap();
        assert_eq!(received, b"hello fifo");
    }
}
