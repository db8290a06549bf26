//! Terminal plumbing for the standalone browser.

use std::io::{self, Read};

use tokio::{
    io::{AsyncWriteExt, DuplexStream, duplex},
    runtime::Handle,
};
use tracing::debug;

const INPUT_BUFFER_BYTES: usize = 1024;
const READER_THREAD_NAME: &str = "parchment-input";

/// Feed a blocking byte source into an async stream from a detached thread.
///
/// The thread is never joined, so a read blocked on a quiet terminal does not
/// hold up runtime shutdown the way `tokio::io::stdin` does.
pub fn spawn_input_reader<R>(mut source: R) -> io::Result<DuplexStream>
where
    R: Read + Send + 'static,
{
    let (mut writer, reader) = duplex(INPUT_BUFFER_BYTES);
    let handle = Handle::current();

    std::thread::Builder::new()
        .name(READER_THREAD_NAME.to_string())
        .spawn(move || {
            let mut buf = [0u8; INPUT_BUFFER_BYTES];
            loop {
                let read = match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(read) => read,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!(error = %err, "input read failed");
                        break;
                    }
                };
                if handle.block_on(writer.write_all(&buf[..read])).is_err() {
                    break;
                }
            }
        })?;

    Ok(reader)
}

/// Puts stdin into raw mode for as long as the guard lives.
#[cfg(unix)]
pub struct RawModeGuard {
    original: libc::termios,
}

#[cfg(unix)]
impl RawModeGuard {
    /// Returns `None` when stdin is not a terminal.
    pub fn enable() -> io::Result<Option<Self>> {
        let fd = libc::STDIN_FILENO;
        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(fd) } != 1 {
            return Ok(None);
        }

        let mut original = std::mem::MaybeUninit::<libc::termios>::uninit();
        // SAFETY: fd is a terminal and `original` is valid for writes.
        if unsafe { libc::tcgetattr(fd, original.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: tcgetattr succeeded and filled the struct.
        let original = unsafe { original.assume_init() };

        let mut raw = original;
        // SAFETY: `raw` is an initialised termios owned by this frame.
        unsafe { libc::cfmakeraw(&mut raw) };
        // SAFETY: fd is a terminal and `raw` is a valid termios.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Some(Self { original }))
    }
}

#[cfg(unix)]
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // SAFETY: restores the settings captured from the same descriptor.
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

#[cfg(not(unix))]
pub struct RawModeGuard;

#[cfg(not(unix))]
impl RawModeGuard {
    pub fn enable() -> io::Result<Option<Self>> {
        Ok(None)
    }
}
