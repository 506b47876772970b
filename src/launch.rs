/// Starting a command that waits for its supervisor before exec
///
/// The child is forked and parked on a release channel, so the supervisor can
/// move it into a cgroup while it is still harmless. Everything the child needs
/// (argv, descriptors) is built before `fork`; between `fork` and `exec` the
/// child only calls `read`, `write`, `execvp` and `_exit`.
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::ffi::CString;
use std::io::{self, Read, Write};
use std::os::raw::c_char;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

/// How a released command ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitInfo {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

/// A forked child parked before `exec`
pub struct HeldChild {
    pid: Pid,
    release: UnixStream,
    exec_status: UnixStream,
}

impl HeldChild {
    /// Fork a child for `command`; it execs only once [`HeldChild::release`] is called.
    pub fn spawn(command: &[String]) -> io::Result<Self> {
        if command.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "No command given"));
        }
        let args = command
            .iter()
            .map(|a| CString::new(a.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "Argument contains a NUL byte")
            })?;
        let mut argv: Vec<*const c_char> = args.iter().map(|a| a.as_ptr()).collect();
        argv.push(std::ptr::null());

        // Both pairs are close-on-exec: a successful exec closes the child's end
        // of `exec_status`, which the parent sees as EOF.
        let (release, child_release) = UnixStream::pair()?;
        let (exec_status, child_status) = UnixStream::pair()?;

        match unsafe { fork() }.map_err(io::Error::from)? {
            ForkResult::Child => {
                // SAFETY: only async-signal-safe calls from here on.
                unsafe {
                    exec_when_released(
                        child_release.as_raw_fd(),
                        child_status.as_raw_fd(),
                        argv.as_ptr(),
                    )
                }
            }
            ForkResult::Parent { child } => {
                drop(child_release);
                drop(child_status);
                Ok(Self {
                    pid: child,
                    release,
                    exec_status,
                })
            }
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Let the child exec, then wait for it to finish. An exec failure is
    /// returned as the child's errno.
    pub fn release(mut self) -> io::Result<ExitInfo> {
        if let Err(e) = self.release.write_all(&[1]) {
            self.abandon();
            return Err(e);
        }

        let mut errno = [0u8; 4];
        let exec_result = match self.exec_status.read_exact(&mut errno) {
            Ok(()) => Err(io::Error::from_raw_os_error(i32::from_ne_bytes(errno))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
            Err(e) => Err(e),
        };

        let exit = self.wait()?;
        exec_result.map(|()| exit)
    }

    /// Kill a child that will never be released and reap it.
    pub fn abandon(&self) {
        if let Err(e) = kill(self.pid, Signal::SIGKILL) {
            log::warn!("Failed to kill process {}: {}", self.pid, e);
        }
        let _ = self.wait();
    }

    fn wait(&self) -> io::Result<ExitInfo> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    return Ok(ExitInfo {
                        exit_code: Some(code),
                        signal: None,
                    })
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    return Ok(ExitInfo {
                        exit_code: None,
                        signal: Some(signal as i32),
                    })
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from(e)),
            }
        }
    }
}

/// Child side: block until released, then exec `argv`. Never returns.
unsafe fn exec_when_released(release_fd: RawFd, status_fd: RawFd, argv: *const *const c_char) -> ! {
    let mut byte = [0u8; 1];
    loop {
        match nix::unistd::read(release_fd, &mut byte) {
            Ok(1) => break,
            Err(Errno::EINTR) => continue,
            // Supervisor gave up on us
            _ => libc::_exit(127),
        }
    }

    libc::execvp(*argv, argv);

    let errno = Errno::last() as i32;
    let _ = nix::unistd::write(status_fd, &errno.to_ne_bytes());
    libc::_exit(127)
}
