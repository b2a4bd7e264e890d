//! Operator control via signals and stdin
//!
//! Each loop iteration asks the [`ControlMonitor`] for one [`ControlSignal`].
//! Delivered signals are forwarded by a background task that does nothing but
//! store the signal number into an atomic slot; the monitor reads and clears
//! that slot on the loop's own schedule. Stdin is checked with a zero-timeout
//! `poll(2)` so the frame path never blocks on the operator.

use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use bytes::BytesMut;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};

use crate::config::RunOptions;

/// Most recent signal delivered to the process (0 = none)
static SIGNAL_RECEIVED: AtomicI32 = AtomicI32::new(0);

/// Set once SIGINT has been delivered, never cleared
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Signals the monitor reacts to
pub const HANDLED_SIGNALS: [libc::c_int; 4] =
    [libc::SIGUSR1, libc::SIGUSR2, libc::SIGINT, libc::SIGPIPE];

/// Route SIGUSR1, SIGUSR2, SIGINT and SIGPIPE into the process signal slot
///
/// Must be called from within a tokio runtime. The handlers are registered
/// before this returns; a spawned task then copies each delivery into
/// [`SignalSlot::process`]. SIGPIPE is caught rather than left at its default
/// so that a viewer disconnecting from a socket output does not kill the
/// process.
pub fn install_signal_handlers() -> std::io::Result<()> {
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut pipe = signal(SignalKind::pipe())?;

    let slot = SignalSlot::process();
    tokio::spawn(async move {
        loop {
            let signum = tokio::select! {
                Some(()) = usr1.recv() => libc::SIGUSR1,
                Some(()) = usr2.recv() => libc::SIGUSR2,
                Some(()) = interrupt.recv() => libc::SIGINT,
                Some(()) = pipe.recv() => libc::SIGPIPE,
                else => break,
            };
            debug!("Received signal {}", signum);
            slot.raise(signum);
        }
    });

    debug!("Installed handlers for signals {:?}", HANDLED_SIGNALS);
    Ok(())
}

/// Single-word slot holding the last received signal
#[derive(Debug, Clone, Copy)]
pub struct SignalSlot {
    slot: &'static AtomicI32,
    interrupted: &'static AtomicBool,
}

impl SignalSlot {
    /// The slot written by the process signal handlers
    pub fn process() -> Self {
        Self {
            slot: &SIGNAL_RECEIVED,
            interrupted: &INTERRUPTED,
        }
    }

    /// A private slot not connected to any handler
    ///
    /// Each call leaks two words; meant for tests and embedders that deliver
    /// notifications themselves.
    pub fn detached() -> Self {
        Self {
            slot: Box::leak(Box::new(AtomicI32::new(0))),
            interrupted: Box::leak(Box::new(AtomicBool::new(false))),
        }
    }

    /// Record a signal as if the handler had run
    pub fn raise(&self, signum: libc::c_int) {
        if signum == libc::SIGINT {
            self.interrupted.store(true, Ordering::SeqCst);
        }
        self.slot.store(signum, Ordering::SeqCst);
    }

    /// Whether an interrupt has ever been recorded
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Read without clearing
    pub fn peek(&self) -> libc::c_int {
        self.slot.load(Ordering::SeqCst)
    }

    /// Read and clear
    pub fn take(&self) -> libc::c_int {
        self.slot.swap(0, Ordering::SeqCst)
    }
}

/// Operator intent for one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlSignal {
    #[default]
    None,
    /// Enter pressed or SIGUSR1 received
    Commit,
    /// 'x' typed, SIGUSR2/SIGPIPE received, or interrupted
    Quit,
}

impl ControlSignal {
    /// Interpret the first character of an operator line
    pub fn from_key(key: char) -> Self {
        match key {
            '\n' | '\r' => Self::Commit,
            'x' | 'X' => Self::Quit,
            _ => Self::None,
        }
    }
}

/// Result of a non-blocking check for operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPoll {
    /// No complete line is waiting
    Nothing,
    /// One line, including its newline if present
    Line(String),
    /// The input stream has ended
    Closed,
}

/// Source of operator input lines
pub trait KeySource: Send {
    /// Check for a line without blocking
    fn poll_line(&mut self) -> KeyPoll;
}

/// Operator input from a file descriptor, normally stdin
///
/// Bytes are read straight from the descriptor into a private buffer, so
/// several lines arriving in one write are handed out one per poll.
#[derive(Debug)]
pub struct StdinKeys {
    fd: RawFd,
    pending: BytesMut,
    closed: bool,
}

impl StdinKeys {
    pub fn new() -> Self {
        Self::from_fd(libc::STDIN_FILENO)
    }

    /// Read operator lines from `fd`, which stays owned by the caller
    pub fn from_fd(fd: RawFd) -> Self {
        Self {
            fd,
            pending: BytesMut::with_capacity(256),
            closed: false,
        }
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')? + 1;
        let line = self.pending.split_to(end);
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Append whatever the descriptor has ready, without blocking
    fn fill(&mut self) {
        let mut fds = [libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        }];

        // SAFETY: `fds` is a valid array of one pollfd for the duration of
        // the call and a zero timeout makes the call return immediately.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), 1, 0) };
        if ready <= 0 {
            return;
        }
        if fds[0].revents & libc::POLLNVAL != 0 {
            self.closed = true;
            return;
        }
        if fds[0].revents & (libc::POLLIN | libc::POLLHUP) == 0 {
            return;
        }

        let mut buf = [0u8; 1024];
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes, and poll
        // reported the descriptor readable so the call does not block.
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
        match n {
            0 => self.closed = true,
            n if n > 0 => self.pending.extend_from_slice(&buf[..n as usize]),
            _ => debug!(
                "Failed to read operator input: {}",
                std::io::Error::last_os_error()
            ),
        }
    }
}

impl Default for StdinKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for StdinKeys {
    fn poll_line(&mut self) -> KeyPoll {
        if let Some(line) = self.next_line() {
            return KeyPoll::Line(line);
        }

        if !self.closed {
            self.fill();
            if let Some(line) = self.next_line() {
                return KeyPoll::Line(line);
            }
        }

        match (self.closed, self.pending.is_empty()) {
            // Unterminated last line
            (true, false) => {
                let rest = self.pending.split();
                KeyPoll::Line(String::from_utf8_lossy(&rest).into_owned())
            }
            (true, true) => KeyPoll::Closed,
            (false, _) => KeyPoll::Nothing,
        }
    }
}

/// Turns signals and operator keys into one [`ControlSignal`] per tick
pub struct ControlMonitor {
    keypress: bool,
    signal: bool,
    keys: Box<dyn KeySource>,
    slot: SignalSlot,
}

impl ControlMonitor {
    pub fn new(keypress: bool, signal: bool, keys: Box<dyn KeySource>, slot: SignalSlot) -> Self {
        Self {
            keypress,
            signal,
            keys,
            slot,
        }
    }

    /// Monitor stdin and the process signal slot as configured
    pub fn from_options(options: &RunOptions) -> Self {
        Self::new(
            options.keypress,
            options.signal,
            Box::new(StdinKeys::new()),
            SignalSlot::process(),
        )
    }

    /// The slot this monitor reads
    pub fn slot(&self) -> SignalSlot {
        self.slot
    }

    /// Produce the control signal for this tick
    ///
    /// An interrupt always wins, on this and every later poll. A keypress is
    /// read next; a pending signal, when signal control is enabled, overrides
    /// it and is consumed.
    pub fn poll(&mut self) -> ControlSignal {
        if self.slot.interrupted() {
            return ControlSignal::Quit;
        }

        let mut key = None;

        if self.keypress {
            match self.keys.poll_line() {
                KeyPoll::Line(line) => key = Some(line.chars().next().unwrap_or('\n')),
                KeyPoll::Closed => {
                    info!("Operator input closed, no longer polling for keys");
                    self.keypress = false;
                }
                KeyPoll::Nothing => {}
            }
        }

        if self.signal {
            match self.slot.take() {
                libc::SIGUSR1 => key = Some('\n'),
                libc::SIGUSR2 | libc::SIGPIPE => key = Some('x'),
                _ => {}
            }
        }

        key.map(ControlSignal::from_key).unwrap_or_default()
    }
}

impl std::fmt::Debug for ControlMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlMonitor")
            .field("keypress", &self.keypress)
            .field("signal", &self.signal)
            .field("slot", &self.slot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Lines(VecDeque<KeyPoll>);

    impl KeySource for Lines {
        fn poll_line(&mut self) -> KeyPoll {
            self.0.pop_front().unwrap_or(KeyPoll::Nothing)
        }
    }

    fn monitor(keypress: bool, signal: bool, polls: Vec<KeyPoll>) -> ControlMonitor {
        ControlMonitor::new(
            keypress,
            signal,
            Box::new(Lines(polls.into())),
            SignalSlot::detached(),
        )
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(ControlSignal::from_key('\n'), ControlSignal::Commit);
        assert_eq!(ControlSignal::from_key('x'), ControlSignal::Quit);
        assert_eq!(ControlSignal::from_key('X'), ControlSignal::Quit);
        assert_eq!(ControlSignal::from_key('q'), ControlSignal::None);
    }

    #[test]
    fn test_interrupt_is_sticky() {
        let mut m = monitor(false, true, vec![]);
        m.slot().raise(libc::SIGINT);
        assert_eq!(m.poll(), ControlSignal::Quit);
        assert_eq!(m.poll(), ControlSignal::Quit);

        // A later signal overwrites the slot but not the interrupt
        m.slot().raise(libc::SIGUSR1);
        assert_eq!(m.poll(), ControlSignal::Quit);
    }

    #[test]
    fn test_signal_overrides_key() {
        let mut m = monitor(true, true, vec![KeyPoll::Line("x\n".into())]);
        m.slot().raise(libc::SIGUSR1);
        assert_eq!(m.poll(), ControlSignal::Commit);
    }

    #[test]
    fn test_keys_ignored_when_disabled() {
        let mut m = monitor(false, false, vec![KeyPoll::Line("x\n".into())]);
        assert_eq!(m.poll(), ControlSignal::None);
    }

    #[test]
    fn test_closed_input_stops_polling() {
        let mut m = monitor(
            true,
            false,
            vec![KeyPoll::Closed, KeyPoll::Line("x\n".into())],
        );
        assert_eq!(m.poll(), ControlSignal::None);
        assert_eq!(m.poll(), ControlSignal::None);
    }

    struct Pipe {
        read: RawFd,
        write: Option<RawFd>,
    }

    impl Pipe {
        fn new() -> Self {
            let mut fds = [0; 2];
            assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
            Self {
                read: fds[0],
                write: Some(fds[1]),
            }
        }

        fn send(&self, data: &[u8]) {
            let fd = self.write.unwrap();
            let n = unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) };
            assert_eq!(n, data.len() as isize);
        }

        fn hang_up(&mut self) {
            if let Some(fd) = self.write.take() {
                unsafe { libc::close(fd) };
            }
        }
    }

    impl Drop for Pipe {
        fn drop(&mut self) {
            self.hang_up();
            unsafe { libc::close(self.read) };
        }
    }

    fn line(text: &str) -> KeyPoll {
        KeyPoll::Line(text.to_string())
    }

    #[test]
    fn test_stdin_keys_split_one_write_into_lines() {
        let pipe = Pipe::new();
        let mut keys = StdinKeys::from_fd(pipe.read);
        assert_eq!(keys.poll_line(), KeyPoll::Nothing);

        pipe.send(b"\n\nx\n");
        assert_eq!(keys.poll_line(), line("\n"));
        assert_eq!(keys.poll_line(), line("\n"));
        assert_eq!(keys.poll_line(), line("x\n"));
        assert_eq!(keys.poll_line(), KeyPoll::Nothing);
    }

    #[test]
    fn test_stdin_keys_wait_for_complete_line() {
        let pipe = Pipe::new();
        let mut keys = StdinKeys::from_fd(pipe.read);

        pipe.send(b"ab");
        assert_eq!(keys.poll_line(), KeyPoll::Nothing);
        pipe.send(b"c\n");
        assert_eq!(keys.poll_line(), line("abc\n"));
    }

    #[test]
    fn test_stdin_keys_report_close_after_last_line() {
        let mut pipe = Pipe::new();
        let mut keys = StdinKeys::from_fd(pipe.read);

        pipe.send(b"x\ntail");
        pipe.hang_up();
        assert_eq!(keys.poll_line(), line("x\n"));
        assert_eq!(keys.poll_line(), line("tail"));
        assert_eq!(keys.poll_line(), KeyPoll::Closed);
        assert_eq!(keys.poll_line(), KeyPoll::Closed);
    }

    #[test]
    fn test_monitor_reads_every_buffered_key() {
        let pipe = Pipe::new();
        let mut m = ControlMonitor::new(
            true,
            false,
            Box::new(StdinKeys::from_fd(pipe.read)),
            SignalSlot::detached(),
        );

        pipe.send(b"\n\nx\n");
        assert_eq!(m.poll(), ControlSignal::Commit);
        assert_eq!(m.poll(), ControlSignal::Commit);
        assert_eq!(m.poll(), ControlSignal::Quit);
        assert_eq!(m.poll(), ControlSignal::None);
    }

    #[test]
    fn test_signal_left_pending_when_disabled() {
        let mut m = monitor(false, false, vec![]);
        m.slot().raise(libc::SIGUSR2);
        assert_eq!(m.poll(), ControlSignal::None);
        assert_eq!(m.slot().peek(), libc::SIGUSR2);
    }
}
