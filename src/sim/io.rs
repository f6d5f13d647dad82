//! IO handling for the system call interface.
//!
//! This module consists of:
//! - [`InputSource`]: where `read`-style system calls take their input from
//!   (a pre-supplied script of lines, or the process's stdin)
//! - [`SysIo`]: the bundle of input, output, and open file descriptors the
//!   simulator dispatches system calls against
//! - [`SharedBuf`]: a cloneable in-memory output sink, mainly for tests

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Read, Write};
use std::sync::{Arc, Mutex};

/// Where input system calls read from.
#[derive(Debug, Default)]
pub enum InputSource {
    /// Read lines from the process's stdin.
    #[default]
    Interactive,
    /// Pop lines off a fixed script; once the script runs out, input is
    /// exhausted and further reads fail.
    Script(VecDeque<String>),
}

impl InputSource {
    /// Creates a script source from input text, one read per line.
    pub fn script(text: &str) -> Self {
        InputSource::Script(text.lines().map(str::to_string).collect())
    }

    /// Reads the next line of input, without a trailing newline.
    ///
    /// Returns `None` if the script is exhausted or stdin is closed.
    pub fn read_line(&mut self) -> Option<String> {
        match self {
            InputSource::Interactive => {
                let mut line = String::new();
                match io::stdin().lock().read_line(&mut line) {
                    Ok(0) | Err(_) => None,
                    Ok(_) => {
                        while line.ends_with(['\n', '\r']) {
                            line.pop();
                        }
                        Some(line)
                    }
                }
            }
            InputSource::Script(lines) => lines.pop_front(),
        }
    }
}

/// The IO state system calls operate on: an input source, an output sink,
/// and the table of open file descriptors.
///
/// Descriptors 0-2 are reserved for the standard streams, so files opened
/// at runtime are numbered from 3.
pub struct SysIo {
    input: InputSource,
    out: Box<dyn Write + Send>,
    files: HashMap<i32, File>,
    next_fd: i32,
}

impl SysIo {
    /// Creates IO state reading from stdin and writing to stdout.
    pub fn new() -> Self {
        SysIo {
            input: InputSource::Interactive,
            out: Box::new(io::stdout()),
            files: HashMap::new(),
            next_fd: 3,
        }
    }

    /// Replaces the input source.
    pub fn set_input(&mut self, input: InputSource) {
        self.input = input;
    }

    /// Replaces the output sink.
    pub fn set_output(&mut self, out: Box<dyn Write + Send>) {
        self.out = out;
    }

    /// Writes text to the output sink.
    pub fn write_out(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("program output was dropped: {e}");
        }
    }

    /// Reads the next line of input, without a trailing newline.
    pub fn read_line(&mut self) -> Option<String> {
        self.input.read_line()
    }

    /// Opens a file, returning a new descriptor (or -1 on failure).
    ///
    /// The flag values follow the usual convention: 0 is read-only,
    /// 1 is write (create/truncate), 9 is append, and anything else
    /// is read-write.
    pub fn open(&mut self, path: &str, flags: u32) -> i32 {
        let mut opts = OpenOptions::new();
        match flags {
            0 => opts.read(true),
            1 => opts.write(true).create(true).truncate(true),
            9 => opts.append(true).create(true),
            _ => opts.read(true).write(true),
        };

        match opts.open(path) {
            Ok(file) => {
                let fd = self.next_fd;
                self.next_fd += 1;
                self.files.insert(fd, file);
                fd
            }
            Err(e) => {
                warn!("could not open '{path}': {e}");
                -1
            }
        }
    }

    /// Reads up to `buf.len()` bytes from an open descriptor into `buf`,
    /// returning the number of bytes read (or -1 on failure).
    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> i32 {
        let Some(file) = self.files.get_mut(&fd) else { return -1 };
        match file.read(buf) {
            Ok(n) => n as i32,
            Err(_) => -1,
        }
    }

    /// Writes `buf` to an open descriptor, returning the number of bytes
    /// written (or -1 on failure).
    pub fn write(&mut self, fd: i32, buf: &[u8]) -> i32 {
        let Some(file) = self.files.get_mut(&fd) else { return -1 };
        match file.write(buf) {
            Ok(n) => n as i32,
            Err(_) => -1,
        }
    }

    /// Closes an open descriptor. Closing an unknown descriptor is a no-op.
    pub fn close(&mut self, fd: i32) {
        self.files.remove(&fd);
    }
}

impl Default for SysIo {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for SysIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysIo")
            .field("input", &self.input)
            .field("open_files", &self.files.len())
            .finish_non_exhaustive()
    }
}

/// A cloneable, shareable byte buffer implementing [`Write`].
///
/// Cloning produces a handle to the same buffer, so a test can hand one
/// clone to the simulator as its output sink and keep the other to
/// inspect what the program printed.
#[derive(Debug, Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer's contents, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        let guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&guard).into_owned()
    }
}
impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
