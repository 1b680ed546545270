//! Symbolization oracle interface and the `addr2line` subprocess backend
//!
//! An [`Oracle`] turns file offsets of one object into (symbol, file, line).
//! The pool never talks to a resolver directly: it opens one
//! [`OracleSession`] per worker and pulls answers in submission order.
//!
//! ## Subprocess protocol
//!
//! ```text
//! $ eu-addr2line -f -e objects/libfoo.so
//! stdin:  10\n 2a0\n ...          one lowercase hex offset per line
//! stdout: foo_a\n /src/foo.c:10\n  two lines per offset, same order
//! ```

use log::debug;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::domain::{SourceLocation, SymbolizeError};

/// Resolver for file offsets of a single object
pub trait Oracle: Sync {
    /// Start a session that will answer `offsets`, in order.
    ///
    /// # Errors
    /// Returns an error if the resolver cannot be started for `object`
    fn open(&self, object: &Path, offsets: &[u64]) -> Result<Box<dyn OracleSession>, SymbolizeError>;
}

/// One running resolver instance, owned by a single worker.
///
/// Dropping a session releases everything it holds, including killing a
/// child process that has not finished yet.
pub trait OracleSession {
    /// Resolve the next offset. Must be called with the offsets passed to
    /// [`Oracle::open`], in the same order.
    ///
    /// # Errors
    /// Returns an error if the resolver fails or answers malformed output
    fn next_location(&mut self, offset: u64) -> Result<SourceLocation, SymbolizeError>;
}

/// Resolve a whole batch through one session
///
/// # Errors
/// Returns the first error raised by the session
pub fn resolve_all(
    oracle: &dyn Oracle,
    object: &Path,
    offsets: &[u64],
) -> Result<Vec<SourceLocation>, SymbolizeError> {
    let mut session = oracle.open(object, offsets)?;
    offsets.iter().map(|&offset| session.next_location(offset)).collect()
}

/// Runs an `addr2line`-compatible command (`-f -e <object>`) per session
#[derive(Debug, Clone)]
pub struct Addr2LineOracle {
    command: String,
}

impl Addr2LineOracle {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl Oracle for Addr2LineOracle {
    fn open(&self, object: &Path, offsets: &[u64]) -> Result<Box<dyn OracleSession>, SymbolizeError> {
        let spawn_error = |source| SymbolizeError::Spawn {
            command: self.command.clone(),
            object: object.to_path_buf(),
            source,
        };

        let mut child = Command::new(&self.command)
            .arg("-f")
            .arg("-e")
            .arg(object)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            // Both are piped above; treat their absence like a failed start
            let _ = child.kill();
            let _ = child.wait();
            return Err(spawn_error(std::io::Error::other("child pipes not captured")));
        };

        // Feed from a separate thread: the child may fill its stdout pipe
        // before it has read all of stdin.
        let input: String = offsets.iter().map(|offset| format!("{offset:x}\n")).collect();
        let feeder = thread::spawn(move || stdin.write_all(input.as_bytes()));

        debug!("Started `{}` (pid {}) for {} offsets", self.command, child.id(), offsets.len());

        Ok(Box::new(Addr2LineSession {
            object: object.to_path_buf(),
            child,
            stdout: BufReader::new(stdout),
            feeder: Some(feeder),
            expected: offsets.len(),
            answered: 0,
        }))
    }
}

struct Addr2LineSession {
    object: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    feeder: Option<JoinHandle<std::io::Result<()>>>,
    expected: usize,
    answered: usize,
}

impl Addr2LineSession {
    fn read_line(&mut self) -> Result<String, SymbolizeError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(SymbolizeError::UnexpectedEof {
                object: self.object.clone(),
                answered: self.answered,
                expected: self.expected,
            });
        }
        Ok(line)
    }
}

impl OracleSession for Addr2LineSession {
    fn next_location(&mut self, offset: u64) -> Result<SourceLocation, SymbolizeError> {
        let symbol = self.read_line()?;
        let location = self.read_line()?;
        let resolved = SourceLocation::from_oracle_lines(&symbol, &location).ok_or_else(|| {
            SymbolizeError::MalformedLocation { offset, line: location.trim_end().to_string() }
        })?;
        self.answered += 1;
        Ok(resolved)
    }
}

impl Drop for Addr2LineSession {
    fn drop(&mut self) {
        // Killing an already exited child fails harmlessly; wait() reaps it either way
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(feeder) = self.feeder.take() {
            // A broken pipe here just means the child went away first
            let _ = feeder.join();
        }
    }
}
