//! Streams and standard I/O
//!
//! Every runtime instance owns a [`StdIo`] pair. An absent or Nil stream
//! operand, or a Stream opened from `stdio:`, talks to it. Forked executions get a StdIo
//! backed by crossbeam channels whose other ends the parent holds as a
//! [`Stream::Fork`].

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};

use crossbeam::channel::{Receiver, Sender};

/// Standard input and output of one runtime instance
pub struct StdIo {
    /// Source for reads from the nil stream
    pub input: Box<dyn Read>,
    /// Sink for writes to the nil stream
    pub output: Box<dyn Write>,
}

impl StdIo {
    /// Wrap an input and an output
    pub fn new(input: Box<dyn Read>, output: Box<dyn Write>) -> Self {
        Self { input, output }
    }

    /// The host process's stdin and stdout
    pub fn process() -> Self {
        Self::new(Box::new(io::stdin()), Box::new(io::stdout()))
    }
}

impl fmt::Debug for StdIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdIo").finish_non_exhaustive()
    }
}

/// An open stream
pub enum Stream {
    /// The owning runtime's standard I/O
    Stdio,
    /// A file on disk
    File(File),
    /// Standard I/O of a forked execution
    Fork(ForkStream),
}

impl Stream {
    /// Short description used by `Stat` and diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            Stream::Stdio => "stdio",
            Stream::File(_) => "file",
            Stream::Fork(_) => "fork",
        }
    }

    /// Open `uri`.
    ///
    /// `stdio:` and `-` name standard I/O. `file://path` and bare paths are
    /// opened for reading and writing, or read-only if writing is refused.
    pub fn open(uri: &str) -> io::Result<Stream> {
        if uri == "-" || uri == "stdio:" {
            return Ok(Stream::Stdio);
        }
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        if path.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty path"));
        }
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Ok(Stream::File(file)),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                File::open(path).map(Stream::File)
            }
            Err(err) => Err(err),
        }
    }
}

/// Parent-side handle on a forked execution
pub struct ForkStream {
    /// Bytes the child sends
    pub reader: ChannelReader,
    /// Bytes for the child to read
    pub writer: ChannelWriter,
}

/// [`Read`] over a channel of byte chunks. The stream ends once every
/// sender is gone and the buffered chunks are drained.
pub struct ChannelReader {
    receiver: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    position: usize,
}

impl ChannelReader {
    /// Read from `receiver`
    pub fn new(receiver: Receiver<Vec<u8>>) -> Self {
        Self {
            receiver,
            pending: Vec::new(),
            position: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.position >= self.pending.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.position = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let available = &self.pending[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

/// [`Write`] into a channel of byte chunks
pub struct ChannelWriter {
    sender: Sender<Vec<u8>>,
}

impl ChannelWriter {
    /// Write to `sender`
    pub fn new(sender: Sender<Vec<u8>>) -> Self {
        Self { sender }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sender
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "forked execution has exited"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
