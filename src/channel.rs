//! Front-end side of the worker channel
//!
//! The worker runs as a child process (`partscan --worker`) whose stdin and
//! stdout are both one end of a Unix socket pair. The front end keeps the
//! other end as a tokio stream, so awaiting a response suspends only the
//! awaiting task while the rest of the single-threaded runtime keeps running.

use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::process::{Child, Command};

use crate::protocol::{
    HEADER_SIZE, Header, Message, ProtocolError, Result, WorkerCommand, WorkerResponse,
};

/// Strict request/reply channel to the capture worker
pub struct WorkerChannel {
    stream: UnixStream,
    child: Option<Child>,
    timeout: Duration,
    /// Set once a read was abandoned mid-message; the stream is out of sync
    poisoned: bool,
}

impl WorkerChannel {
    /// Start the worker process and connect to it
    pub fn spawn(timeout: Duration) -> anyhow::Result<Self> {
        let exe = std::env::current_exe().context("Failed to locate own executable")?;
        let mut command = Command::new(exe);
        command
            .arg("--worker")
            .stderr(Stdio::inherit())
            // Keep terminal ctrl-c away from the worker; the front end stops it
            .process_group(0);
        Self::spawn_with(command, timeout)
    }

    /// Spawn `command` with its stdin and stdout on one end of a socket pair
    pub fn spawn_with(mut command: Command, timeout: Duration) -> anyhow::Result<Self> {
        let (front, worker) = StdUnixStream::pair().context("Failed to create socket pair")?;
        let worker_out = worker.try_clone().context("Failed to clone worker socket")?;

        let child = command
            .stdin(Stdio::from(OwnedFd::from(worker)))
            .stdout(Stdio::from(OwnedFd::from(worker_out)))
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn capture worker")?;
        log::info!("Spawned capture worker (pid {:?})", child.id());
        // The worker's ends must close here or hang-ups are never seen
        drop(command);

        let mut channel = Self::from_stream(front, timeout)?;
        channel.child = Some(child);
        Ok(channel)
    }

    /// Wrap an already connected stream; no child process is managed
    pub fn from_stream(stream: StdUnixStream, timeout: Duration) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream: UnixStream::from_std(stream)?,
            child: None,
            timeout,
            poisoned: false,
        })
    }

    /// Send one command and wait for its response.
    ///
    /// Exactly one request may be outstanding; `&mut self` makes pipelining
    /// impossible. Any error is fatal to the session.
    pub async fn request(&mut self, command: &WorkerCommand) -> Result<WorkerResponse> {
        if self.poisoned {
            return Err(ProtocolError::ChannelClosed);
        }
        self.send(command).await?;

        let timeout = self.timeout;
        let message = match tokio::time::timeout(timeout, self.receive()).await {
            Ok(message) => message?,
            Err(_) => {
                self.poisoned = true;
                return Err(ProtocolError::Timeout(timeout));
            }
        };
        message.into_response()
    }

    async fn send(&mut self, command: &WorkerCommand) -> Result<()> {
        let bytes = command.encode()?.to_bytes()?;
        self.stream.write_all(&bytes).await.map_err(peer_error)?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Message> {
        let mut header_buf = [0u8; HEADER_SIZE];
        self.read_exact(&mut header_buf).await?;
        let header = Header::unpack(&header_buf)?;

        let mut payload = vec![0u8; header.payload_len as usize];
        self.read_exact(&mut payload).await?;
        Ok(Message { header, payload })
    }

    /// Wait for readiness, then read without blocking
    async fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            self.stream.readable().await.map_err(peer_error)?;
            match self.stream.try_read(&mut buf[filled..]) {
                Ok(0) => return Err(ProtocolError::ChannelClosed),
                Ok(n) => filled += n,
                // Spurious wakeup
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(peer_error(e)),
            }
        }
        Ok(())
    }

    /// Tell the worker to exit, then join it without a timeout
    pub async fn shutdown(mut self) -> anyhow::Result<Option<ExitStatus>> {
        self.send(&WorkerCommand::terminate())
            .await
            .context("Failed to send terminate to worker")?;
        self.join().await
    }

    /// Signal the worker after a fatal channel error and reap it
    pub async fn abort(mut self) -> anyhow::Result<Option<ExitStatus>> {
        if let Some(pid) = self.child.as_ref().and_then(Child::id) {
            log::info!("Sending SIGTERM to capture worker {}", pid);
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                log::error!("Failed to send SIGTERM to worker {}: {}", pid, e);
            }
        }
        self.join().await
    }

    async fn join(&mut self) -> anyhow::Result<Option<ExitStatus>> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let status = child.wait().await.context("Failed to wait for worker")?;
        log::info!("Capture worker exited with {}", status);
        Ok(Some(status))
    }
}

/// A worker that died mid-exchange shows up as a reset or broken pipe
fn peer_error(err: io::Error) -> ProtocolError {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => ProtocolError::ChannelClosed,
        _ => ProtocolError::IoError(err),
    }
}
