//! Named-pipe transport between the CLI and the daemon.
//!
//! Every connection carries exactly one JSON line in each direction: the
//! client writes a [`Command`], the daemon answers with a [`Response`].

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};

use serde::Serialize;
use serde::de::DeserializeOwned;
use vdd_core::ipc::{Command, PIPE_NAME, Response};
use vdd_core::{VddError, VddResult};
use windows::Win32::Foundation::{ERROR_PIPE_CONNECTED, HANDLE, INVALID_HANDLE_VALUE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_SHARE_NONE, FlushFileBuffers, OPEN_EXISTING, PIPE_ACCESS_DUPLEX,
};
use windows::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PIPE_READMODE_BYTE, PIPE_TYPE_BYTE,
    PIPE_UNLIMITED_INSTANCES, PIPE_WAIT, WaitNamedPipeW,
};
use windows::core::HSTRING;

const GENERIC_READ_WRITE: u32 = 0x8000_0000 | 0x4000_0000;
/// Responses carry display lists, requests are a single small command.
const OUT_BUFFER: u32 = 4096;
const IN_BUFFER: u32 = 512;

/// One open end of the pipe. The handle closes when this drops; a server
/// end is flushed and disconnected first so the client gets its reply.
struct Connection {
    file: File,
    server: bool,
}

impl Connection {
    /// # Safety
    ///
    /// `handle` must be an open pipe handle that nothing else owns.
    unsafe fn from_handle(handle: HANDLE, server: bool) -> Self {
        // SAFETY: ownership of the handle moves into the File.
        let owned = unsafe { OwnedHandle::from_raw_handle(handle.0) };
        Self {
            file: File::from(owned),
            server,
        }
    }

    fn raw(&self) -> HANDLE {
        HANDLE(self.file.as_raw_handle())
    }

    fn read_json_line<T: DeserializeOwned>(&self) -> VddResult<T> {
        let mut line = String::new();
        BufReader::new(&self.file).read_line(&mut line)?;
        if line.is_empty() {
            return Err(VddError::os("pipe closed before a message arrived"));
        }
        Ok(serde_json::from_str(line.trim())?)
    }

    fn write_json_line<T: Serialize>(&self, value: &T) -> VddResult<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        let mut file = &self.file;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.server {
            return;
        }
        // SAFETY: the handle stays open until `file` drops after this.
        // FlushFileBuffers blocks until the client has read everything;
        // disconnecting earlier would discard the reply (error 233).
        unsafe {
            let _ = FlushFileBuffers(self.raw());
            let _ = DisconnectNamedPipe(self.raw());
        }
    }
}

/// A fresh server instance of the daemon pipe, not yet connected.
pub struct Listener(Connection);

impl Listener {
    pub fn bind() -> VddResult<Self> {
        let name = HSTRING::from(PIPE_NAME);

        // SAFETY: all parameters are valid; the result is checked below.
        let handle = unsafe {
            CreateNamedPipeW(
                &name,
                PIPE_ACCESS_DUPLEX,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | PIPE_WAIT,
                PIPE_UNLIMITED_INSTANCES,
                OUT_BUFFER,
                IN_BUFFER,
                0,
                None,
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(VddError::os("failed to create named pipe"));
        }

        // SAFETY: the handle was just created and is owned by nobody else.
        Ok(Self(unsafe { Connection::from_handle(handle, true) }))
    }

    /// Blocks until a client connects and returns its command together
    /// with the means to answer it.
    pub fn accept(self) -> VddResult<(Command, Responder)> {
        // SAFETY: the handle is a valid server pipe owned by `self`.
        if let Err(e) = unsafe { ConnectNamedPipe(self.0.raw(), None) }
            && e.code() != ERROR_PIPE_CONNECTED.to_hresult()
        {
            return Err(VddError::os(e));
        }

        let command = self.0.read_json_line()?;
        Ok((command, Responder(self.0)))
    }
}

/// The answering half of an accepted connection.
pub struct Responder(Connection);

impl Responder {
    pub fn send(self, response: &Response) -> VddResult<()> {
        self.0.write_json_line(response)
    }
}

/// Sends a command to the daemon and waits for its response.
pub fn send_command(command: &Command) -> VddResult<Response> {
    let name = HSTRING::from(PIPE_NAME);

    // SAFETY: CreateFileW opens an existing named pipe as a client.
    let handle = unsafe {
        CreateFileW(
            &name,
            GENERIC_READ_WRITE,
            FILE_SHARE_NONE,
            None,
            OPEN_EXISTING,
            Default::default(),
            None,
        )
    }
    .map_err(|e| VddError::Os(format!("could not connect to the daemon: {e}")))?;

    // SAFETY: the handle was just opened and is owned here.
    let connection = unsafe { Connection::from_handle(handle, false) };
    connection.write_json_line(command)?;
    connection.read_json_line()
}

/// Whether a daemon pipe instance exists. Waits 1 ms and consumes no
/// connection.
pub fn is_daemon_running() -> bool {
    let name = HSTRING::from(PIPE_NAME);
    // SAFETY: WaitNamedPipeW only inspects the pipe namespace.
    unsafe { WaitNamedPipeW(&name, 1).as_bool() }
}
