//! Newline-delimited JSON management transport over TCP.
//!
//! Each exchange is one request line and one response line:
//!
//! ```text
//! -> {"to":"$management","properties":{...},"body":{...}}\n
//! <- {"properties":{"statusCode":200,"statusDescription":"OK"},"body":{...}}\n
//! ```
//!
//! Connect, read and write are all bounded by the configured timeout. Any IO
//! failure, timeout or early EOF is a transport failure
//! ([`MgmtError::is_transport`]).

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::channel::{Connector, ManagementChannel, MgmtTarget};
use crate::error::MgmtError;
use crate::message::{Request, Response};

#[derive(Serialize)]
struct Frame<'a> {
    to: &'a str,
    properties: &'a Map<String, Value>,
    body: &'a Value,
}

/// Opens one TCP connection per `connect()` to `bus` (`host:port`).
///
/// Only the TCP connect is bounded by `timeout`. Resolving a host name goes
/// through the system resolver and can take longer; pass an IP address in
/// `bus` when that matters.
#[derive(Debug, Clone)]
pub struct JsonLineConnector {
    bus: String,
    target: MgmtTarget,
    timeout: Duration,
}

impl JsonLineConnector {
    pub fn new(bus: impl Into<String>, target: MgmtTarget, timeout: Duration) -> Self {
        Self {
            bus: bus.into(),
            target,
            timeout,
        }
    }

    pub fn bus(&self) -> &str {
        &self.bus
    }

    pub fn target(&self) -> &MgmtTarget {
        &self.target
    }
}

impl Connector for JsonLineConnector {
    type Channel = JsonLineChannel;

    fn connect(&self) -> Result<JsonLineChannel, MgmtError> {
        let addrs = self
            .bus
            .to_socket_addrs()
            .map_err(|e| MgmtError::Transport(format!("cannot resolve {}: {e}", self.bus)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return JsonLineChannel::from_stream(stream, &self.target, self.timeout),
                Err(e) => last_err = Some(e),
            }
        }
        Err(MgmtError::Transport(match last_err {
            Some(e) => format!("cannot connect to {}: {e}", self.bus),
            None => format!("{} resolved to no addresses", self.bus),
        }))
    }
}

pub struct JsonLineChannel {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    to: String,
    open: bool,
}

impl JsonLineChannel {
    /// Wrap an already connected stream.
    pub fn from_stream(
        stream: TcpStream,
        target: &MgmtTarget,
        timeout: Duration,
    ) -> Result<Self, MgmtError> {
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            to: target.address(),
            open: true,
        })
    }
}

impl JsonLineChannel {
    fn exchange(&mut self, request: &Request) -> Result<Response, MgmtError> {
        let frame = Frame {
            to: &self.to,
            properties: &request.properties,
            body: &request.body,
        };
        let mut line = serde_json::to_string(&frame)
            .map_err(|e| MgmtError::Transport(format!("cannot encode request: {e}")))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut reply = String::new();
        let n = self.reader.read_line(&mut reply)?;
        if n == 0 {
            return Err(MgmtError::Transport("connection closed by router".into()));
        }

        serde_json::from_str(reply.trim())
            .map_err(|e| MgmtError::MalformedResponse(format!("undecodable response: {e}")))
    }
}

impl ManagementChannel for JsonLineChannel {
    /// After a transport failure the channel is closed: a late reply left on
    /// the socket must never be read as the answer to a later request.
    fn call(&mut self, request: &Request) -> Result<Response, MgmtError> {
        if !self.open {
            return Err(MgmtError::Transport("channel is closed".into()));
        }

        let result = self.exchange(request);
        if matches!(&result, Err(e) if e.is_transport()) {
            self.close();
        }
        result
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let _ = self.writer.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for JsonLineChannel {
    fn drop(&mut self) {
        self.close();
    }
}
