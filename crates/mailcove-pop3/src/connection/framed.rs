//! Framed I/O for the POP3 wire protocol.
//!
//! POP3 requests are single CRLF-terminated lines; responses are a status
//! line (`+OK …` / `-ERR …`) optionally followed by a dot-terminated
//! multi-line payload with leading-dot stuffing. This module provides
//! buffered reading and writing with proper handling of both framings.

#![allow(clippy::missing_errors_doc)]

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum request-line length accepted before the session fails.
const MAX_LINE_LENGTH: usize = 4096;

/// Framed connection for the POP3 protocol.
///
/// Handles line-based reading of client requests and buffered writing of
/// status lines and multi-line payloads.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one request line, accepting CRLF or bare LF as the terminator.
    ///
    /// The terminator (and a trailing `\r`) is stripped. Returns `None` on
    /// end of stream; a partial line cut off by the peer closing counts as
    /// end of stream too.
    pub async fn read_request(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(None);
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..pos]);
                self.reader.consume(pos + 1);
                break;
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::LineTooLong);
            }
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Writes a single `+OK` status line. An empty message yields a bare
    /// `+OK`.
    pub async fn write_ok(&mut self, msg: &str) -> Result<()> {
        self.write_status("+OK", msg).await
    }

    /// Writes a single `-ERR` status line.
    pub async fn write_err(&mut self, msg: &str) -> Result<()> {
        self.write_status("-ERR", msg).await
    }

    /// Writes a dot-terminated multi-line payload.
    ///
    /// Content lines have trailing `\r` stripped and are CRLF-terminated on
    /// the wire; a line beginning with `.` is stuffed with a second `.`.
    /// `strip_empty` elides empty content lines. The `.` terminator is
    /// written even when the payload is empty.
    pub async fn write_multi<'a, I>(&mut self, lines: I, strip_empty: bool) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.write_buffer.clear();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() && strip_empty {
                continue;
            }
            if line.starts_with('.') {
                self.write_buffer.extend_from_slice(b".");
            }
            self.write_buffer.extend_from_slice(line.as_bytes());
            self.write_buffer.extend_from_slice(b"\r\n");
        }
        self.write_buffer.extend_from_slice(b".\r\n");
        self.flush_buffer().await
    }

    async fn write_status(&mut self, status: &str, msg: &str) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(status.as_bytes());
        if !msg.is_empty() {
            self.write_buffer.extend_from_slice(b" ");
            self.write_buffer.extend_from_slice(msg.as_bytes());
        }
        self.write_buffer.extend_from_slice(b"\r\n");
        self.flush_buffer().await
    }

    async fn flush_buffer(&mut self) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: any buffered read data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}
