//! # Dockyard Log Frame Decoder (`engine::log_frames`)
//!
//! File: cli/src/engine/log_frames.rs
//!
//! ## Overview
//!
//! Attach and exec responses carry process output in one of two shapes:
//!
//! - **Multiplexed** (no TTY): a sequence of frames, each with an 8-byte
//!   header. Byte 0 is the stream (0 stdin, 1 stdout, 2 stderr), bytes 1..4
//!   are zero, bytes 4..8 are the payload length as a big-endian `u32`.
//! - **Raw** (TTY): the bytes exactly as the process wrote them.
//!
//! `LogFrameDecoder` tells the two apart from the first bytes of the body
//! and yields one `LogMessage` per output line. Payloads are buffered per
//! stream until a newline arrives, so a line (or a multi-byte UTF-8
//! character) split across frames comes out whole.
//!
use bytes::{Buf, BytesMut};
use std::{collections::VecDeque, io};
use tokio_util::codec::Decoder;

const HEADER_LEN: usize = 8;

/// Longest line kept in memory; longer output is emitted in pieces.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Stdin,
    Stdout,
    Stderr,
    /// TTY output, where stdout and stderr are not distinguished.
    Raw,
}

impl LogKind {
    fn index(self) -> usize {
        match self {
            LogKind::Stdin => 0,
            LogKind::Stdout => 1,
            LogKind::Stderr => 2,
            LogKind::Raw => 3,
        }
    }

    const ALL: [LogKind; 4] = [LogKind::Stdin, LogKind::Stdout, LogKind::Stderr, LogKind::Raw];
}

/// One line of container or exec output, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub kind: LogKind,
    pub content: String,
}

impl LogMessage {
    pub fn new(kind: LogKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Multiplexed,
    Raw,
}

/// Decoder for attach/exec output.
#[derive(Debug, Default)]
pub struct LogFrameDecoder {
    mode: Option<Mode>,
    /// Stream and bytes left of the frame being read.
    frame: Option<(LogKind, usize)>,
    pending: [Vec<u8>; 4],
    ready: VecDeque<LogMessage>,
}

impl LogFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn detect_mode(src: &[u8]) -> Option<Mode> {
        match src.first() {
            None => None,
            Some(b) if *b > 2 => Some(Mode::Raw),
            Some(_) if src.len() < HEADER_LEN => None,
            Some(_) if src[1..4].iter().all(|b| *b == 0) => Some(Mode::Multiplexed),
            Some(_) => Some(Mode::Raw),
        }
    }

    fn append(&mut self, kind: LogKind, bytes: &[u8]) {
        let buf = &mut self.pending[kind.index()];
        buf.extend_from_slice(bytes);
        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            self.ready.push_back(to_message(kind, &line));
        }
        if buf.len() > MAX_LINE_LENGTH {
            let line: Vec<u8> = std::mem::take(buf);
            self.ready.push_back(to_message(kind, &line));
        }
    }

    fn flush_pending(&mut self) {
        for kind in LogKind::ALL {
            let buf = std::mem::take(&mut self.pending[kind.index()]);
            if !buf.is_empty() {
                self.ready.push_back(to_message(kind, &buf));
            }
        }
    }

    fn read_multiplexed(&mut self, src: &mut BytesMut) -> io::Result<()> {
        while self.ready.is_empty() && !src.is_empty() {
            match self.frame {
                None => {
                    if src.len() < HEADER_LEN {
                        return Ok(());
                    }
                    let kind = match src[0] {
                        0 => LogKind::Stdin,
                        1 => LogKind::Stdout,
                        2 => LogKind::Stderr,
                        other => {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                format!("invalid log frame stream type {}", other),
                            ))
                        }
                    };
                    let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
                    src.advance(HEADER_LEN);
                    if len > 0 {
                        self.frame = Some((kind, len));
                    }
                }
                Some((kind, remaining)) => {
                    let take = remaining.min(src.len());
                    let chunk = src.split_to(take);
                    self.append(kind, &chunk);
                    self.frame = if remaining > take {
                        Some((kind, remaining - take))
                    } else {
                        None
                    };
                }
            }
        }
        Ok(())
    }
}

fn to_message(kind: LogKind, line: &[u8]) -> LogMessage {
    let mut end = line.len();
    if end > 0 && line[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    LogMessage {
        kind,
        content: String::from_utf8_lossy(&line[..end]).into_owned(),
    }
}

impl Decoder for LogFrameDecoder {
    type Item = LogMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<LogMessage>> {
        if let Some(message) = self.ready.pop_front() {
            return Ok(Some(message));
        }
        if self.mode.is_none() {
            self.mode = Self::detect_mode(src);
        }
        match self.mode {
            None => return Ok(None),
            Some(Mode::Raw) => {
                if !src.is_empty() {
                    let chunk = src.split();
                    self.append(LogKind::Raw, &chunk);
                }
            }
            Some(Mode::Multiplexed) => self.read_multiplexed(src)?,
        }
        Ok(self.ready.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<LogMessage>> {
        // Short bodies that never filled a frame header are TTY output.
        if self.mode.is_none() && !src.is_empty() {
            self.mode = Some(Mode::Raw);
        }
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if self.frame.is_some() || !src.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a log frame",
            ));
        }
        self.flush_pending();
        Ok(self.ready.pop_front())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn frame(stream: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![stream, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn decode_chunks(chunks: &[&[u8]]) -> io::Result<Vec<LogMessage>> {
        let mut decoder = LogFrameDecoder::new();
        let mut buf = BytesMut::new();
        let mut out = Vec::new();
        for chunk in chunks {
            buf.extend_from_slice(chunk);
            while let Some(m) = decoder.decode(&mut buf)? {
                out.push(m);
            }
        }
        while let Some(m) = decoder.decode_eof(&mut buf)? {
            out.push(m);
        }
        Ok(out)
    }

    #[test]
    fn test_multiplexed_lines_keep_stream_kind() {
        let mut body = frame(1, b"hello\nwor");
        body.extend(frame(2, b"oops\r\n"));
        body.extend(frame(1, b"ld\n"));

        let messages = decode_chunks(&[&body]).unwrap();
        assert_eq!(
            messages,
            vec![
                LogMessage::new(LogKind::Stdout, "hello"),
                LogMessage::new(LogKind::Stderr, "oops"),
                LogMessage::new(LogKind::Stdout, "world"),
            ]
        );
    }

    #[test]
    fn test_header_split_across_reads() {
        let body = frame(1, "naïve\n".as_bytes());
        // Split inside the header and inside the two-byte 'ï'.
        let messages = decode_chunks(&[&body[..3], &body[3..11], &body[11..]]).unwrap();
        assert_eq!(messages, vec![LogMessage::new(LogKind::Stdout, "naïve")]);
    }

    #[test]
    fn test_raw_tty_output() {
        let messages = decode_chunks(&[b"$ ls\r\nfile.txt\n", b"prompt"]).unwrap();
        assert_eq!(
            messages,
            vec![
                LogMessage::new(LogKind::Raw, "$ ls"),
                LogMessage::new(LogKind::Raw, "file.txt"),
                LogMessage::new(LogKind::Raw, "prompt"),
            ]
        );
    }

    #[test]
    fn test_short_raw_body() {
        let messages = decode_chunks(&[b"ok"]).unwrap();
        assert_eq!(messages, vec![LogMessage::new(LogKind::Raw, "ok")]);
    }

    #[test]
    fn test_partial_line_flushed_at_end() {
        let messages = decode_chunks(&[&frame(1, b"no newline")]).unwrap();
        assert_eq!(messages, vec![LogMessage::new(LogKind::Stdout, "no newline")]);
    }

    #[test]
    fn test_truncated_frame_is_error() {
        let body = frame(1, b"hello world\n");
        let err = decode_chunks(&[&body[..12]]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_empty_frames_are_skipped() {
        let mut body = frame(1, b"");
        body.extend(frame(1, b"x\n"));
        let messages = decode_chunks(&[&body]).unwrap();
        assert_eq!(messages, vec![LogMessage::new(LogKind::Stdout, "x")]);
    }
}
