use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Chunks(ChunksError),
    /// The stream is not valid UTF-8.
    InvalidPayload,
}

/// Reads the `data` of server-sent events from a chunk stream.
///
/// Only what chat-completion streams use is supported: `data` fields,
/// possibly spread over several lines, and blank-line event terminators.
/// Comments and other fields are skipped, as are events without data.
pub struct Sse {
    buf: String,
    // Bytes of a UTF-8 sequence split across two chunks.
    pending: Vec<u8>,
    chunks: Chunks,
    exhausted: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending: Vec::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            while let Some(block) = self.take_block() {
                if let Some(data) = parse_block(&block) {
                    return Ok(Some(data));
                }
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.chunks.next_chunk().await.map_err(Error::Chunks)? {
                Some(bytes) => self.push_bytes(&bytes)?,
                None => {
                    self.exhausted = true;
                    if !self.pending.is_empty() {
                        return Err(Error::InvalidPayload);
                    }
                    // A final event may lack its blank line.
                    if !self.buf.trim().is_empty() {
                        self.buf.push_str("\n\n");
                    }
                }
            }
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_some() => {
                return Err(Error::InvalidPayload);
            }
            Err(err) => err.valid_up_to(),
        };
        let rest = self.pending.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending, rest);
        let text =
            String::from_utf8(complete).map_err(|_| Error::InvalidPayload)?;
        self.buf.push_str(&text);
        if self.buf.contains('\r') {
            self.buf = self.buf.replace("\r\n", "\n");
        }
        Ok(())
    }

    fn take_block(&mut self) -> Option<String> {
        let end = self.buf.find("\n\n")?;
        let block = self.buf[..end].to_owned();
        self.buf.drain(..end + 2);
        Some(block)
    }
}

fn parse_block(block: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        if field != "data" {
            continue;
        }
        let value = value.strip_prefix(' ').unwrap_or(value);
        if let Some(joined) = data.as_mut() {
            joined.push('\n');
            joined.push_str(value);
        } else {
            data = Some(value.to_owned());
        }
    }
    data
}
