//! Record-oriented reader for child process output.
//!
//! The downloader redraws its progress line with `\r` when it believes it is
//! attached to a terminal, and uses `\n` otherwise. Records are therefore cut
//! on either byte so progress surfaces as soon as it is written.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Longest record kept before it is flushed regardless of delimiters.
const MAX_RECORD_LEN: usize = 64 * 1024;

/// Yields non-blank text records delimited by `\n` or `\r`.
pub struct RecordReader<R> {
    reader: BufReader<R>,
    partial: Vec<u8>,
}

impl<R> RecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            partial: Vec::new(),
        }
    }

    /// Next record, or `None` once the stream is exhausted.
    ///
    /// Trailing whitespace is trimmed and blank records are skipped. Invalid
    /// UTF-8 is replaced rather than rejected.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                let record = take_record(&mut self.partial);
                return Ok((!record.is_empty()).then_some(record));
            }

            let (consumed, complete) =
                match available.iter().position(|b| matches!(b, b'\n' | b'\r')) {
                    Some(pos) => {
                        self.partial.extend_from_slice(&available[..pos]);
                        (pos + 1, true)
                    }
                    None => {
                        self.partial.extend_from_slice(available);
                        (available.len(), false)
                    }
                };
            self.reader.consume(consumed);

            if complete || self.partial.len() >= MAX_RECORD_LEN {
                let record = take_record(&mut self.partial);
                if !record.is_empty() {
                    return Ok(Some(record));
                }
            }
        }
    }
}

fn take_record(partial: &mut Vec<u8>) -> String {
    let record = String::from_utf8_lossy(partial).trim_end().to_string();
    partial.clear();
    if record.trim().is_empty() {
        String::new()
    } else {
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn collect(input: impl Into<Vec<u8>>) -> Vec<String> {
        let input = input.into();
        let (mut tx, rx) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let _ = tx.write_all(&input).await;
        });

        let mut reader = RecordReader::new(rx);
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().await.unwrap() {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn test_splits_on_carriage_return_and_newline() {
        let records = collect(b"[download]   1.0%\r[download]   2.0%\r\nDone\n\n  \nlast").await;
        assert_eq!(records, vec!["[download]   1.0%", "[download]   2.0%", "Done", "last"]);
    }

    #[tokio::test]
    async fn test_records_spanning_reads() {
        let long = "x".repeat(500);
        let records = collect(format!("{long}\nshort\n")).await;
        assert_eq!(records, vec![long, "short".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let records = collect(b"ok \xff\n").await;
        assert_eq!(records, vec!["ok \u{fffd}"]);
    }
}
