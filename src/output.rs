use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Writes a JSON array one item at a time, flushing after each item so a
/// reader sees results as they are produced.
///
/// Dropping the writer without calling [`JsonArrayWriter::finish`] leaves the
/// array unterminated.
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    first: bool,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(b"[")?;
        writer.flush()?;
        Ok(Self {
            writer,
            first: true,
        })
    }

    pub fn push<T: Serialize>(&mut self, item: &T) -> Result<()> {
        if self.first {
            self.first = false;
        } else {
            self.writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.writer, item)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.write_all(b"]\n")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}
