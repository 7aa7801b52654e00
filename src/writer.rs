//! Streaming hex record sink.

use std::io::{self, Write};

use crate::packing::{PackedWord, ScalarRecord};

/// Writes hex records one line at a time, in production order.
pub struct HexWriter<W: Write> {
    inner: W,
    lines: usize,
}

impl<W: Write> HexWriter<W> {
    pub fn new(inner: W) -> Self {
        HexWriter { inner, lines: 0 }
    }

    pub fn write_scalar(&mut self, value: u64, bits: u32) -> io::Result<()> {
        writeln!(self.inner, "{:x}", ScalarRecord { value, bits })?;
        self.lines += 1;
        Ok(())
    }

    pub fn write_word(&mut self, word: &PackedWord) -> io::Result<()> {
        writeln!(self.inner, "{:x}", word)?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> usize {
        self.lines
    }

    /// Flush and hand back the underlying sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
