use anyhow::{anyhow, Result};
use std::io::{BufRead, Write};

use crate::align::Read;
use crate::util::dna;

/// 四行格式的 FASTQ 读取器（不支持序列折行）
pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    line: usize,
    done: bool,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            line: 0,
            done: false,
        }
    }

    fn read_line(&mut self) -> Result<usize> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n > 0 {
            self.line += 1;
        }
        Ok(n)
    }

    pub fn next_record(&mut self) -> Result<Option<Read>> {
        if self.done {
            return Ok(None);
        }

        // header line starting with '@'; trailing blank lines are ignored
        loop {
            if self.read_line()? == 0 {
                self.done = true;
                return Ok(None);
            }
            if !self.buf.trim().is_empty() {
                break;
            }
        }
        if !self.buf.starts_with('@') {
            return Err(anyhow!("line {}: FASTQ header not starting with '@'", self.line));
        }
        let name = self.buf[1..].split_whitespace().next().unwrap_or("").to_string();

        if self.read_line()? == 0 {
            return Err(anyhow!("read '{}': unexpected EOF after header", name));
        }
        let seq = dna::from_ascii_seq(self.buf.trim_end().as_bytes());

        if self.read_line()? == 0 || !self.buf.starts_with('+') {
            return Err(anyhow!("read '{}': missing '+' line", name));
        }

        if self.read_line()? == 0 {
            return Err(anyhow!("read '{}': missing quality line", name));
        }
        let qual = self.buf.trim_end().as_bytes().to_vec();

        if qual.len() != seq.len() {
            return Err(anyhow!(
                "read '{}': sequence length {} does not match quality length {}",
                name,
                seq.len(),
                qual.len()
            ));
        }

        Ok(Some(Read { name, seq, qual }))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<Read>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(r)) => Some(Ok(r)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub fn write_record<W: Write>(out: &mut W, read: &Read) -> Result<()> {
    out.write_all(b"@")?;
    out.write_all(read.name.as_bytes())?;
    out.write_all(b"\n")?;
    out.write_all(&dna::to_ascii_seq(&read.seq))?;
    out.write_all(b"\n+\n")?;
    out.write_all(&read.qual)?;
    out.write_all(b"\n")?;
    Ok(())
}
