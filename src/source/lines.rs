//! Line-oriented source
//!
//! Turns every line read from an async reader into one text sample. Used to
//! relay whatever an operator (or a piped simulation) writes to stdin.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::SourceError;
use crate::hub::Sample;

use super::SampleSource;

/// Source yielding one sample per input line
#[derive(Debug)]
pub struct LineSource<R> {
    lines: Lines<R>,
    skip_empty: bool,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            skip_empty: false,
        }
    }

    /// Do not emit samples for blank lines
    pub fn skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty = skip;
        self
    }
}

impl LineSource<BufReader<Stdin>> {
    /// Read samples from the process's standard input
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> SampleSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if self.skip_empty && line.trim().is_empty() {
                continue;
            }
            return Ok(Some(Sample::text(line)));
        }
    }
}
