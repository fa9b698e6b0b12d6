// In: src/input.rs

//! Line sources and the line-numbered record stream.
//!
//! `RecordStream` pulls one line at a time from an ordered list of inputs,
//! opening each file only when the previous one is exhausted and dropping it
//! (closing the handle) as soon as it is done or the stream itself is dropped.
//! Decode failures are wrapped with the source name, line number and line
//! content, and end the stream.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::decoder::RecordDecoder;
use crate::error::EbeError;
use crate::types::Record;

/// One input, opened lazily.
pub enum InputSource {
    Stdin,
    File(PathBuf),
    /// An already-open reader, e.g. an in-memory buffer or a decompressed stream.
    Reader {
        name: String,
        reader: Box<dyn BufRead>,
    },
}

impl InputSource {
    /// Maps configured paths to sources; no paths, or a lone `-`, means stdin.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> VecDeque<InputSource> {
        if paths.is_empty() {
            return VecDeque::from([InputSource::Stdin]);
        }
        paths
            .iter()
            .map(|p| {
                let p = p.as_ref();
                if p == Path::new("-") {
                    InputSource::Stdin
                } else {
                    InputSource::File(p.to_path_buf())
                }
            })
            .collect()
    }

    fn open(self) -> Result<OpenInput, EbeError> {
        let (name, reader): (String, Box<dyn BufRead>) = match self {
            InputSource::Stdin => ("<stdin>".to_string(), Box::new(io::stdin().lock())),
            InputSource::File(path) => {
                let file = File::open(&path)?;
                (path.display().to_string(), Box::new(BufReader::new(file)))
            }
            InputSource::Reader { name, reader } => (name, reader),
        };
        log::debug!("opened input '{}'", name);
        Ok(OpenInput {
            name,
            reader,
            line_no: 0,
        })
    }
}

struct OpenInput {
    name: String,
    reader: Box<dyn BufRead>,
    line_no: usize,
}

/// Strips a trailing `\n` or `\r\n`.
fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// A lazy, fused iterator of decoded records across all inputs.
///
/// An `EventBoundary` is emitted at the end of every input so that events
/// never span two files.
pub struct RecordStream<D: RecordDecoder> {
    inputs: VecDeque<InputSource>,
    current: Option<OpenInput>,
    decoder: D,
    line: String,
    finished: bool,
    lines_read: usize,
}

impl<D: RecordDecoder> RecordStream<D> {
    pub fn new(inputs: VecDeque<InputSource>, decoder: D) -> Self {
        Self {
            inputs,
            current: None,
            decoder,
            line: String::new(),
            finished: false,
            lines_read: 0,
        }
    }

    /// Reads the configured paths in order (stdin when empty or `-`).
    pub fn from_paths<P: AsRef<Path>>(paths: &[P], decoder: D) -> Self {
        Self::new(InputSource::from_paths(paths), decoder)
    }

    /// Reads a single already-open source.
    pub fn from_reader<R: BufRead + 'static>(name: &str, reader: R, decoder: D) -> Self {
        Self::new(
            VecDeque::from([InputSource::Reader {
                name: name.to_string(),
                reader: Box::new(reader),
            }]),
            decoder,
        )
    }

    /// Total number of lines consumed so far, across all inputs.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    fn fail(&mut self, err: EbeError) -> Option<Result<Record, EbeError>> {
        self.finished = true;
        self.current = None;
        self.inputs.clear();
        Some(Err(err))
    }
}

impl<D: RecordDecoder> Iterator for RecordStream<D> {
    type Item = Result<Record, EbeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if self.current.is_none() {
                let Some(source) = self.inputs.pop_front() else {
                    self.finished = true;
                    return None;
                };
                match source.open() {
                    Ok(open) => self.current = Some(open),
                    Err(e) => return self.fail(e),
                }
            }
            let Some(input) = self.current.as_mut() else {
                continue;
            };

            self.line.clear();
            match input.reader.read_line(&mut self.line) {
                Ok(0) => {
                    log::debug!("input '{}' exhausted after {} lines", input.name, input.line_no);
                    self.current = None;
                    self.decoder.reset();
                    return Some(Ok(Record::EventBoundary));
                }
                Ok(_) => {
                    input.line_no += 1;
                    self.lines_read += 1;
                    let content = strip_terminator(&self.line);
                    match self.decoder.decode_line(content) {
                        Ok(Some(record)) => return Some(Ok(record)),
                        Ok(None) => continue,
                        Err(source) => {
                            let err = EbeError::AtLine {
                                source_name: input.name.clone(),
                                line_no: input.line_no,
                                content: content.to_string(),
                                expected: self.decoder.format().name(),
                                source: Box::new(source),
                            };
                            log::error!("{}", err);
                            return self.fail(err);
                        }
                    }
                }
                Err(e) => return self.fail(EbeError::Io(e)),
            }
        }
    }
}
