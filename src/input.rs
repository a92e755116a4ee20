use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};

/// Seekable input over a file or stdin.
///
/// Synchronization rewinds the source, so piped input is read into memory
/// up front.
pub enum InputReader {
    File(BufReader<File>),
    Pipe(Cursor<Vec<u8>>),
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path = input_path.as_ref();

        if is_pipe(path) {
            let mut data = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            log::debug!("Read {} bytes from stdin", data.len());

            return Ok(Self::Pipe(Cursor::new(data)));
        }

        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self::File(BufReader::new(file)))
    }
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(reader) => reader.read(buf),
            Self::Pipe(reader) => reader.read(buf),
        }
    }
}

impl Seek for InputReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(reader) => reader.seek(pos),
            Self::Pipe(reader) => reader.seek(pos),
        }
    }
}

pub fn is_pipe(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Name used for an input in logs and reports.
pub fn source_name(path: &Path) -> String {
    if is_pipe(path) {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_paths() {
        assert!(is_pipe(Path::new("-")));
        assert!(!is_pipe(Path::new("-.mp3")));
        assert_eq!(source_name(Path::new("-")), "<stdin>");
        assert_eq!(source_name(Path::new("a/b.mp3")), "a/b.mp3");
    }

    #[test]
    fn missing_file() {
        let err = InputReader::new("does/not/exist.mp3").err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Failed to open does/not/exist.mp3"));
    }

    #[test]
    fn pipe_reader_seeks() -> io::Result<()> {
        let mut reader = InputReader::Pipe(Cursor::new(vec![1, 2, 3, 4]));

        let mut buf = [0u8; 2];
        reader.seek(SeekFrom::Start(2))?;
        reader.read_exact(&mut buf)?;
        assert_eq!(buf, [3, 4]);
        Ok(())
    }
}
