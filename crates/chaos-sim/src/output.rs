//! Simulator output streams.
//!
//! An [`OutputDirectory`] hands out append-only [`OutputStream`]s by name,
//! the way a simulator's output manager creates per-component log files.
//! Two backends exist:
//!
//! - **Disk** — streams are buffered files under a root directory.
//! - **Memory** — streams accumulate in shared buffers that tests can read
//!   back with [`contents`](OutputDirectory::contents), so log output can
//!   be asserted byte-for-byte without touching the filesystem.
//!
//! Streams are opened once and kept for the lifetime of the component;
//! callers flush at their own cadence.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

type MemoryFiles = Rc<RefCell<HashMap<String, Rc<RefCell<Vec<u8>>>>>>;

/// Factory for named append-only output streams.
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    backend: Backend,
}

#[derive(Debug, Clone)]
enum Backend {
    Disk(PathBuf),
    Memory(MemoryFiles),
}

impl OutputDirectory {
    /// Output directory rooted on disk. The root is created if missing.
    pub fn disk(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            backend: Backend::Disk(root),
        })
    }

    /// In-memory output directory for tests.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Rc::new(RefCell::new(HashMap::new()))),
        }
    }

    /// Open the named stream, truncating unless `append` is set.
    pub fn create(&self, name: &str, append: bool) -> io::Result<OutputStream> {
        match &self.backend {
            Backend::Disk(root) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(append)
                    .truncate(!append)
                    .open(root.join(name))?;
                Ok(OutputStream {
                    sink: Sink::File(BufWriter::new(file)),
                })
            }
            Backend::Memory(files) => {
                let mut files = files.borrow_mut();
                let buf = files
                    .entry(name.to_owned())
                    .or_insert_with(|| Rc::new(RefCell::new(Vec::new())));
                if !append {
                    buf.borrow_mut().clear();
                }
                Ok(OutputStream {
                    sink: Sink::Memory(Rc::clone(buf)),
                })
            }
        }
    }

    /// Read back the full contents of a named stream.
    ///
    /// Returns `None` if the stream was never created. For disk backends
    /// this reads the file; buffered writers must be flushed first.
    pub fn contents(&self, name: &str) -> Option<String> {
        match &self.backend {
            Backend::Disk(root) => fs::read_to_string(root.join(name)).ok(),
            Backend::Memory(files) => {
                let files = files.borrow();
                let buf = files.get(name)?;
                let contents = String::from_utf8_lossy(&buf.borrow()).into_owned();
                Some(contents)
            }
        }
    }
}

/// An append-only output stream created by an [`OutputDirectory`].
#[derive(Debug)]
pub struct OutputStream {
    sink: Sink,
}

#[derive(Debug)]
enum Sink {
    File(BufWriter<File>),
    Memory(Rc<RefCell<Vec<u8>>>),
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Sink::File(w) => w.write(buf),
            Sink::Memory(b) => {
                b.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::File(w) => w.flush(),
            Sink::Memory(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_stream_round_trips() {
        let out = OutputDirectory::in_memory();
        let mut s = out.create("a.log", true).unwrap();
        writeln!(s, "line one").unwrap();
        writeln!(s, "line two").unwrap();

        assert_eq!(out.contents("a.log").unwrap(), "line one\nline two\n");
        assert!(out.contents("missing.log").is_none());
    }

    #[test]
    fn memory_create_without_append_truncates() {
        let out = OutputDirectory::in_memory();
        let mut s = out.create("a.log", true).unwrap();
        writeln!(s, "old").unwrap();
        drop(s);

        let _s = out.create("a.log", false).unwrap();
        assert_eq!(out.contents("a.log").unwrap(), "");
    }

    #[test]
    fn clones_share_the_same_files() {
        let out = OutputDirectory::in_memory();
        let copy = out.clone();
        let mut s = out.create("shared.log", true).unwrap();
        writeln!(s, "hello").unwrap();

        assert_eq!(copy.contents("shared.log").unwrap(), "hello\n");
    }
}
