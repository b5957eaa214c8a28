use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed reader feeding a built-in the buffered output of the
/// previous pipeline stage.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    pub fn new(buf: Vec<u8>) -> Self {
        MemReader {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl crate::command::Stdin for MemReader {
    /// In-memory readers are only ever handed to built-ins executed
    /// in-process, so a child would see no input at all.
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// Memory-backed writer capturing a built-in's output so it can feed the
/// next pipeline stage.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// Creates the writer together with a handle through which the caller
    /// can take the collected bytes after the command ran.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        let handle = Rc::clone(&buf);
        (MemWriter { buf }, handle)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl crate::command::Stdout for MemWriter {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// Wraps the process's own standard input so built-ins can read it while
/// external commands still inherit the real descriptor.
pub struct InheritedStdin<'a>(std::io::StdinLock<'a>);

impl InheritedStdin<'static> {
    pub fn new() -> Self {
        InheritedStdin(std::io::stdin().lock())
    }
}

impl Read for InheritedStdin<'_> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.0.read(buf)
    }
}

impl crate::command::Stdin for InheritedStdin<'_> {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_reader_yields_its_buffer() {
        let mut reader = MemReader::new(b"abc".to_vec());
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn mem_writer_collects_through_handle() {
        let (mut writer, handle) = MemWriter::with_handle();
        writer.write_all(b"one ").unwrap();
        writer.write_all(b"two").unwrap();
        drop(writer);
        assert_eq!(&*handle.borrow(), b"one two");
    }
}
