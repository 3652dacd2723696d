//! Polymorphic file/handle object with two-phase close.
//!
//! A `File` is one of a small closed set of kinds (terminal,
//! backing-store file, socket - the actual filesystem/network back-ends
//! are external collaborators, so this only models the handle),
//! refcounted via `Arc`, closed in two phases: `close1` lets the owning
//! driver flush/detach gracefully, `close2` unconditionally releases
//! kernel resources even if `close1` failed or the driver is gone.
//! `FileTable` is an fd-indexed `Vec<Option<Arc<File>>>`.

use alloc::sync::Arc;
use alloc::vec::Vec;
use alloc::vec;

use crate::lib::error::Errno;
use crate::sync::mutex::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Terminal,
    Regular,
    Socket,
    EventQueue,
}

pub trait FileObject: Send + Sync {
    fn kind(&self) -> FileKind;
    fn read(&self, buf: &mut [u8]) -> Result<usize, Errno>;
    fn write(&self, buf: &[u8]) -> Result<usize, Errno>;
    /// Graceful close: flush buffers, notify the backing driver. May
    /// legitimately fail (e.g. flush couldn't complete) without blocking
    /// fd reclamation - `close2` always follows regardless.
    fn close1(&self) -> Result<(), Errno> {
        Ok(())
    }
    /// Unconditional close: release any kernel-side resource. Must not
    /// fail in a way that leaks the fd slot.
    fn close2(&self);
}

pub struct File {
    pub kind: FileKind,
    inner: Arc<dyn FileObject>,
    closed: Mutex<bool>,
}

impl File {
    pub fn new(inner: Arc<dyn FileObject>) -> Arc<Self> {
        Arc::new(Self {
            kind: inner.kind(),
            inner,
            closed: Mutex::new(false),
        })
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Errno> {
        self.inner.read(buf)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize, Errno> {
        self.inner.write(buf)
    }

    /// Run both close phases; idempotent.
    pub fn close(&self) -> Result<(), Errno> {
        let mut closed = self.closed.lock();
        if *closed {
            return Ok(());
        }
        let r1 = self.inner.close1();
        self.inner.close2();
        *closed = true;
        r1
    }
}

impl Drop for File {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

pub struct FileTable {
    fds: Vec<Option<Arc<File>>>,
}

impl FileTable {
    pub fn new() -> Self {
        Self { fds: vec![None; 256] }
    }

    pub fn alloc_fd(&mut self, file: Arc<File>) -> Result<i32, Errno> {
        for (i, slot) in self.fds.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(file);
                return Ok(i as i32);
            }
        }
        Err(Errno::EMFILE)
    }

    pub fn get(&self, fd: i32) -> Result<Arc<File>, Errno> {
        if fd < 0 || fd as usize >= self.fds.len() {
            return Err(Errno::EBADF);
        }
        self.fds[fd as usize].clone().ok_or(Errno::EBADF)
    }

    pub fn close(&mut self, fd: i32) -> Result<(), Errno> {
        if fd < 0 || fd as usize >= self.fds.len() {
            return Err(Errno::EBADF);
        }
        let file = self.fds[fd as usize].take().ok_or(Errno::EBADF)?;
        file.close()
    }

    pub fn dup(&mut self, oldfd: i32) -> Result<i32, Errno> {
        let file = self.get(oldfd)?;
        self.alloc_fd(file)
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};

    struct MockFile(AtomicBool);
    impl FileObject for MockFile {
        fn kind(&self) -> FileKind {
            FileKind::Terminal
        }
        fn read(&self, _buf: &mut [u8]) -> Result<usize, Errno> {
            Ok(0)
        }
        fn write(&self, buf: &[u8]) -> Result<usize, Errno> {
            Ok(buf.len())
        }
        fn close2(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn two_phase_close_is_idempotent() {
        let closed = Arc::new(MockFile(AtomicBool::new(false)));
        let f = File::new(closed.clone());
        assert!(f.close().is_ok());
        assert!(closed.0.load(Ordering::SeqCst));
        assert!(f.close().is_ok());
    }

    #[test]
    fn fd_table_alloc_and_close() {
        let mut table = FileTable::new();
        let f = File::new(Arc::new(MockFile(AtomicBool::new(false))));
        let fd = table.alloc_fd(f).unwrap();
        assert!(table.get(fd).is_ok());
        table.close(fd).unwrap();
        assert!(table.get(fd).is_err());
    }
}
