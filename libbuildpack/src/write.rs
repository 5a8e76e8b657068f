use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// Constructs a writer that writes to two other writers. Similar to the UNIX `tee` command.
pub(crate) fn tee<A: io::Write, B: io::Write>(a: A, b: B) -> TeeWrite<A, B> {
    TeeWrite {
        inner_a: a,
        inner_b: b,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TeeWrite<A: io::Write, B: io::Write> {
    inner_a: A,
    inner_b: B,
}

impl<A: io::Write, B: io::Write> io::Write for TeeWrite<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner_a.write_all(buf)?;
        self.inner_b.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner_a.flush()?;
        self.inner_b.flush()
    }
}

/// A byte buffer that several writers can append to, used to interleave stdout and stderr into
/// one combined output.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *guard)
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{tee, SharedBuffer};
    use std::io::Write;

    #[test]
    fn tee_writes_to_both() {
        let mut a = Vec::new();
        let mut b = Vec::new();

        tee(&mut a, &mut b).write_all(b"Collecting flask").unwrap();

        assert_eq!(a, b"Collecting flask");
        assert_eq!(b, b"Collecting flask");
    }

    #[test]
    fn shared_buffer_interleaves_writers() {
        let combined = SharedBuffer::default();
        let mut stdout = combined.clone();
        let mut stderr = combined.clone();

        stdout.write_all(b"out\n").unwrap();
        stderr.write_all(b"err\n").unwrap();
        stdout.write_all(b"out again\n").unwrap();

        assert_eq!(combined.into_bytes(), b"out\nerr\nout again\n");
    }
}
