//! The batched sender (§4.5): serializes completed events into the wire format from
//! §6 and writes them to a connected Unix stream socket in batches, to keep the
//! number of `write(2)` calls (and therefore syscalls on the hot vCPU-thread path)
//! proportional to `batch_size` rather than to the event count.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{LittleEndian, WriteBytesExt};
use parking_lot::Mutex;

use crate::config::FeatureFlags;
use crate::error::InitError;
use crate::event::{Event, MAX_OPCODE_LEN};

const TAG_PC: u8 = 0;
const TAG_INSTR: u8 = 1;
const TAG_MEM_ACCESS: u8 = 2;
const TAG_SYSCALL: u8 = 3;
const TAG_LOAD: u8 = 4;
const TAG_TERMINATOR: u8 = 0xFF;

const DEFAULT_BATCH_SIZE: usize = 64;

struct SenderInner {
    stream: UnixStream,
    buffer: Vec<u8>,
    pending: usize,
    batch_size: usize,
}

/// The batched, length-prefixed writer described in §4.5/§6. `submit` is safe to call
/// concurrently from many vCPU threads; a single `parking_lot::Mutex` serializes
/// access to the buffer and the socket.
pub struct Sender {
    inner: Mutex<Option<SenderInner>>,
    warned_dead: AtomicBool,
}

impl Sender {
    /// Connects a Unix domain stream socket to `socket_path`. Fails the whole `init`
    /// if the connection cannot be established (§7: init-time, recoverable by
    /// aborting install).
    pub fn connect(socket_path: &Path, batch_size: Option<usize>) -> Result<Self, InitError> {
        let stream = UnixStream::connect(socket_path).map_err(|source| InitError::Sender {
            path: socket_path.to_path_buf(),
            source,
        })?;
        Ok(Sender {
            inner: Mutex::new(Some(SenderInner {
                stream,
                buffer: Vec::new(),
                pending: 0,
                batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            })),
            warned_dead: AtomicBool::new(false),
        })
    }

    /// Serializes `event` and appends it to the internal buffer, flushing once
    /// `batch_size` events have accumulated. A write failure latches the sender dead:
    /// every later `submit`/`teardown` becomes a no-op, logged exactly once on the
    /// transition (§4.5, §7).
    pub fn submit(&self, flags: FeatureFlags, event: &Event) {
        let mut guard = self.inner.lock();
        let Some(inner) = guard.as_mut() else {
            self.warn_once_dead();
            return;
        };

        encode_event(&mut inner.buffer, flags, event);
        inner.pending += 1;

        if inner.pending >= inner.batch_size {
            if flush_locked(inner).is_err() {
                *guard = None;
                self.warn_once_dead();
            }
        }
    }

    /// Flushes any residual buffered events, writes the terminator marker, and drops
    /// the socket. Idempotent: calling it on an already-dead or already-torn-down
    /// sender is a no-op.
    pub fn teardown(&self) {
        let mut guard = self.inner.lock();
        let Some(inner) = guard.as_mut() else {
            return;
        };

        let mut terminator = Vec::with_capacity(2);
        terminator.push(0u8);
        terminator.push(TAG_TERMINATOR);
        inner
            .buffer
            .write_u32::<LittleEndian>(terminator.len() as u32)
            .unwrap();
        inner.buffer.extend_from_slice(&terminator);

        let _ = flush_locked(inner);
        *guard = None;
    }

    fn warn_once_dead(&self) {
        if !self.warned_dead.swap(true, Ordering::Relaxed) {
            log::warn!("trace sender is dead; dropping subsequent events");
        }
    }
}

/// Appends one length-prefixed, self-describing record to `buffer`: a `u32` LE
/// length, then a feature-flag snapshot byte, a variant tag byte, and the variant's
/// fixed-width little-endian payload.
fn encode_event(buffer: &mut Vec<u8>, flags: FeatureFlags, event: &Event) {
    let mut record = Vec::new();
    record.push(flags.bits());
    match event {
        Event::Pc { pc, is_branch } => {
            record.push(TAG_PC);
            record.write_u64::<LittleEndian>(*pc).unwrap();
            record.push(*is_branch as u8);
        }
        Event::Instr {
            pc,
            opcode,
            opcode_size,
        } => {
            record.push(TAG_INSTR);
            record.write_u64::<LittleEndian>(*pc).unwrap();
            record.extend_from_slice(&opcode[..MAX_OPCODE_LEN]);
            record.push(*opcode_size as u8);
        }
        Event::MemAccess { pc, addr, is_write } => {
            record.push(TAG_MEM_ACCESS);
            record.write_u64::<LittleEndian>(*pc).unwrap();
            record.write_u64::<LittleEndian>(*addr).unwrap();
            record.push(*is_write as u8);
        }
        Event::Syscall { num, rv, args } => {
            record.push(TAG_SYSCALL);
            record.write_i64::<LittleEndian>(*num).unwrap();
            record.write_i64::<LittleEndian>(*rv).unwrap();
            for arg in args {
                record.write_u64::<LittleEndian>(*arg).unwrap();
            }
        }
        Event::Load {
            min,
            max,
            entry,
            prot,
        } => {
            record.push(TAG_LOAD);
            record.write_u64::<LittleEndian>(*min).unwrap();
            record.write_u64::<LittleEndian>(*max).unwrap();
            record.write_u64::<LittleEndian>(*entry).unwrap();
            record.push(*prot);
        }
    }
    buffer
        .write_u32::<LittleEndian>(record.len() as u32)
        .unwrap();
    buffer.extend_from_slice(&record);
}

fn flush_locked(inner: &mut SenderInner) -> std::io::Result<()> {
    if inner.buffer.is_empty() {
        return Ok(());
    }
    inner.stream.write_all(&inner.buffer)?;
    inner.stream.flush()?;
    inner.buffer.clear();
    inner.pending = 0;
    Ok(())
}

/// Path convenience re-export for callers constructing a [`Sender`] from a
/// `PathBuf`-typed config field.
pub fn connect(socket_path: &PathBuf, batch_size: Option<usize>) -> Result<Sender, InitError> {
    Sender::connect(socket_path.as_path(), batch_size)
}
