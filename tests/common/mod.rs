//! Shared test harness: a mock `HostApi` that drives `vcpu_trace::PluginContext`
//! end-to-end without any real emulator, and a tiny decoder for the wire format
//! captured off a real `UnixListener`, so these tests exercise the actual socket
//! path rather than stubbing it out.

use std::io::Read;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::Mutex;

use vcpu_trace::{CallbackToken, Config, HostApi, Instruction, MemRwMask, PluginContext, TranslatedBlock};

pub struct MockInsn {
    pub vaddr: u64,
    pub data: Vec<u8>,
}

impl Instruction for MockInsn {
    fn vaddr(&self) -> u64 {
        self.vaddr
    }
    fn size(&self) -> usize {
        self.data.len()
    }
    fn data(&self) -> &[u8] {
        &self.data
    }
}

pub struct MockTb {
    pub insns: Vec<MockInsn>,
}

impl TranslatedBlock for MockTb {
    type Insn = MockInsn;

    fn n_insns(&self) -> usize {
        self.insns.len()
    }

    fn insn(&self, i: usize) -> MockInsn {
        MockInsn {
            vaddr: self.insns[i].vaddr,
            data: self.insns[i].data.clone(),
        }
    }
}

/// Records every hook registration the crate makes during `on_translate`, in
/// order, so a test can play them back as if the corresponding instruction had
/// executed (or been accessed) without a real emulator in the loop.
#[derive(Default)]
pub struct MockHost {
    pub exec_tokens: Mutex<Vec<CallbackToken>>,
    pub mem_tokens: Mutex<Vec<(CallbackToken, MemRwMask)>>,
}

impl HostApi for MockHost {
    type Tb = MockTb;

    fn register_exec_cb(&self, _insn: &MockInsn, token: CallbackToken) {
        self.exec_tokens.lock().unwrap().push(token);
    }

    fn register_mem_cb(&self, _insn: &MockInsn, token: CallbackToken, mask: MemRwMask) {
        self.mem_tokens.lock().unwrap().push((token, mask));
    }

    fn start_code(&self) -> u64 {
        0x400000
    }
    fn end_code(&self) -> u64 {
        0x500000
    }
    fn entry_code(&self) -> u64 {
        0x400080
    }
}

pub fn test_config(socket_path: PathBuf, enable: impl FnOnce(&mut Config)) -> Config {
    let mut config = Config {
        log_file: "-".into(),
        log_level: 0,
        socket_path,
        trace_pc: false,
        trace_reads: false,
        trace_writes: false,
        trace_instrs: false,
        trace_syscalls: false,
        trace_branches: false,
    };
    enable(&mut config);
    config
}

/// Spins up a listener, initializes a `PluginContext` against it, and returns the
/// context plus a join handle that yields every byte written once the context is
/// torn down (the caller must call `ctx.on_exit(0)` before joining).
pub fn with_listener(enable: impl FnOnce(&mut Config)) -> (PluginContext, tempfile::TempDir, std::thread::JoinHandle<Vec<u8>>) {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("integration-test.sock");
    let listener = UnixListener::bind(&sock).unwrap();
    let handle = std::thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        conn.read_to_end(&mut buf).unwrap();
        buf
    });
    let ctx = PluginContext::init(&test_config(sock, enable)).unwrap();
    (ctx, dir, handle)
}

/// One decoded frame: the flags byte, the tag byte, and the raw payload bytes
/// after the tag (not re-parsed into an `Event`, since the wire format is
/// intentionally crate-internal; tests assert on tag + payload bytes directly).
pub struct Frame {
    pub flags: u8,
    pub tag: u8,
    pub payload: Vec<u8>,
}

pub fn decode_frames(mut bytes: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let len = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let record = &bytes[4..4 + len];
        let flags = record[0];
        let tag = record[1];
        let payload = record[2..].to_vec();
        frames.push(Frame { flags, tag, payload });
        bytes = &bytes[4 + len..];
    }
    frames
}

pub const TAG_PC: u8 = 0;
pub const TAG_INSTR: u8 = 1;
pub const TAG_MEM_ACCESS: u8 = 2;
pub const TAG_SYSCALL: u8 = 3;
pub const TAG_LOAD: u8 = 4;
pub const TAG_TERMINATOR: u8 = 0xFF;
