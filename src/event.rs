//! The tagged event record (§3). Exactly one variant is live per record; each
//! variant mirrors one row of the data-model table in the specification.

/// Opcode bytes are capped at 16; longer instructions are truncated (this matches
/// every guest ISA the host is expected to emulate, where the longest variable-length
/// encoding still fits in 16 bytes).
pub const MAX_OPCODE_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Pc {
        pc: u64,
        is_branch: bool,
    },
    Instr {
        pc: u64,
        opcode: [u8; MAX_OPCODE_LEN],
        opcode_size: usize,
    },
    MemAccess {
        pc: u64,
        addr: u64,
        is_write: bool,
    },
    Syscall {
        num: i64,
        rv: i64,
        args: [u64; 8],
    },
    Load {
        min: u64,
        max: u64,
        entry: u64,
        prot: u8,
    },
}

impl Event {
    pub fn new_instr(pc: u64, data: &[u8]) -> Self {
        let opcode_size = data.len().min(MAX_OPCODE_LEN);
        let mut opcode = [0u8; MAX_OPCODE_LEN];
        opcode[..opcode_size].copy_from_slice(&data[..opcode_size]);
        Event::Instr {
            pc,
            opcode,
            opcode_size,
        }
    }
}
