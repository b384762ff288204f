//! The host-emulator contract (§6), modeled as traits rather than FFI bindings to a
//! specific emulator. This is the one boundary where the real host differs most from
//! everything else in this crate: in production it is satisfied by a thin `extern
//! "C"` shim translating the embedding emulator's callback API into these trait
//! calls; in tests it is satisfied by a mock that drives [`crate::PluginContext`]
//! directly, with no emulator in the loop.

use bitflags::bitflags;

use crate::registry::EventToken;

/// The opaque user-data installed on a host callback. A single raw index would be
/// ambiguous: the same integer could name a live slot in either the per-instruction
/// arena or the memory-event arena, and the two need different handling on execution
/// (§4.3). Tagging the token with which mapping it names resolves that without a
/// second lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackToken {
    /// Names a record in the per-instruction mapping (`Pc` or `Instr`).
    Insn(EventToken),
    /// Names a record in the per-instruction memory mapping.
    Mem(EventToken),
}

bitflags! {
    /// Selects which memory-access directions a registered hook should fire for.
    /// This crate always registers both (reads and writes are fused into one
    /// feature), but the mask stays a real bitset because the host API it mirrors
    /// exposes read-only and write-only hooks too.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemRwMask: u8 {
        const READ  = 0b01;
        const WRITE = 0b10;
    }
}

/// One guest instruction inside a translated block.
pub trait Instruction {
    /// Guest virtual address of the instruction.
    fn vaddr(&self) -> u64;
    /// Length of the instruction's encoding, in bytes.
    fn size(&self) -> usize;
    /// Raw opcode bytes, `size()` long.
    fn data(&self) -> &[u8];
}

/// A translated block: a run of guest instructions the host compiled together.
pub trait TranslatedBlock {
    type Insn: Instruction;

    fn n_insns(&self) -> usize;
    fn insn(&self, i: usize) -> Self::Insn;
}

/// The host capabilities the translation handler calls into while processing one
/// translated block: registering hooks on individual instructions, and reading the
/// loaded image's code range for the one-shot [`crate::event::Event::Load`] record.
pub trait HostApi {
    type Tb: TranslatedBlock;

    /// Registers an execution hook on `insn`; the host is expected to call
    /// [`crate::PluginContext::on_exec`] with `token` every time `insn` executes.
    fn register_exec_cb(&self, insn: &<Self::Tb as TranslatedBlock>::Insn, token: CallbackToken);

    /// Registers a memory-access hook on `insn`; the host is expected to call
    /// [`crate::PluginContext::on_mem_access`] with `token` on every access matching
    /// `mask`.
    fn register_mem_cb(
        &self,
        insn: &<Self::Tb as TranslatedBlock>::Insn,
        token: CallbackToken,
        mask: MemRwMask,
    );

    /// Start of the loaded image's code range.
    fn start_code(&self) -> u64;
    /// End of the loaded image's code range.
    fn end_code(&self) -> u64;
    /// Entry point within the loaded image.
    fn entry_code(&self) -> u64;
}
