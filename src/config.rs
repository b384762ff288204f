//! The configuration surface (§6): a plain record carrying the feature flags, the
//! socket path and the logging target. Parsing a `Config` out of a command line or a
//! config file is the embedding harness's job; this crate only consumes the record.

use std::path::PathBuf;

use bitflags::bitflags;

bitflags! {
    /// Static configuration mask: which fragments of instrumentation the user asked
    /// for. Computed once in [`Config::feature_mask`] and never mutated afterward.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureFlags: u8 {
        const PC        = 0b0000_0001;
        /// Reads and writes are fused into one bit: the source only distinguishes
        /// them per-event via `MemAccess::is_write`, not via separate feature bits.
        const MEM       = 0b0000_0010;
        const INSTRS    = 0b0000_0100;
        const SYSCALLS  = 0b0000_1000;
        const BRANCHES  = 0b0001_0000;
    }
}

impl FeatureFlags {
    /// True when only `BRANCHES` is requested: the translation handler special-cases
    /// this to emit a single record for the block terminator instead of walking every
    /// instruction.
    pub fn branches_only(self) -> bool {
        self.contains(FeatureFlags::BRANCHES)
            && !self.intersects(FeatureFlags::PC | FeatureFlags::MEM | FeatureFlags::INSTRS)
    }

    /// True when no per-instruction feature at all is configured (branches, PC,
    /// memory, or instruction bytes); the translation handler then registers nothing.
    pub fn no_insn_features(self) -> bool {
        !self.intersects(
            FeatureFlags::PC | FeatureFlags::MEM | FeatureFlags::INSTRS | FeatureFlags::BRANCHES,
        )
    }
}

/// The configuration record described in §6. Constructed by the embedding harness
/// (from CLI args, a config file, whatever it likes) and handed to [`crate::lifecycle::init`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Log file path, or `"-"` for stderr.
    pub log_file: String,
    /// 0 = error, 1 = warn, 2 = info, 3 = debug, 4 = trace.
    pub log_level: u8,
    pub socket_path: PathBuf,
    pub trace_pc: bool,
    pub trace_reads: bool,
    pub trace_writes: bool,
    pub trace_instrs: bool,
    pub trace_syscalls: bool,
    pub trace_branches: bool,
}

impl Config {
    /// Collapses the six booleans into the five-bit static configuration mask,
    /// ORing `trace_reads` and `trace_writes` into the single `MEM` bit.
    pub fn feature_mask(&self) -> FeatureFlags {
        let mut flags = FeatureFlags::empty();
        flags.set(FeatureFlags::PC, self.trace_pc);
        flags.set(FeatureFlags::MEM, self.trace_reads || self.trace_writes);
        flags.set(FeatureFlags::INSTRS, self.trace_instrs);
        flags.set(FeatureFlags::SYSCALLS, self.trace_syscalls);
        flags.set(FeatureFlags::BRANCHES, self.trace_branches);
        flags
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.log_level {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            3 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_writes_collapse_into_mem() {
        let cfg = Config {
            log_file: "-".into(),
            log_level: 2,
            socket_path: "/tmp/doesnotmatter.sock".into(),
            trace_pc: false,
            trace_reads: true,
            trace_writes: false,
            trace_instrs: false,
            trace_syscalls: false,
            trace_branches: false,
        };
        assert_eq!(cfg.feature_mask(), FeatureFlags::MEM);
    }

    #[test]
    fn branches_only_detection() {
        assert!(FeatureFlags::BRANCHES.branches_only());
        assert!(!(FeatureFlags::BRANCHES | FeatureFlags::PC).branches_only());
        assert!(FeatureFlags::empty().no_insn_features());
        // SYSCALLS alone carries no per-instruction feature; translation still
        // registers nothing even though the syscall handler is active.
        assert!(FeatureFlags::SYSCALLS.no_insn_features());
        assert!(!FeatureFlags::PC.no_insn_features());
    }
}
