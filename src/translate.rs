//! The translation handler (§4.3) and the execution/memory-access hook bodies that
//! the host invokes afterward (§4.2's per-instruction predicates live here, next to
//! the registrations that make them reachable).

use crate::config::FeatureFlags;
use crate::event::Event;
use crate::host::{CallbackToken, HostApi, Instruction, MemRwMask, TranslatedBlock};
use crate::lifecycle::PluginContext;
use crate::registry::EventToken;

/// Called once per translated block, before execution (§4.3). Emits the one-shot
/// `Load` event on the very first call, then walks the block's instructions
/// (just the terminator, in branch-only mode) allocating partial records and wiring
/// hooks for each configured feature.
pub fn handle_translate<H: HostApi>(ctx: &PluginContext, host: &H, tb: &H::Tb) {
    maybe_emit_load(ctx, host);

    let flags = ctx.flags();
    if flags.no_insn_features() {
        return;
    }

    let n_insns = tb.n_insns();
    if n_insns == 0 {
        return;
    }
    let start = if flags.branches_only() { n_insns - 1 } else { 0 };

    for i in start..n_insns {
        let insn = tb.insn(i);
        let pc = insn.vaddr();
        let is_branch = i == n_insns - 1;

        // `BRANCHES` independently produces a `Pc`-shaped record for the block's
        // terminator even when `PC` itself isn't configured; `PC` produces one for
        // every iterated instruction. The two conditions can both be true for the
        // same instruction (the terminator, with both flags set) without a double
        // insert, since this is a single `if`.
        if flags.contains(FeatureFlags::PC) || (is_branch && flags.contains(FeatureFlags::BRANCHES)) {
            let token = ctx
                .registries()
                .insn_events
                .insert(Event::Pc { pc, is_branch });
            host.register_exec_cb(&insn, CallbackToken::Insn(token));
        }

        if flags.contains(FeatureFlags::INSTRS) {
            let token = ctx
                .registries()
                .insn_events
                .insert(Event::new_instr(pc, insn.data()));
            host.register_exec_cb(&insn, CallbackToken::Insn(token));
        }

        if flags.contains(FeatureFlags::MEM) {
            let token = ctx
                .registries()
                .mem_events
                .insert(crate::assembly::MemEventRecord::new(pc));
            host.register_mem_cb(
                &insn,
                CallbackToken::Mem(token),
                MemRwMask::READ | MemRwMask::WRITE,
            );
            host.register_exec_cb(&insn, CallbackToken::Mem(token));
        }
    }
}

fn maybe_emit_load<H: HostApi>(ctx: &PluginContext, host: &H) {
    if ctx
        .load_emitted
        .compare_exchange(
            false,
            true,
            std::sync::atomic::Ordering::AcqRel,
            std::sync::atomic::Ordering::Acquire,
        )
        .is_err()
    {
        return;
    }

    // Matches the original source's own `newload` call site, which hardcodes the
    // loaded image's protection bits rather than reading them from the host.
    const LOAD_PROT: u8 = 0x7;

    let load = Event::Load {
        min: host.start_code(),
        max: host.end_code(),
        entry: host.entry_code(),
        prot: LOAD_PROT,
    };
    ctx.sender().submit(ctx.flags(), &load);
}

/// `on_exec` for a non-memory per-instruction record: the execution callback firing
/// is itself the completion signal, so this is an unconditional
/// lookup-submit-remove. A miss means the record was already submitted (e.g. a
/// second execution of the same translated block after the first already drained it)
/// and is silently ignored, per §4.2's tie-break.
pub fn handle_insn_exec(ctx: &PluginContext, token: EventToken) {
    if let Some(event) = ctx.registries().insn_events.update_and_maybe_take(token, |_| true) {
        ctx.sender().submit(ctx.flags(), &event);
    }
}

/// `on_exec` for a memory-bearing record: marks `exec_seen` and submits only if
/// `mem_seen` is already true.
pub fn handle_mem_exec(ctx: &PluginContext, token: EventToken) {
    let completed = ctx.registries().mem_events.update_and_maybe_take(token, |rec| {
        rec.exec_seen = true;
        rec.is_ready()
    });
    if let Some(record) = completed {
        ctx.sender().submit(ctx.flags(), &record.into_event());
    }
}

/// The memory-access hook: fills in `addr`/`is_write` and marks `mem_seen`, submitting
/// only if `exec_seen` is already true.
pub fn handle_mem_access(ctx: &PluginContext, token: EventToken, addr: u64, is_store: bool) {
    let completed = ctx.registries().mem_events.update_and_maybe_take(token, |rec| {
        rec.addr = addr;
        rec.is_write = is_store;
        rec.mem_seen = true;
        rec.is_ready()
    });
    if let Some(record) = completed {
        ctx.sender().submit(ctx.flags(), &record.into_event());
    }
}
