//! The syscall handler (§4.4): pairs enter/return notifications per vCPU, using the
//! per-vCPU slot mapping from the registry.

use crate::error::RuntimeError;
use crate::event::Event;
use crate::lifecycle::PluginContext;
use crate::registry::VcpuTakeOutcome;

/// Allocates a record, copies `args`, and installs it for `vcpu`, evicting (and
/// discarding, per invariant 6) any prior entry that never got a matching return.
pub fn handle_enter(ctx: &PluginContext, vcpu: u32, num: i64, args: [u64; 8]) {
    let event = Event::Syscall {
        num,
        rv: -1,
        args,
    };
    if ctx.registries().syscalls.replace(vcpu, event).is_some() {
        log::warn!(
            "vcpu {vcpu}: syscall enter without a matching return for the previous entry; discarding stale entry"
        );
    }
}

/// Looks up the per-vCPU slot, verifies `num` matches the enter, sets `rv`, and
/// submits. A mismatch (or no recorded enter at all) is logged and dropped without
/// synthesizing an event (§4.2's tie-break).
pub fn handle_return(ctx: &PluginContext, vcpu: u32, num: i64, ret: i64) {
    let outcome = ctx
        .registries()
        .syscalls
        .take_matching(vcpu, |event| matches!(event, Event::Syscall { num: n, .. } if *n == num));

    match outcome {
        VcpuTakeOutcome::Matched(Event::Syscall { num, args, .. }) => {
            let event = Event::Syscall {
                num,
                rv: ret,
                args,
            };
            ctx.sender().submit(ctx.flags(), &event);
        }
        VcpuTakeOutcome::Matched(_) => unreachable!("syscall slot only ever holds Event::Syscall"),
        VcpuTakeOutcome::Mismatched(Event::Syscall { num: enter_num, .. }) => {
            log::warn!(
                "{}",
                RuntimeError::SyscallNumMismatch {
                    vcpu,
                    expected: enter_num,
                    got: num,
                }
            );
        }
        VcpuTakeOutcome::Mismatched(_) => unreachable!("syscall slot only ever holds Event::Syscall"),
        VcpuTakeOutcome::Empty => {
            log::warn!("{}", RuntimeError::SyscallReturnWithoutEnter { vcpu });
        }
    }
}
