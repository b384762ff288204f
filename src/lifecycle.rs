//! Lifecycle (§4.6): wires the configuration mask, the three registry mappings, and
//! the sender into one owned context, and exposes the methods a host-side shim calls
//! into for every hook in §6's table. No free-standing globals (§9's design note):
//! everything lives in [`PluginContext`], constructed once by [`PluginContext::init`].

use std::sync::atomic::AtomicBool;

use crate::assembly::MemEventRecord;
use crate::config::{Config, FeatureFlags};
use crate::error::InitError;
use crate::event::Event;
use crate::host::{CallbackToken, HostApi};
use crate::registry::{Arena, PerVcpuSlots};
use crate::sender::Sender;
use crate::{logging, syscall, translate};

/// The three disjoint mappings from §3/§4.1, bundled together for convenience. Each
/// field is independently locked; `PluginContext` never acquires more than one at a
/// time.
#[derive(Default)]
pub(crate) struct Registries {
    pub(crate) insn_events: Arena<Event>,
    pub(crate) mem_events: Arena<MemEventRecord>,
    pub(crate) syscalls: PerVcpuSlots<Event>,
}

/// The single owned context threading through every hook invocation. Generic over
/// nothing: the host type only appears as a parameter to [`PluginContext::on_translate`],
/// since that is the only hook that needs to call back into the host (to register
/// further hooks, or to read the loaded image's code range).
pub struct PluginContext {
    flags: FeatureFlags,
    registries: Registries,
    sender: Sender,
    pub(crate) load_emitted: AtomicBool,
}

impl PluginContext {
    /// Step-by-step, this is §4.6's `init`: compute the configuration mask, stand up
    /// logging, allocate the registries (infallible in this implementation, since the
    /// arenas start empty), and connect the sender. A failure connecting the sender
    /// aborts the whole install.
    pub fn init(config: &Config) -> Result<Self, InitError> {
        logging::init(config)?;
        let sender = Sender::connect(&config.socket_path, None)?;
        Ok(PluginContext {
            flags: config.feature_mask(),
            registries: Registries::default(),
            sender,
            load_emitted: AtomicBool::new(false),
        })
    }

    pub fn flags(&self) -> FeatureFlags {
        self.flags
    }

    pub(crate) fn registries(&self) -> &Registries {
        &self.registries
    }

    pub(crate) fn sender(&self) -> &Sender {
        &self.sender
    }

    /// The host calls this once per translated block, before execution.
    pub fn on_translate<H: HostApi>(&self, host: &H, tb: &H::Tb) {
        translate::handle_translate(self, host, tb);
    }

    /// The host calls this every time a hooked instruction executes, with the token
    /// installed by [`PluginContext::on_translate`] as `token`.
    pub fn on_exec(&self, token: CallbackToken) {
        match token {
            CallbackToken::Insn(t) => translate::handle_insn_exec(self, t),
            CallbackToken::Mem(t) => translate::handle_mem_exec(self, t),
        }
    }

    /// The host calls this on every memory access matching a registered mask. A
    /// token tagged `Insn` here would be a host programming error (we never register
    /// a memory hook with one); it is logged and ignored rather than mishandled.
    pub fn on_mem_access(&self, token: CallbackToken, addr: u64, is_store: bool) {
        match token {
            CallbackToken::Mem(t) => translate::handle_mem_access(self, t, addr, is_store),
            CallbackToken::Insn(_) => {
                log::error!("on_mem_access called with a non-memory token; ignoring");
            }
        }
    }

    /// The host calls this when a guest syscall is entered.
    pub fn on_syscall_enter(&self, vcpu: u32, num: i64, args: [u64; 8]) {
        syscall::handle_enter(self, vcpu, num, args);
    }

    /// The host calls this when a guest syscall returns.
    pub fn on_syscall_return(&self, vcpu: u32, num: i64, ret: i64) {
        syscall::handle_return(self, vcpu, num, ret);
    }

    /// The host's atexit hook. Flushes the sender; any records still in the
    /// registries at this point are incomplete by definition and are leaked, since
    /// the process is exiting anyway (§4.6).
    pub fn on_exit(&self, _vcpu: u32) {
        self.sender.teardown();
    }
}
