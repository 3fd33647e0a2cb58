/// Hub coordinator: single-flight dispatch of out-of-process worker
/// operations and replay of their progress events onto the HUD store
/// (SPEC_FULL.md §4.8, C8).
pub mod dispatch;
pub mod lock;
pub mod worker;

pub use dispatch::{lock_key, run_swap, run_tx_monitor, SwapOutcome, TxMonitorOutcome};
pub use lock::{LockGuard, SingleFlightLock};
pub use worker::{
    apply_hub_event_to_state, dispatch_worker, request_file_path, tail_new_hub_events,
    write_detached_monitor_request, WorkerOutput, DEFAULT_WORKER_TIMEOUT,
};
