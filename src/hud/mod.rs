/// HUD data model and snapshot store (SPEC_FULL.md §3, §4.5, C5).
pub mod snapshot;
pub mod store;

pub use snapshot::{
    fold_progress_steps, Alert, AlertLevel, ChangePct, CoinSnapshot, HealthSnapshot, HubEvent,
    HudSnapshot, PnlRow, ProgressStep, RecentEvent, ServiceSection, StatusCategory, StepState,
    SubscriptionKind, SupervisorState, TokenRow, TransactionRow, TxSide, TxSummary,
    TxSummaryStatus, WalletSpec, WalletState, WsSupervisorEntry, ALERTS_CAP, RECENT_EVENTS_CAP,
};
pub use store::{ChangeNotice, HudStore};
