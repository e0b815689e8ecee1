//! Playbook Engine, Action Executors, notification transports, and the
//! SOAR service loop (spec components 4.H, 4.I, 4.J).

pub mod actions;
pub mod engine;
pub mod notify;
pub mod playbook;
pub mod soar_service;

pub use actions::{
    ActionExecutor, ActionReceipt, BlockDomainExecutor, SendNotificationExecutor, SimulateOnlyExecutor,
    TagDeviceExecutor,
};
pub use engine::{PlaybookEngine, ResolvedAction, TriggeredPlaybook};
pub use notify::{ChatTransport, NotificationTransport, SmtpTransport, WebhookTransport};
pub use playbook::{
    is_yaml_path, parse_playbook_document, ConditionOperator, Playbook, PlaybookActionSpec, PlaybookCondition,
};
pub use soar_service::{SoarService, SoarServiceConfig, SoarTickStats, DEFAULT_QUERY_LIMIT, HIGH_WATER_MARK_BACKSTOP};
