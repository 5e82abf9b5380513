pub mod backoff;
pub mod error;
pub mod identity_store;
pub mod manager;
pub mod metrics;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod stages;
pub mod status_query;
pub mod translator;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use error::ClientError;
pub use identity_store::{FileIdentityStore, IdentityStore, MemoryIdentityStore, StoreError};
pub use manager::{ConnectionManager, ManagerOptions, WorkflowIntent};
pub use protocol::{InboundEvent, OutboundDirective, ProgressStatus, ProtocolError};
pub use reconcile::{reconcile, Reconciliation};
pub use session::{
    CommunicationEntry, ConnectionState, Notice, NoticeKind, Phase, SessionSnapshot,
    SessionState, Severity, StageBoard, StageState, StageStatus, Terminal, TerminalKind,
    WorkflowResult,
};
pub use status_query::{
    HttpStatusClient, RemoteStageStatus, RemoteStatus, StatusLookup, StatusQuery,
    StatusQueryError, WorkflowStatusReport,
};
pub use transport::{
    socket_url, Connection, ConnectionEvent, Transport, TransportError, TungsteniteTransport,
};
