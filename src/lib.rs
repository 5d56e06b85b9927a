pub mod calls;
pub mod config;
pub mod error;
pub mod http;
pub mod relay;
pub mod session;
pub mod speech;
pub mod store;
pub mod telephony;

pub use calls::{CallRegistry, CallRequest, CallService, PlacementError};
pub use config::Config;
pub use error::{RelayError, RelayResult};
pub use http::{create_router, AppState};
pub use relay::{CallRelay, RelayIo, RelaySink};
pub use session::{CallContext, CallSession, SessionSnapshot, TranscriptEntry, TranscriptRole};
pub use store::{CallKey, CallStatus, CallStore, JsonFileStore, MemoryStore};
pub use telephony::{CallLegStatus, TelephonyClient, TwilioClient};
