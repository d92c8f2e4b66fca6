//! Binary wire codec for the drive protocol: little-endian request/response
//! framing, the control-word and motion-command/realtime-config payloads
//! that ride inside a request, and the fixed-order response fields.

pub mod control_word;
pub mod motion_command;
pub mod parameter;
pub mod realtime_config;
pub mod request;
pub mod response;
pub mod state_var;
pub mod warn_word;

pub use control_word::ControlWord;
pub use motion_command::MotionCommand;
pub use parameter::{CommandParameter, ParamType};
pub use realtime_config::{RealtimeConfig, RealtimeConfigResponse};
pub use request::{Request, RequestDescriptor, ResponseDescriptor};
pub use response::{decode as decode_response, TranslatedResponse};
pub use state_var::{MainState, StateVar};
pub use warn_word::WarningEntry;
