//! Line-oriented s-expression protocol for driving a recognition session.
//!
//! One message per line, one response per message:
//! - `sexp`: plist access and decoding of frames and catalogue tables
//! - `dispatch`: routing of decoded messages to the session and transcript
//! - `server`: the read/respond loop with size and encoding guards

pub mod dispatch;
pub mod server;
pub mod sexp;

pub use dispatch::{error_response, format_event, handle_message, AppState};
pub use server::{serve, ServeConfig, MAX_MESSAGE_SIZE};
pub use sexp::{parse_catalogue_table, DecodeError};
