//! Chat sessions: message model, log, per-session runtime, and transport.

pub mod log;
pub mod model;
pub mod registry;
pub mod session;
pub mod ws;

pub use log::MessageLog;
pub use model::{Author, Button, Card, Message, SessionEvent};
pub use registry::SessionRegistry;
pub use session::ChatSession;
