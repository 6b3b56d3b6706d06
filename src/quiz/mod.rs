pub mod catalog;
pub mod connection;
mod coordinator;
pub mod evaluator;
mod room;
mod session;
mod signaling;

pub use catalog::{JsonFileLoader, QuestionLoader, StaticLoader};
pub use connection::{ConnectionHub, ConnectionId, Transport};
pub use coordinator::QuizCoordinator;
pub use session::QuizPhase;
pub use signaling::{ClientMessage, QuizSignalingHandler, ServerMessage};
