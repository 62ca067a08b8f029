//! 分派层：意图分类、路由、应答器与每轮的分派图

pub mod graph;
pub mod intent;
pub mod prompts;
pub mod responders;
pub mod router;

pub use graph::{DispatchGraph, TurnOutcome};
pub use intent::{classification_output, Classifier, Intent};
pub use prompts::Prompts;
pub use responders::{DataQueryResponder, Responder, ResponderOutput, RoleResponder};
pub use router::{route, ResponderId};
