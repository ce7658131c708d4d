//! Identity: who is calling and what they may do.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod authorizer;

pub use principal::{Role, Claims};
pub use session::{SessionToken, SessionManager, TokenError};
pub use authorizer::{Action, Scope, Decision, authorize};
