//! Authentication contexts and the context store.

pub mod context;
pub mod jwt;
pub mod store;
pub mod whoami;

pub use context::{Context, ContextType, SerializedContext, DEFAULT_CONTEXT_NAME};
pub use store::{ConfigFile, ContextStore};
pub use whoami::{current_account, AccountInfo};
