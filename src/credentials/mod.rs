//! API credential resolution and persistence

mod local_store;
pub mod resolver;
pub mod store;

pub use local_store::SqliteCredentialStore;
pub use resolver::{Credential, KeyFormat, resolve_credential};
pub use store::{
    CredentialSource, CredentialStore, EnvSource, KeyStore, MemoryCredentialStore, ProcessEnv,
    StaticEnv,
};
