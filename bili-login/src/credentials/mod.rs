//! Credential persistence.
//!
//! - [`CredentialStore`]: load/save abstraction
//! - [`JsonFileCredentialStore`]: single JSON file, replaced on every save
//! - [`MemoryCredentialStore`]: in-process store for embedding and tests

pub use bilibili_api::Credentials;
pub use bilibili_api::store::{
    CredentialStore, DEFAULT_COOKIE_FILE, JsonFileCredentialStore, MemoryCredentialStore,
    StoreError,
};
