//! Credential verification for Keyward

pub mod ldap;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use ldap::{
    DirectoryConnection, DirectoryConnector, DirectoryEntry, Ldap3Connector, LdapConfig,
    LdapError, LdapStore, SearchFilter, SearchOutcome, SearchScope,
};
pub use verifier::{
    CredentialVerifier, Credentials, DirectoryVerifier, DispatchingVerifier,
    LocalPasswordVerifier, VerificationOutcome,
};
