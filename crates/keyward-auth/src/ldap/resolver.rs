//! Login identifier resolution

/// Directory attribute a login identifier is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAttribute {
    Uid,
    Mail,
}

impl SearchAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchAttribute::Uid => "uid",
            SearchAttribute::Mail => "mail",
        }
    }
}

/// Pick the search attribute for a login identifier.
///
/// Anything containing `@` is looked up by `mail`, everything else by
/// `uid`. This does not validate the identifier as an address.
pub fn resolve_attribute(identifier: &str) -> SearchAttribute {
    if identifier.contains('@') {
        SearchAttribute::Mail
    } else {
        SearchAttribute::Uid
    }
}
