//! User record types

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Internal record fields a directory attribute can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    /// `ldap.dn`
    DirectoryDn,
    /// `uid`
    Uid,
    /// `userinfo.name`
    DisplayName,
    /// `email`
    Email,
}

impl RecordField {
    /// Dotted record path of this field
    pub fn path(&self) -> &'static str {
        match self {
            RecordField::DirectoryDn => "ldap.dn",
            RecordField::Uid => "uid",
            RecordField::DisplayName => "userinfo.name",
            RecordField::Email => "email",
        }
    }
}

/// Directory attribute to record field mapping.
///
/// `dn` is not a real attribute; it stands for the entry's distinguished name.
pub const DIRECTORY_ATTRIBUTE_MAP: &[(&str, RecordField)] = &[
    ("dn", RecordField::DirectoryDn),
    ("uid", RecordField::Uid),
    ("cn", RecordField::DisplayName),
    ("mail", RecordField::Email),
];

/// Directory attribute that populates the given record path, if any
pub fn directory_attribute_for(path: &str) -> Option<&'static str> {
    DIRECTORY_ATTRIBUTE_MAP
        .iter()
        .find(|(_, field)| field.path() == path)
        .map(|(attr, _)| *attr)
}

/// A user's identity record.
///
/// Known fields are typed; anything else in a record file is kept in
/// `extra` so attribute lookups can reach it by path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub uid: String,

    #[serde(
        default,
        deserialize_with = "first_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "UserInfo::is_empty")]
    pub userinfo: UserInfo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    ldap: Option<DirectoryBinding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordData>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(
        default,
        deserialize_with = "first_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UserInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.extra.is_empty()
    }
}

/// Directory binding of a record (`ldap.*`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,

    /// Password must be checked by binding to the directory
    #[serde(default)]
    pub auth: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Locally stored password hash (`password.password`, PHC string format)
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordData {
    pub password: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl fmt::Debug for PasswordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordData")
            .field("password", &"<redacted>")
            .finish()
    }
}

impl UserRecord {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Default::default()
        }
    }

    /// Typed view of a parsed record file; the uid always comes from `uid`.
    ///
    /// Multi-valued `email` or `userinfo.name` keep their first value here.
    /// Attribute lookups that need every value read the document itself
    /// through [`value_at_path`].
    pub fn from_document(uid: &str, document: Value) -> Result<Self, serde_yaml::Error> {
        let document = match document {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        };
        let mut record: UserRecord = serde_yaml::from_value(document)?;
        record.uid = uid.to_string();
        Ok(record)
    }

    /// Build a record from a directory entry through `DIRECTORY_ATTRIBUTE_MAP`.
    ///
    /// Unmapped attributes are dropped, multi-valued attributes keep their
    /// first value, and the directory-auth flag is always set.
    pub fn from_directory_entry(
        dn: &str,
        attrs: &HashMap<String, Vec<String>>,
    ) -> crate::Result<Self> {
        if dn.trim().is_empty() {
            return Err(crate::Error::InvalidArgument(
                "directory entry has an empty distinguished name".into(),
            ));
        }

        let mut record = UserRecord::default();
        let mut binding = DirectoryBinding {
            auth: true,
            ..Default::default()
        };

        for (attr, field) in DIRECTORY_ATTRIBUTE_MAP {
            let value = if *attr == "dn" {
                Some(dn.to_string())
            } else {
                attrs.get(*attr).and_then(|v| v.first()).cloned()
            };

            let Some(value) = value else { continue };

            match field {
                RecordField::DirectoryDn => binding.dn = Some(value),
                RecordField::Uid => record.uid = value,
                RecordField::DisplayName => record.userinfo.name = Some(value),
                RecordField::Email => record.email = Some(value),
            }
        }

        record.ldap = Some(binding);
        Ok(record)
    }

    /// Whether this account's password is verified against the directory
    pub fn is_directory_authenticated(&self) -> bool {
        self.ldap.as_ref().map(|l| l.auth).unwrap_or(false)
    }

    /// Distinguished name recorded for this account, if any
    pub fn directory_dn(&self) -> Option<&str> {
        self.ldap.as_ref().and_then(|l| l.dn.as_deref())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.userinfo.name.as_deref()
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.password.as_str())
    }

    /// Read a value by dotted path, e.g. `userinfo.name` or `roles`
    pub fn path_get(&self, path: &str) -> Option<Value> {
        let root = serde_yaml::to_value(self).ok()?;
        value_at_path(&root, path).cloned()
    }

    /// Whether a value exists at the dotted path
    pub fn path_exists(&self, path: &str) -> bool {
        self.path_get(path).is_some()
    }

    /// Record as a YAML value with secret paths and the password hash removed
    pub fn redacted(&self) -> Value {
        let mut value = serde_yaml::to_value(self).unwrap_or(Value::Mapping(Mapping::new()));

        for path in crate::SECRET_USER_PATHS.iter().chain(std::iter::once(&"password")) {
            remove_path(&mut value, path);
        }

        prune_empty(&mut value);
        value
    }
}

/// Walk a dotted path through nested mappings
pub fn value_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_mapping()?.get(segment)?;
    }
    Some(current)
}

/// Scalar rendered as a string; blank strings count as absent
pub fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };

    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn first_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Sequence(items) => items.iter().find_map(scalar_string),
        other => scalar_string(other),
    })
}

fn remove_path(value: &mut Value, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = value;
    for segment in parents {
        match current.as_mapping_mut().and_then(|m| m.get_mut(*segment)) {
            Some(next) => current = next,
            None => return,
        }
    }

    if let Some(mapping) = current.as_mapping_mut() {
        mapping.remove(*last);
    }
}

/// Drop mappings left empty by redaction, e.g. `ldap: {}`
fn prune_empty(value: &mut Value) {
    if let Some(mapping) = value.as_mapping_mut() {
        let empty: Vec<Value> = mapping
            .iter()
            .filter(|(_, v)| v.as_mapping().map(|m| m.is_empty()).unwrap_or(false))
            .map(|(k, _)| k.clone())
            .collect();

        for key in empty {
            mapping.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_attrs() -> HashMap<String, Vec<String>> {
        let mut attrs = HashMap::new();
        attrs.insert("uid".to_string(), vec!["alice".to_string()]);
        attrs.insert("cn".to_string(), vec!["Alice Liddell".to_string()]);
        attrs.insert(
            "mail".to_string(),
            vec!["alice@example.org".to_string(), "al@example.org".to_string()],
        );
        attrs.insert("telephoneNumber".to_string(), vec!["555-0100".to_string()]);
        attrs
    }

    #[test]
    fn test_from_directory_entry_maps_fixed_attributes() {
        let dn = "uid=alice,ou=people,dc=example,dc=org";
        let record = UserRecord::from_directory_entry(dn, &entry_attrs()).unwrap();

        assert_eq!(record.uid, "alice");
        assert_eq!(record.email.as_deref(), Some("alice@example.org"));
        assert_eq!(record.display_name(), Some("Alice Liddell"));
        assert_eq!(record.directory_dn(), Some("uid=alice,ou=people,dc=example,dc=org"));
        assert!(record.is_directory_authenticated());
        assert!(record.extra.is_empty());
        assert!(record.path_get("telephoneNumber").is_none());
    }

    #[test]
    fn test_from_directory_entry_rejects_empty_dn() {
        let err = UserRecord::from_directory_entry("  ", &entry_attrs()).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidArgument(_)));
    }

    #[test]
    fn test_directory_attribute_reverse_lookup() {
        assert_eq!(directory_attribute_for("email"), Some("mail"));
        assert_eq!(directory_attribute_for("userinfo.name"), Some("cn"));
        assert_eq!(directory_attribute_for("uid"), Some("uid"));
        assert_eq!(directory_attribute_for("roles"), None);
    }

    #[test]
    fn test_deserialize_record_file() {
        let yaml = r#"
email: alice@example.org
userinfo:
  name: Alice
  locale: en
roles:
  - admin
  - billing
ldap:
  auth: false
password:
  password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA"
"#;
        let record: UserRecord = serde_yaml::from_str(yaml).unwrap();

        assert!(!record.is_directory_authenticated());
        assert!(record.path_exists("ldap.auth"));
        assert_eq!(
            record.path_get("userinfo.locale"),
            Some(Value::String("en".into()))
        );
        let roles = record.path_get("roles").unwrap();
        assert_eq!(roles.as_sequence().map(|s| s.len()), Some(2));
        assert!(record.password_hash().unwrap().starts_with("$argon2id$"));
    }

    #[test]
    fn test_missing_flag_means_local_authentication() {
        let record: UserRecord = serde_yaml::from_str("email: bob@example.org\n").unwrap();
        assert!(!record.is_directory_authenticated());
        assert!(!record.path_exists("ldap.auth"));
    }

    #[test]
    fn test_redacted_strips_secret_paths() {
        let yaml = r#"
uid: carol
ldap:
  auth: true
password:
  password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
"#;
        let record: UserRecord = serde_yaml::from_str(yaml).unwrap();
        let redacted = record.redacted();
        let mapping = redacted.as_mapping().unwrap();

        assert!(mapping.get("password").is_none());
        assert!(mapping.get("ldap").is_none());
        assert_eq!(mapping.get("uid"), Some(&Value::String("carol".into())));
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let data = PasswordData {
            password: "$argon2id$secret".to_string(),
            extra: BTreeMap::new(),
        };
        assert!(!format!("{:?}", data).contains("secret"));
    }

    #[test]
    fn test_multi_valued_typed_fields_keep_first_value() {
        let yaml = "email: [b1@example.org, b2@example.org]\nuserinfo:\n  name: [Bob]\n";
        let document: Value = serde_yaml::from_str(yaml).unwrap();

        let record = UserRecord::from_document("bob", document.clone()).unwrap();
        assert_eq!(record.uid, "bob");
        assert_eq!(record.email.as_deref(), Some("b1@example.org"));
        assert_eq!(record.display_name(), Some("Bob"));

        let emails = value_at_path(&document, "email").unwrap();
        assert_eq!(emails.as_sequence().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_unknown_subkeys_stay_reachable() {
        let yaml = r#"
ldap:
  auth: true
  server: primary
password:
  password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
  changed: 2024-01-01
"#;
        let document: Value = serde_yaml::from_str(yaml).unwrap();
        let record = UserRecord::from_document("dave", document).unwrap();

        assert_eq!(record.path_get("ldap.server"), Some(Value::String("primary".into())));
        assert!(record.path_exists("password.changed"));
        assert!(record.is_directory_authenticated());
    }

    #[test]
    fn test_empty_document_is_empty_record() {
        let record = UserRecord::from_document("erin", Value::Null).unwrap();
        assert_eq!(record, UserRecord::new("erin"));
    }
}
