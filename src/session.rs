//! Role session name derivation

/// Used when the local username cannot be determined.
pub const FALLBACK_NAME: &str = "Temp";

/// `--session-name` value meaning "derive from the local username".
pub const UNSET: &str = "notset";

const SESSION_SUFFIX: &str = "Session";

/// Sanitized local identity: the part after the last `\`, so that `DOMAIN\user` style Windows
/// accounts fit RoleSessionName's character set.
pub fn default_name(raw_identity: Option<&str>) -> String {
    let raw = match raw_identity {
        Some(v) if !v.is_empty() => v,
        _ => return FALLBACK_NAME.to_owned(),
    };
    match raw.rsplit('\\').next() {
        Some(tail) if !tail.is_empty() => tail.to_owned(),
        _ => FALLBACK_NAME.to_owned(),
    }
}

/// Use `explicit` unless it is empty or [`UNSET`], otherwise `<identity>Session`.
pub fn resolve(explicit: Option<&str>, identity: &dyn crate::identity::LocalIdentity) -> String {
    match explicit {
        Some(v) if !v.is_empty() && v != UNSET => v.to_owned(),
        _ => {
            let username = identity.username();
            format!("{}{SESSION_SUFFIX}", default_name(username.as_deref()))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn identity(username: Option<&str>) -> crate::identity::StaticIdentity {
        crate::identity::StaticIdentity {
            username: username.map(|v| v.to_owned()),
            home_dir: None,
        }
    }

    #[test]
    fn test_default_name_plain() {
        assert_eq!(default_name(Some("jdoe")), "jdoe");
    }

    #[test]
    fn test_default_name_domain() {
        assert_eq!(default_name(Some("CORP\\jdoe")), "jdoe");
        assert_eq!(default_name(Some("A\\B\\jdoe")), "jdoe");
    }

    #[test]
    fn test_default_name_fallback() {
        assert_eq!(default_name(None), "Temp");
        assert_eq!(default_name(Some("")), "Temp");
        assert_eq!(default_name(Some("CORP\\")), "Temp");
    }

    #[test]
    fn test_resolve_explicit() {
        assert_eq!(resolve(Some("ci-run"), &identity(Some("jdoe"))), "ci-run");
    }

    #[test]
    fn test_resolve_derived() {
        assert_eq!(resolve(Some("notset"), &identity(Some("CORP\\jdoe"))), "jdoeSession");
        assert_eq!(resolve(Some(""), &identity(Some("jdoe"))), "jdoeSession");
        assert_eq!(resolve(None, &identity(None)), "TempSession");
    }
}
