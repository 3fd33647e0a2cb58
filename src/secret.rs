/// Narrow secret-provider surface (SPEC_FULL.md §6, Non-goals).
///
/// The service never decrypts or holds a signing key: a wallet's
/// `key_source` is validated for shape only (so a malformed registry entry
/// fails fast at startup) and otherwise treated as opaque. Actual signing and
/// key custody are out of scope by the spec's Non-goals.
use crate::errors::{WarchestError, WarchestResult};

/// Recognized `key_source` shapes. The payload after the scheme is never
/// inspected further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySourceKind {
    Env,
    Keychain,
    DbEncrypted,
    PlaintextDev,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySource {
    pub kind: KeySourceKind,
    pub reference: String,
}

/// Parses a `key_source` string of the form `scheme:reference`
/// (`env:WALLET_ALPHA_KEY`, `keychain:wallet-master-key`,
/// `db_encrypted:alpha`, `plaintext_dev:...`).
pub fn parse_key_source(raw: &str) -> WarchestResult<KeySource> {
    let (scheme, reference) = raw.split_once(':').ok_or_else(|| {
        WarchestError::invalid_argument(format!("key_source {raw} missing scheme prefix"))
    })?;

    if reference.is_empty() {
        return Err(WarchestError::invalid_argument(format!(
            "key_source {raw} has an empty reference"
        )));
    }

    let kind = match scheme {
        "env" => KeySourceKind::Env,
        "keychain" => KeySourceKind::Keychain,
        "db_encrypted" => KeySourceKind::DbEncrypted,
        "plaintext_dev" => KeySourceKind::PlaintextDev,
        other => {
            return Err(WarchestError::invalid_argument(format!(
                "unrecognized key_source scheme {other}"
            )))
        }
    };

    Ok(KeySource {
        kind,
        reference: reference.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_recognized_scheme() {
        assert_eq!(parse_key_source("env:WALLET_A").unwrap().kind, KeySourceKind::Env);
        assert_eq!(
            parse_key_source("keychain:wallet-master-key").unwrap().kind,
            KeySourceKind::Keychain
        );
        assert_eq!(
            parse_key_source("db_encrypted:alpha").unwrap().kind,
            KeySourceKind::DbEncrypted
        );
        assert_eq!(
            parse_key_source("plaintext_dev:shh").unwrap().kind,
            KeySourceKind::PlaintextDev
        );
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = parse_key_source("ssh:foo").unwrap_err();
        assert_eq!(err.code(), "EINVAL");
    }

    #[test]
    fn rejects_missing_scheme() {
        let err = parse_key_source("WALLET_A").unwrap_err();
        assert_eq!(err.code(), "EINVAL");
    }

    #[test]
    fn rejects_empty_reference() {
        let err = parse_key_source("env:").unwrap_err();
        assert_eq!(err.code(), "EINVAL");
    }
}
