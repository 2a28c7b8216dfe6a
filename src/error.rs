use std::{ffi::NulError, fmt, result};

use tracing::debug;

pub use gpg_error::Error as NativeError;

pub type Result<T, E = Error> = result::Result<T, E>;

macro_rules! return_err {
    ($e:expr) => {
        match $crate::NativeError::new($e) {
            $crate::NativeError::NO_ERROR => (),
            err => return Err(err.into()),
        }
    };
}
pub(crate) use return_err;

/// A key the backend refused to use for an operation, together with the reason it gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidKey {
    pub fingerprint: Option<String>,
    pub reason: NativeError,
}

impl fmt::Display for InvalidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.fingerprint.as_deref().unwrap_or("[unknown key]"),
            self.reason
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecryptionFailure {
    NoSecretKey,
    BadPassphrase,
    MalformedData,
    /// The installed passphrase provider returned an error.
    PassphraseCallback,
    Other,
}

impl fmt::Display for DecryptionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoSecretKey => "no secret key",
            Self::BadPassphrase => "bad passphrase",
            Self::MalformedData => "malformed data",
            Self::PassphraseCallback => "passphrase callback failed",
            Self::Other => "decryption failed",
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SigningFailure {
    NoSecretKey,
    BadPassphrase,
    /// At least one signer key was rejected by the backend.
    UnusableSigner,
    /// The installed passphrase provider returned an error.
    PassphraseCallback,
    Other,
}

impl fmt::Display for SigningFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoSecretKey => "no secret key",
            Self::BadPassphrase => "bad passphrase",
            Self::UnusableSigner => "unusable signer",
            Self::PassphraseCallback => "passphrase callback failed",
            Self::Other => "signing failed",
        })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("gpgme backend unavailable: {0}")]
    BackendUnavailable(#[source] NativeError),

    #[error("no key matches '{0}'")]
    KeyNotFound(String),

    #[error("more than one key matches '{0}'")]
    AmbiguousKey(String),

    #[error("{} recipient(s) cannot be used for encryption", .recipients.len())]
    InvalidRecipients { recipients: Vec<InvalidKey> },

    #[error("recipient keys are not trusted: {source}")]
    Trust {
        recipients: Vec<InvalidKey>,
        #[source]
        source: NativeError,
    },

    #[error("{reason}: {source}")]
    Decryption {
        reason: DecryptionFailure,
        #[source]
        source: NativeError,
    },

    #[error("{reason}: {source}")]
    Signing {
        reason: SigningFailure,
        invalid_signers: Vec<InvalidKey>,
        #[source]
        source: NativeError,
    },

    #[error(transparent)]
    Backend(#[from] NativeError),
}

/// Field-less mirror of [`Error`] for matching.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    BackendUnavailable,
    KeyNotFound,
    AmbiguousKey,
    InvalidRecipients,
    Trust,
    Decryption(DecryptionFailure),
    Signing(SigningFailure),
    Backend,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Error::KeyNotFound(_) => ErrorKind::KeyNotFound,
            Error::AmbiguousKey(_) => ErrorKind::AmbiguousKey,
            Error::InvalidRecipients { .. } => ErrorKind::InvalidRecipients,
            Error::Trust { .. } => ErrorKind::Trust,
            Error::Decryption { reason, .. } => ErrorKind::Decryption(*reason),
            Error::Signing { reason, .. } => ErrorKind::Signing(*reason),
            Error::Backend(_) => ErrorKind::Backend,
        }
    }

    /// Returns the native error code behind this error, if there is one.
    ///
    /// Lookup failures and recipients rejected before reaching the backend carry no code.
    pub fn native(&self) -> Option<NativeError> {
        match self {
            Error::BackendUnavailable(err) | Error::Backend(err) => Some(*err),
            Error::Trust { source, .. }
            | Error::Decryption { source, .. }
            | Error::Signing { source, .. } => Some(*source),
            Error::KeyNotFound(_) | Error::AmbiguousKey(_) | Error::InvalidRecipients { .. } => {
                None
            }
        }
    }
}

impl From<NulError> for Error {
    fn from(_: NulError) -> Error {
        Error::Backend(NativeError::INV_VALUE)
    }
}

impl<T> From<cstr_argument::NulError<T>> for Error {
    fn from(_: cstr_argument::NulError<T>) -> Error {
        Error::Backend(NativeError::INV_VALUE)
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        match err {
            Error::Backend(err) => err.into(),
            other => std::io::Error::other(other),
        }
    }
}

#[inline]
fn is(err: NativeError, code: NativeError) -> bool {
    err.code() == code.code()
}

pub(crate) fn unavailable(err: NativeError) -> Error {
    debug!(error = %err, "gpgme backend unavailable");
    Error::BackendUnavailable(err)
}

pub(crate) fn key_lookup(err: NativeError, pattern: &str) -> Error {
    if is(err, NativeError::EOF) || is(err, NativeError::NOT_FOUND) {
        Error::KeyNotFound(pattern.to_owned())
    } else if is(err, NativeError::AMBIGUOUS_NAME) {
        Error::AmbiguousKey(pattern.to_owned())
    } else {
        Error::Backend(err)
    }
}

pub(crate) fn encryption(err: NativeError, always_trust: bool, invalid: Vec<InvalidKey>) -> Error {
    let untrusted = is(err, NativeError::PUBKEY_NOT_TRUSTED)
        || invalid
            .iter()
            .any(|k| is(k.reason, NativeError::PUBKEY_NOT_TRUSTED));
    let error = if untrusted && !always_trust {
        Error::Trust {
            recipients: invalid,
            source: err,
        }
    } else if !invalid.is_empty() || is(err, NativeError::UNUSABLE_PUBKEY) {
        Error::InvalidRecipients {
            recipients: invalid,
        }
    } else {
        Error::Backend(err)
    };
    debug!(error = %err, kind = ?error.kind(), "encryption failed");
    error
}

/// `callback` is the error raised by the passphrase provider during the operation, if any.
/// `recipients` is the failure reported through the recipient list of the decryption result,
/// which some backends give instead of a specific `err`.
pub(crate) fn decryption(
    err: NativeError, callback: Option<NativeError>, recipients: Option<NativeError>,
) -> Error {
    let reported = |code| is(err, code) || recipients.is_some_and(|r| is(r, code));
    let (reason, source) = if let Some(source) = callback {
        (DecryptionFailure::PassphraseCallback, source)
    } else if reported(NativeError::NO_SECKEY) {
        (DecryptionFailure::NoSecretKey, err)
    } else if reported(NativeError::BAD_PASSPHRASE) {
        (DecryptionFailure::BadPassphrase, err)
    } else if is(err, NativeError::NO_DATA)
        || is(err, NativeError::BAD_DATA)
        || is(err, NativeError::INV_DATA)
        || is(err, NativeError::INV_PACKET)
        || is(err, NativeError::INV_ARMOR)
    {
        (DecryptionFailure::MalformedData, err)
    } else if is(err, NativeError::DECRYPT_FAILED) || is(err, NativeError::UNSUPPORTED_ALGORITHM) {
        (DecryptionFailure::Other, err)
    } else {
        debug!(error = %err, "decryption failed in backend");
        return Error::Backend(err);
    };
    debug!(error = %source, ?reason, "decryption failed");
    Error::Decryption { reason, source }
}

/// Codes that only a signing step produces, used to attribute failures of combined
/// sign-and-encrypt operations.
pub(crate) fn is_signing_code(err: NativeError) -> bool {
    is(err, NativeError::BAD_PASSPHRASE)
        || is(err, NativeError::NO_SECKEY)
        || is(err, NativeError::UNUSABLE_SECKEY)
}

pub(crate) fn signing(
    err: NativeError, callback: Option<NativeError>, invalid_signers: Vec<InvalidKey>,
) -> Error {
    let (reason, source) = if let Some(source) = callback {
        (SigningFailure::PassphraseCallback, source)
    } else if is(err, NativeError::BAD_PASSPHRASE) {
        (SigningFailure::BadPassphrase, err)
    } else if is(err, NativeError::NO_SECKEY) {
        (SigningFailure::NoSecretKey, err)
    } else if !invalid_signers.is_empty() || is(err, NativeError::UNUSABLE_SECKEY) {
        (SigningFailure::UnusableSigner, err)
    } else if is(err, NativeError::GENERAL) || is(err, NativeError::CANCELED) {
        (SigningFailure::Other, err)
    } else {
        debug!(error = %err, "signing failed in backend");
        return Error::Backend(err);
    };
    debug!(error = %source, ?reason, "signing failed");
    Error::Signing {
        reason,
        invalid_signers,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(reason: NativeError) -> InvalidKey {
        InvalidKey {
            fingerprint: Some("A0FF4590BB6122EDEF6E3C542D727CC768697734".into()),
            reason,
        }
    }

    #[test]
    fn lookup_misses_are_key_not_found() {
        let err = key_lookup(NativeError::EOF, "DEADBEEF");
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);
        assert!(err.native().is_none());
        assert_eq!(err.to_string(), "no key matches 'DEADBEEF'");

        assert_eq!(key_lookup(NativeError::NOT_FOUND, "x").kind(), ErrorKind::KeyNotFound);
        assert_eq!(key_lookup(NativeError::AMBIGUOUS_NAME, "x").kind(), ErrorKind::AmbiguousKey);
        assert_eq!(key_lookup(NativeError::INV_ENGINE, "x").kind(), ErrorKind::Backend);
    }

    #[test]
    fn untrusted_recipients_need_always_trust() {
        let invalid = vec![rejected(NativeError::PUBKEY_NOT_TRUSTED)];
        let err = encryption(NativeError::UNUSABLE_PUBKEY, false, invalid.clone());
        assert_eq!(err.kind(), ErrorKind::Trust);
        assert_eq!(err.native(), Some(NativeError::UNUSABLE_PUBKEY));

        let err = encryption(NativeError::UNUSABLE_PUBKEY, true, invalid);
        assert_eq!(err.kind(), ErrorKind::InvalidRecipients);
    }

    #[test]
    fn other_recipient_rejections_are_invalid_recipients() {
        let err = encryption(
            NativeError::UNUSABLE_PUBKEY,
            false,
            vec![rejected(NativeError::KEY_EXPIRED)],
        );
        match err {
            Error::InvalidRecipients { recipients } => {
                assert_eq!(recipients.len(), 1);
                assert!(recipients[0].reason.code() == NativeError::KEY_EXPIRED.code());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            encryption(NativeError::INV_ENGINE, false, Vec::new()).kind(),
            ErrorKind::Backend
        );
    }

    #[test]
    fn decryption_failures_are_classified() {
        let kind = |err, cb, recipients| decryption(err, cb, recipients).kind();
        assert_eq!(
            kind(NativeError::NO_SECKEY, None, None),
            ErrorKind::Decryption(DecryptionFailure::NoSecretKey)
        );
        assert_eq!(
            kind(NativeError::DECRYPT_FAILED, None, Some(NativeError::NO_SECKEY)),
            ErrorKind::Decryption(DecryptionFailure::NoSecretKey)
        );
        assert_eq!(
            kind(NativeError::BAD_PASSPHRASE, None, None),
            ErrorKind::Decryption(DecryptionFailure::BadPassphrase)
        );
        assert_eq!(
            kind(NativeError::DECRYPT_FAILED, None, Some(NativeError::BAD_PASSPHRASE)),
            ErrorKind::Decryption(DecryptionFailure::BadPassphrase)
        );
        assert_eq!(
            kind(NativeError::NO_DATA, None, None),
            ErrorKind::Decryption(DecryptionFailure::MalformedData)
        );
        assert_eq!(
            kind(NativeError::DECRYPT_FAILED, None, None),
            ErrorKind::Decryption(DecryptionFailure::Other)
        );
        assert_eq!(kind(NativeError::INV_ENGINE, None, None), ErrorKind::Backend);
    }

    #[test]
    fn callback_errors_are_not_swallowed() {
        let err = decryption(NativeError::GENERAL, Some(NativeError::CANCELED), None);
        assert_eq!(err.kind(), ErrorKind::Decryption(DecryptionFailure::PassphraseCallback));
        assert_eq!(err.native(), Some(NativeError::CANCELED));

        let err = signing(NativeError::GENERAL, Some(NativeError::NO_PASSPHRASE), Vec::new());
        assert_eq!(err.kind(), ErrorKind::Signing(SigningFailure::PassphraseCallback));
        assert_eq!(err.native(), Some(NativeError::NO_PASSPHRASE));
    }

    #[test]
    fn signing_failures_are_classified() {
        assert_eq!(
            signing(NativeError::UNUSABLE_SECKEY, None, vec![rejected(NativeError::UNUSABLE_SECKEY)])
                .kind(),
            ErrorKind::Signing(SigningFailure::UnusableSigner)
        );
        assert_eq!(
            signing(NativeError::BAD_PASSPHRASE, None, Vec::new()).kind(),
            ErrorKind::Signing(SigningFailure::BadPassphrase)
        );
        assert_eq!(
            signing(NativeError::NO_SECKEY, None, Vec::new()).kind(),
            ErrorKind::Signing(SigningFailure::NoSecretKey)
        );
        assert_eq!(signing(NativeError::INV_ENGINE, None, Vec::new()).kind(), ErrorKind::Backend);
    }

    #[test]
    fn interior_nul_is_an_invalid_value() {
        let err = Error::from(std::ffi::CString::new("a\0b").unwrap_err());
        assert_eq!(err.native(), Some(NativeError::INV_VALUE));
    }
}
