#![allow(trivial_numeric_casts)]
use std::{
    ffi::CStr,
    fmt,
    marker::PhantomData,
    ptr,
    str::Utf8Error,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use ffi;

use crate::{
    error::{return_err, InvalidKey},
    notation::SignatureNotations,
    Context, HashAlgorithm, ImportFlags, Key, KeyAlgorithm, NativeError, NonNull, Result,
    SignMode, SignatureSummary, Validity,
};

/// A result object that GPGME attaches to a context once an operation finishes.
///
/// # Safety
///
/// `from_context` must take a new reference on the object it returns.
pub(crate) unsafe trait OpResult: Clone {
    fn from_context(ctx: &Context) -> Option<Self>;
}

macro_rules! impl_result {
    ($(#[$Attr:meta])* $Name:ident : $T:ty = $Constructor:expr) => {
        $(#[$Attr])*
        pub struct $Name(NonNull<$T>);

        unsafe impl Send for $Name {}
        unsafe impl Sync for $Name {}

        impl Drop for $Name {
            #[inline]
            fn drop(&mut self) {
                unsafe {
                    ffi::gpgme_result_unref(self.as_raw().cast());
                }
            }
        }

        impl Clone for $Name {
            #[inline]
            fn clone(&self) -> Self {
                unsafe {
                    ffi::gpgme_result_ref(self.as_raw().cast());
                    Self::from_raw(self.as_raw())
                }
            }
        }

        unsafe impl OpResult for $Name {
            fn from_context(ctx: &Context) -> Option<Self> {
                unsafe {
                    $Constructor(ctx.as_raw()).as_mut().map(|r| {
                        ffi::gpgme_result_ref(ptr::addr_of_mut!(*r).cast());
                        Self::from_raw(r)
                    })
                }
            }
        }

        impl $Name {
            impl_wrapper!($T);
        }
    };
}

macro_rules! impl_subresult {
    ($(#[$Attr:meta])* $Name:ident : $T:ty, $IterName:ident, $Owner:ty) => {
        $(#[$Attr])*
        #[derive(Copy, Clone)]
        pub struct $Name<'result>(NonNull<$T>, PhantomData<&'result $Owner>);

        unsafe impl Send for $Name<'_> {}
        unsafe impl Sync for $Name<'_> {}

        impl $Name<'_> {
            impl_wrapper!($T, PhantomData);
        }

        impl_list_iterator!(pub struct $IterName($Name: $T));
    };
}

fn timestamp(secs: impl Into<u64>) -> Option<SystemTime> {
    match secs.into() {
        0 => None,
        secs => Some(UNIX_EPOCH + Duration::from_secs(secs)),
    }
}

impl_subresult! {
    /// A recipient or signer key the engine refused to use.
    ///
    /// Upstream documentation:
    /// [`gpgme_invalid_key_t`](https://www.gnupg.org/documentation/manuals/gpgme/Crypto-Operations.html#index-gpgme_005finvalid_005fkey_005ft)
    RejectedKey: ffi::gpgme_invalid_key_t, RejectedKeys, ()
}

impl<'a> RejectedKey<'a> {
    str_field! { 'a;
        fingerprint, fingerprint_raw => fpr;
    }

    #[inline]
    pub fn reason(&self) -> Option<NativeError> {
        unsafe {
            match NativeError::new((*self.as_raw()).reason) {
                NativeError::NO_ERROR => None,
                e => Some(e),
            }
        }
    }
}

impl From<RejectedKey<'_>> for InvalidKey {
    fn from(key: RejectedKey<'_>) -> Self {
        InvalidKey {
            fingerprint: key
                .fingerprint_raw()
                .map(|s| s.to_string_lossy().into_owned()),
            reason: key.reason().unwrap_or(NativeError::GENERAL),
        }
    }
}

impl fmt::Debug for RejectedKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RejectedKey")
            .field("raw", &self.as_raw())
            .field("fingerprint", &self.fingerprint_raw())
            .field("reason", &self.reason())
            .finish()
    }
}

impl_result! {
    /// Upstream documentation:
    /// [`gpgme_keylist_result_t`](https://www.gnupg.org/documentation/manuals/gpgme/Listing-Keys.html#index-gpgme_005fkeylist_005fresult_005ft)
    KeyListResult: ffi::gpgme_keylist_result_t = ffi::gpgme_op_keylist_result
}
impl KeyListResult {
    pub fn is_truncated(&self) -> bool {
        unsafe { (*self.as_raw()).truncated() }
    }
}

impl fmt::Debug for KeyListResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyListResult")
            .field("raw", &self.as_raw())
            .field("truncated", &self.is_truncated())
            .finish()
    }
}

impl_result! {
    /// Upstream documentation:
    /// [`gpgme_genkey_result_t`](https://www.gnupg.org/documentation/manuals/gpgme/Generating-Keys.html#index-gpgme_005fgenkey_005fresult_005ft)
    KeyGenerationResult: ffi::gpgme_genkey_result_t = ffi::gpgme_op_genkey_result
}
impl KeyGenerationResult {
    bit_field! {
        has_primary_key => primary,
        has_subkey => sub,
        has_user_id => uid,
    }

    str_field! { '_;
        /// Fingerprint of the created key (or of the primary key a subkey was added to).
        fingerprint, fingerprint_raw => fpr;
    }
}

impl fmt::Debug for KeyGenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGenerationResult")
            .field("raw", &self.as_raw())
            .field("fingerprint", &self.fingerprint_raw())
            .field("primary", &self.has_primary_key())
            .field("subkey", &self.has_subkey())
            .field("user_id", &self.has_user_id())
            .finish()
    }
}

impl_result! {
    /// Upstream documentation:
    /// [`gpgme_import_result_t`](https://www.gnupg.org/documentation/manuals/gpgme/Importing-Keys.html#index-gpgme_005fimport_005fresult_005ft)
    ImportResult: ffi::gpgme_import_result_t = ffi::gpgme_op_import_result
}
impl ImportResult {
    #[inline]
    pub fn considered(&self) -> u32 {
        unsafe { (*self.as_raw()).considered as u32 }
    }

    #[inline]
    pub fn without_user_id(&self) -> u32 {
        unsafe { (*self.as_raw()).no_user_id as u32 }
    }

    #[inline]
    pub fn imported(&self) -> u32 {
        unsafe { (*self.as_raw()).imported as u32 }
    }

    #[inline]
    pub fn unchanged(&self) -> u32 {
        unsafe { (*self.as_raw()).unchanged as u32 }
    }

    #[inline]
    pub fn new_user_ids(&self) -> u32 {
        unsafe { (*self.as_raw()).new_user_ids as u32 }
    }

    #[inline]
    pub fn new_subkeys(&self) -> u32 {
        unsafe { (*self.as_raw()).new_sub_keys as u32 }
    }

    #[inline]
    pub fn new_signatures(&self) -> u32 {
        unsafe { (*self.as_raw()).new_signatures as u32 }
    }

    #[inline]
    pub fn new_revocations(&self) -> u32 {
        unsafe { (*self.as_raw()).new_revocations as u32 }
    }

    #[inline]
    pub fn secret_considered(&self) -> u32 {
        unsafe { (*self.as_raw()).secret_read as u32 }
    }

    #[inline]
    pub fn secret_imported(&self) -> u32 {
        unsafe { (*self.as_raw()).secret_imported as u32 }
    }

    #[inline]
    pub fn secret_unchanged(&self) -> u32 {
        unsafe { (*self.as_raw()).secret_unchanged as u32 }
    }

    #[inline]
    pub fn not_imported(&self) -> u32 {
        unsafe { (*self.as_raw()).not_imported as u32 }
    }

    #[inline]
    pub fn imports(&self) -> Imports<'_> {
        unsafe { Imports::from_list((*self.as_raw()).imports) }
    }

    /// Keys that were not in the keyring before.
    pub fn added(&self) -> impl Iterator<Item = Import<'_>> + '_ {
        self.imports()
            .filter(|i| i.result().is_ok() && i.status().contains(ImportFlags::NEW))
    }

    /// Keys that already existed and gained user IDs, signatures or subkeys.
    pub fn updated(&self) -> impl Iterator<Item = Import<'_>> + '_ {
        self.imports().filter(|i| {
            let status = i.status();
            i.result().is_ok() && !status.is_empty() && !status.contains(ImportFlags::NEW)
        })
    }

    /// Keys whose import failed, with the error reported for each.
    pub fn failed(&self) -> impl Iterator<Item = (Import<'_>, NativeError)> + '_ {
        self.imports()
            .filter_map(|i| i.result().err().and_then(|e| e.native()).map(|e| (i, e)))
    }
}

impl fmt::Debug for ImportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportResult")
            .field("raw", &self.as_raw())
            .field("considered", &self.considered())
            .field("imported", &self.imported())
            .field("unchanged", &self.unchanged())
            .field("without_user_id", &self.without_user_id())
            .field("new_user_ids", &self.new_user_ids())
            .field("new_subkeys", &self.new_subkeys())
            .field("new_signatures", &self.new_signatures())
            .field("new_revocations", &self.new_revocations())
            .field("secret_considered", &self.secret_considered())
            .field("secret_imported", &self.secret_imported())
            .field("secret_unchanged", &self.secret_unchanged())
            .field("not_imported", &self.not_imported())
            .field("imports", &self.imports())
            .finish()
    }
}

impl_subresult! {
    /// Upstream documentation:
    /// [`gpgme_import_status_t`](https://www.gnupg.org/documentation/manuals/gpgme/Importing-Keys.html#index-gpgme_005fimport_005fstatus_005ft)
    Import: ffi::gpgme_import_status_t, Imports, ImportResult
}
impl<'result> Import<'result> {
    str_field! { 'result;
        fingerprint, fingerprint_raw => fpr;
    }

    #[inline]
    pub fn result(&self) -> Result<()> {
        unsafe {
            return_err!((*self.as_raw()).result);
            Ok(())
        }
    }

    /// An empty set means the key was already present and nothing changed.
    #[inline]
    pub fn status(&self) -> ImportFlags {
        unsafe { ImportFlags::from_bits_truncate((*self.as_raw()).status) }
    }
}

impl fmt::Debug for Import<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Import")
            .field("raw", &self.as_raw())
            .field("fingerprint", &self.fingerprint_raw())
            .field("result", &self.result())
            .field("status", &self.status())
            .finish()
    }
}

impl_result! {
    /// Upstream documentation:
    /// [`gpgme_encrypt_result_t`](https://www.gnupg.org/documentation/manuals/gpgme/Encrypting-a-Plaintext.html#index-gpgme_005fencrypt_005fresult_005ft)
    EncryptionResult: ffi::gpgme_encrypt_result_t = ffi::gpgme_op_encrypt_result
}
impl EncryptionResult {
    #[inline]
    pub fn invalid_recipients(&self) -> RejectedKeys<'_> {
        unsafe { RejectedKeys::from_list((*self.as_raw()).invalid_recipients) }
    }
}

impl fmt::Debug for EncryptionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionResult")
            .field("raw", &self.as_raw())
            .field("invalid_recipients", &self.invalid_recipients())
            .finish()
    }
}

impl_result! {
    /// Upstream documentation:
    /// [`gpgme_decrypt_result_t`](https://www.gnupg.org/documentation/manuals/gpgme/Decrypt.html#index-gpgme_005fdecrypt_005fresult_005ft)
    DecryptionResult: ffi::gpgme_decrypt_result_t = ffi::gpgme_op_decrypt_result
}
impl DecryptionResult {
    str_field! { '_;
        unsupported_algorithm, unsupported_algorithm_raw => unsupported_algorithm;
    }

    bit_field! {
        is_wrong_key_usage => wrong_key_usage,
        is_mime => is_mime,
        /// Set when the message was encrypted without integrity protection.
        is_legacy_cipher_no_mdc => legacy_cipher_nomdc,
    }

    str_field! { '_;
        file_name, file_name_raw => file_name;
        symmetric_key_algorithm, symmetric_key_algorithm_raw => symkey_algo;
    }

    #[inline]
    pub fn recipients(&self) -> Recipients<'_> {
        unsafe { Recipients::from_list((*self.as_raw()).recipients) }
    }

    /// The failure the recipients explain the operation with: a rejected passphrase for any
    /// of them, or a missing secret key for all of them.
    pub(crate) fn recipient_failure(&self) -> Option<NativeError> {
        let code = |r: Recipient<'_>| {
            r.status()
                .err()
                .and_then(|e| e.native())
                .map(|e| e.code())
        };
        if self
            .recipients()
            .any(|r| code(r) == Some(NativeError::BAD_PASSPHRASE.code()))
        {
            return Some(NativeError::BAD_PASSPHRASE);
        }
        let mut recipients = self.recipients().peekable();
        let all_missing = recipients.peek().is_some()
            && recipients.all(|r| code(r) == Some(NativeError::NO_SECKEY.code()));
        all_missing.then_some(NativeError::NO_SECKEY)
    }
}

impl fmt::Debug for DecryptionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionResult")
            .field("raw", &self.as_raw())
            .field("unsupported_algorithm", &self.unsupported_algorithm_raw())
            .field("wrong_key_usage", &self.is_wrong_key_usage())
            .field("file_name", &self.file_name_raw())
            .field("recipients", &self.recipients())
            .finish()
    }
}

impl_subresult! {
    /// Upstream documentation:
    /// [`gpgme_recipient_t`](https://www.gnupg.org/documentation/manuals/gpgme/Decrypt.html#index-gpgme_005frecipient_005ft)
    Recipient: ffi::gpgme_recipient_t,
    Recipients,
    DecryptionResult
}
impl<'result> Recipient<'result> {
    str_field! { 'result;
        key_id, key_id_raw => keyid;
    }

    #[inline]
    pub fn algorithm(&self) -> KeyAlgorithm {
        unsafe { KeyAlgorithm::from_raw((*self.as_raw()).pubkey_algo) }
    }

    /// `Err` with `NO_SECKEY` when the secret key for this recipient is not available.
    #[inline]
    pub fn status(&self) -> Result<()> {
        unsafe {
            return_err!((*self.as_raw()).status);
            Ok(())
        }
    }
}

impl fmt::Debug for Recipient<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipient")
            .field("raw", &self.as_raw())
            .field("key_id", &self.key_id_raw())
            .field("algorithm", &self.algorithm())
            .field("status", &self.status())
            .finish()
    }
}

impl_result! {
    /// Upstream documentation:
    /// [`gpgme_sign_result_t`](https://www.gnupg.org/documentation/manuals/gpgme/Creating-a-Signature.html#index-gpgme_005fsign_005fresult_005ft)
    SigningResult: ffi::gpgme_sign_result_t = ffi::gpgme_op_sign_result
}
impl SigningResult {
    #[inline]
    pub fn invalid_signers(&self) -> RejectedKeys<'_> {
        unsafe { RejectedKeys::from_list((*self.as_raw()).invalid_signers) }
    }

    #[inline]
    pub fn new_signatures(&self) -> NewSignatures<'_> {
        unsafe { NewSignatures::from_list((*self.as_raw()).signatures) }
    }
}

impl fmt::Debug for SigningResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningResult")
            .field("raw", &self.as_raw())
            .field("invalid_signers", &self.invalid_signers())
            .field("new_signatures", &self.new_signatures())
            .finish()
    }
}

impl_subresult! {
    /// Upstream documentation:
    /// [`gpgme_new_signature_t`](https://www.gnupg.org/documentation/manuals/gpgme/Creating-a-Signature.html#index-gpgme_005fnew_005fsignature_005ft)
    NewSignature: ffi::gpgme_new_signature_t,
    NewSignatures,
    SigningResult
}
impl<'result> NewSignature<'result> {
    str_field! { 'result;
        fingerprint, fingerprint_raw => fpr;
    }

    #[inline]
    pub fn creation_time(&self) -> Option<SystemTime> {
        let secs = unsafe { (*self.as_raw()).timestamp };
        timestamp(u64::try_from(secs).unwrap_or(0))
    }

    #[inline]
    pub fn mode(&self) -> SignMode {
        unsafe { SignMode::from_raw((*self.as_raw()).typ) }
    }

    #[inline]
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        unsafe { KeyAlgorithm::from_raw((*self.as_raw()).pubkey_algo) }
    }

    #[inline]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        unsafe { HashAlgorithm::from_raw((*self.as_raw()).hash_algo) }
    }

    #[inline]
    pub fn signature_class(&self) -> u32 {
        unsafe { (*self.as_raw()).sig_class.into() }
    }
}

impl fmt::Debug for NewSignature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSignature")
            .field("raw", &self.as_raw())
            .field("fingerprint", &self.fingerprint_raw())
            .field("creation_time", &self.creation_time())
            .field("mode", &self.mode())
            .field("key_algorithm", &self.key_algorithm())
            .field("hash_algorithm", &self.hash_algorithm())
            .field("class", &self.signature_class())
            .finish()
    }
}

impl_result! {
    /// The outcome of checking every signature found in the input.
    ///
    /// A bad signature does not make the verification operation fail; inspect
    /// [`Signature::status`] for each entry instead.
    ///
    /// Upstream documentation:
    /// [`gpgme_verify_result_t`](https://www.gnupg.org/documentation/manuals/gpgme/Verify.html#index-gpgme_005fverify_005fresult_005ft)
    VerificationResult: ffi::gpgme_verify_result_t = ffi::gpgme_op_verify_result
}
impl VerificationResult {
    bit_field! {
        is_mime => is_mime,
    }

    str_field! { '_;
        file_name, file_name_raw => file_name;
    }

    #[inline]
    pub fn signatures(&self) -> Signatures<'_> {
        unsafe { Signatures::from_list((*self.as_raw()).signatures) }
    }
}

impl fmt::Debug for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationResult")
            .field("raw", &self.as_raw())
            .field("file_name", &self.file_name_raw())
            .field("signatures", &self.signatures())
            .finish()
    }
}

/// Verdict on a single signature.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SignatureStatus {
    /// The signature is cryptographically valid. This says nothing about whether the
    /// signing key is trusted; see [`Signature::validity`].
    Good,
    Bad,
    KeyExpired,
    KeyRevoked,
    /// The signing key is not in the keyring.
    NoPublicKey,
    GenericError,
}

impl SignatureStatus {
    pub fn from_native(status: NativeError) -> Self {
        match status.code() {
            c if c == NativeError::NO_ERROR.code() => SignatureStatus::Good,
            c if c == NativeError::BAD_SIGNATURE.code() => SignatureStatus::Bad,
            c if c == NativeError::KEY_EXPIRED.code() => SignatureStatus::KeyExpired,
            c if c == NativeError::CERT_REVOKED.code() => SignatureStatus::KeyRevoked,
            c if c == NativeError::NO_PUBKEY.code() => SignatureStatus::NoPublicKey,
            _ => SignatureStatus::GenericError,
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignatureStatus::Good => "GOOD",
            SignatureStatus::Bad => "BAD",
            SignatureStatus::KeyExpired => "KEY_EXPIRED",
            SignatureStatus::KeyRevoked => "KEY_REVOKED",
            SignatureStatus::NoPublicKey => "NO_PUBKEY",
            SignatureStatus::GenericError => "GENERIC_ERROR",
        })
    }
}

impl_subresult! {
    /// Upstream documentation:
    /// [`gpgme_signature_t`](https://www.gnupg.org/documentation/manuals/gpgme/Verify.html#index-gpgme_005fsignature_005ft)
    Signature: ffi::gpgme_signature_t,
    Signatures,
    VerificationResult
}
impl<'result> Signature<'result> {
    #[inline]
    pub fn status(&self) -> SignatureStatus {
        SignatureStatus::from_native(self.status_code())
    }

    /// The native status code the verdict was derived from.
    #[inline]
    pub fn status_code(&self) -> NativeError {
        unsafe { NativeError::new((*self.as_raw()).status) }
    }

    #[inline]
    pub fn is_good(&self) -> bool {
        self.status() == SignatureStatus::Good
    }

    #[inline]
    pub fn summary(&self) -> SignatureSummary {
        unsafe { SignatureSummary::from_bits_truncate((*self.as_raw()).summary) }
    }

    str_field! { 'result;
        /// Fingerprint of the signing key. When the key is not available this may only be
        /// its key id.
        fingerprint, fingerprint_raw => fpr;
    }

    #[inline]
    pub fn creation_time(&self) -> Option<SystemTime> {
        timestamp(unsafe { (*self.as_raw()).timestamp })
    }

    #[inline]
    pub fn expiration_time(&self) -> Option<SystemTime> {
        timestamp(unsafe { (*self.as_raw()).exp_timestamp })
    }

    #[inline]
    pub fn never_expires(&self) -> bool {
        self.expiration_time().is_none()
    }

    bit_field! {
        is_wrong_key_usage => wrong_key_usage,
        verified_by_chain => chain_model,
    }

    #[inline]
    pub fn validity(&self) -> Validity {
        unsafe { Validity::from_raw((*self.as_raw()).validity) }
    }

    #[inline]
    pub fn nonvalidity_reason(&self) -> Option<NativeError> {
        unsafe {
            match NativeError::new((*self.as_raw()).validity_reason) {
                NativeError::NO_ERROR => None,
                e => Some(e),
            }
        }
    }

    #[inline]
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        unsafe { KeyAlgorithm::from_raw((*self.as_raw()).pubkey_algo) }
    }

    #[inline]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        unsafe { HashAlgorithm::from_raw((*self.as_raw()).hash_algo) }
    }

    #[inline]
    pub fn policy_url(&self) -> Result<&'result str, Option<Utf8Error>> {
        self.policy_url_raw()
            .map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    #[inline]
    pub fn policy_url_raw(&self) -> Option<&'result CStr> {
        self.notations()
            .find(|n| n.is_policy_url())
            .and_then(|n| n.value_raw())
    }

    #[inline]
    pub fn notations(&self) -> SignatureNotations<'result> {
        unsafe { SignatureNotations::from_list((*self.as_raw()).notations) }
    }

    /// The signing key, when the context's key list mode asked GPGME to look it up.
    #[inline]
    pub fn key(&self) -> Option<Key> {
        unsafe {
            (*self.as_raw()).key.as_mut().map(|k| {
                ffi::gpgme_key_ref(k);
                Key::from_raw(k)
            })
        }
    }
}

impl fmt::Debug for Signature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("raw", &self.as_raw())
            .field("status", &self.status())
            .field("fingerprint", &self.fingerprint_raw())
            .field("creation_time", &self.creation_time())
            .field("expiration_time", &self.expiration_time())
            .field("key_algorithm", &self.key_algorithm())
            .field("hash_algorithm", &self.hash_algorithm())
            .field("summary", &self.summary())
            .field("validity", &self.validity())
            .field("nonvalidity_reason", &self.nonvalidity_reason())
            .field("notations", &self.notations())
            .finish()
    }
}
