use std::{
    ffi::CStr,
    fmt,
    marker::PhantomData,
    str::Utf8Error,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use ffi;

use crate::{
    notation::SignatureNotations, Context, KeyAlgorithm, KeyListMode, NativeError, NonNull,
    Protocol, Validity,
};

fn timestamp(secs: libc::c_long) -> Option<SystemTime> {
    u64::try_from(secs)
        .ok()
        .filter(|&s| s > 0)
        .map(|s| UNIX_EPOCH + Duration::from_secs(s))
}

fn same_fingerprint(a: &[u8], b: &[u8]) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// A read-only snapshot of a key held by the backend.
///
/// Cloning only bumps the native reference count; changes made to the key ring later are
/// not reflected until [`Key::update`] is called.
///
/// Upstream documentation:
/// [`gpgme_key_t`](https://www.gnupg.org/documentation/manuals/gpgme/Key-objects.html#index-gpgme_005fkey_005ft)
pub struct Key(NonNull<ffi::gpgme_key_t>);

unsafe impl Send for Key {}
unsafe impl Sync for Key {}

impl Drop for Key {
    #[inline]
    fn drop(&mut self) {
        unsafe {
            ffi::gpgme_key_unref(self.as_raw());
        }
    }
}

impl Clone for Key {
    #[inline]
    fn clone(&self) -> Key {
        unsafe {
            ffi::gpgme_key_ref(self.as_raw());
            Key(self.0)
        }
    }
}

impl Key {
    impl_wrapper!(ffi::gpgme_key_t);

    bit_field! {
        is_revoked => revoked,
        is_expired => expired,
        is_disabled => disabled,
        is_invalid => invalid,
        can_encrypt => can_encrypt,
        can_sign => can_sign,
        can_certify => can_certify,
        can_authenticate => can_authenticate,
        /// `true` if the secret part is available, which is only reported for keys
        /// obtained through a secret key listing.
        has_secret => secret,
    }

    /// Revoked, expired, disabled or invalid.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.is_revoked() || self.is_expired() || self.is_disabled() || self.is_invalid()
    }

    #[inline]
    pub fn owner_trust(&self) -> Validity {
        unsafe { Validity::from_raw((*self.as_raw()).owner_trust) }
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        unsafe { Protocol::from_raw((*self.as_raw()).protocol) }
    }

    #[inline]
    pub fn key_list_mode(&self) -> KeyListMode {
        unsafe { KeyListMode::from_bits_retain((*self.as_raw()).keylist_mode) }
    }

    /// The long key id of the primary key.
    #[inline]
    pub fn id(&self) -> Result<&str, Option<Utf8Error>> {
        self.primary_key().map_or(Err(None), |k| k.id())
    }

    #[inline]
    pub fn id_raw(&self) -> Option<&CStr> {
        self.primary_key()?.id_raw()
    }

    #[inline]
    pub fn fingerprint(&self) -> Result<&str, Option<Utf8Error>> {
        self.fingerprint_raw()
            .map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    /// Older engines leave the key level field empty; the primary subkey always has one.
    #[inline]
    pub fn fingerprint_raw(&self) -> Option<&CStr> {
        unsafe { (*self.as_raw()).fpr.as_ref() }
            .map(|s| unsafe { CStr::from_ptr(s) })
            .or_else(|| self.primary_key()?.fingerprint_raw())
    }

    /// Compares `fingerprint` against this key's fingerprint, ignoring ASCII case.
    pub fn matches_fingerprint(&self, fingerprint: impl AsRef<[u8]>) -> bool {
        self.fingerprint_raw()
            .is_some_and(|fpr| same_fingerprint(fpr.to_bytes(), fingerprint.as_ref()))
    }

    #[inline]
    pub fn primary_key(&self) -> Option<Subkey<'_>> {
        self.subkeys().next()
    }

    #[inline]
    pub fn user_ids(&self) -> UserIds<'_> {
        unsafe { UserIds::from_list((*self.as_raw()).uids) }
    }

    #[inline]
    pub fn subkeys(&self) -> Subkeys<'_> {
        unsafe { Subkeys::from_list((*self.as_raw()).subkeys) }
    }

    /// Replaces this snapshot with a fresh one from the key ring.
    #[inline]
    pub fn update(&mut self) -> crate::Result<()> {
        *self = self.updated()?;
        Ok(())
    }

    /// Looks the key up again with the protocol and listing mode it was obtained with.
    ///
    /// The listing mode of the context doing the refresh is not consulted: a key listed
    /// without [`KeyListMode::SIGS`] stays without signatures. Use [`Context::get_key`] on a
    /// context with the wanted mode to list more.
    pub fn updated(&self) -> crate::Result<Key> {
        let mut ctx = Context::from_protocol(self.protocol())?;
        ctx.set_key_list_mode(self.key_list_mode())?;
        let fpr = self.fingerprint_raw().ok_or(NativeError::INV_VALUE)?;
        if self.has_secret() {
            ctx.get_secret_key(fpr)
        } else {
            ctx.get_key(fpr)
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("fingerprint", &self.fingerprint_raw())
            .field("protocol", &self.protocol())
            .field("owner_trust", &self.owner_trust())
            .field("has_secret", &self.has_secret())
            .field("bad", &self.is_bad())
            .field("can_sign", &self.can_sign())
            .field("can_encrypt", &self.can_encrypt())
            .field("user_ids", &self.user_ids())
            .field("subkeys", &self.subkeys())
            .finish()
    }
}

/// Upstream documentation: [`gpgme_subkey_t`](https://www.gnupg.org/documentation/manuals/gpgme/Key-objects.html#index-gpgme_005fsubkey_005ft)
#[derive(Copy, Clone)]
pub struct Subkey<'key>(NonNull<ffi::gpgme_subkey_t>, PhantomData<&'key Key>);

unsafe impl Send for Subkey<'_> {}
unsafe impl Sync for Subkey<'_> {}

impl<'key> Subkey<'key> {
    impl_wrapper!(ffi::gpgme_subkey_t, PhantomData);

    str_field! { 'key;
        id, id_raw => keyid;
        fingerprint, fingerprint_raw => fpr;
        keygrip, keygrip_raw => keygrip;
        /// Only set for elliptic curve keys.
        curve, curve_raw => curve;
    }

    bit_field! {
        is_revoked => revoked,
        is_expired => expired,
        is_invalid => invalid,
        is_disabled => disabled,
        can_encrypt => can_encrypt,
        can_sign => can_sign,
        can_certify => can_certify,
        can_authenticate => can_authenticate,
        is_card_key => is_cardkey,
        is_secret => secret,
    }

    #[inline]
    pub fn creation_time(&self) -> Option<SystemTime> {
        timestamp(unsafe { (*self.as_raw()).timestamp })
    }

    #[inline]
    pub fn expiration_time(&self) -> Option<SystemTime> {
        timestamp(unsafe { (*self.as_raw()).expires })
    }

    #[inline]
    pub fn never_expires(&self) -> bool {
        self.expiration_time().is_none()
    }

    #[inline]
    pub fn is_bad(&self) -> bool {
        self.is_revoked() || self.is_expired() || self.is_disabled() || self.is_invalid()
    }

    #[inline]
    pub fn algorithm(&self) -> KeyAlgorithm {
        unsafe { KeyAlgorithm::from_raw((*self.as_raw()).pubkey_algo) }
    }

    /// Key length in bits.
    #[inline]
    pub fn length(&self) -> usize {
        unsafe { (*self.as_raw()).length as usize }
    }
}

impl fmt::Debug for Subkey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subkey")
            .field("fingerprint", &self.fingerprint_raw())
            .field("algorithm", &self.algorithm())
            .field("length", &self.length())
            .field("secret", &self.is_secret())
            .field("expiration_time", &self.expiration_time())
            .field("bad", &self.is_bad())
            .field("can_sign", &self.can_sign())
            .field("can_encrypt", &self.can_encrypt())
            .finish()
    }
}

impl_list_iterator!(pub struct Subkeys(Subkey: ffi::gpgme_subkey_t));

/// Upstream documentation: [`gpgme_user_id_t`](https://www.gnupg.org/documentation/manuals/gpgme/Key-objects.html#index-gpgme_005fuser_005fid_005ft)
#[derive(Copy, Clone)]
pub struct UserId<'key>(NonNull<ffi::gpgme_user_id_t>, PhantomData<&'key Key>);

unsafe impl Send for UserId<'_> {}
unsafe impl Sync for UserId<'_> {}

impl<'key> UserId<'key> {
    impl_wrapper!(ffi::gpgme_user_id_t, PhantomData);

    str_field! { 'key;
        /// The full user ID string, e.g. `Alfa Test <alfa@example.net>`.
        id, id_raw => uid;
        name, name_raw => name;
        email, email_raw => email;
        comment, comment_raw => comment;
    }

    bit_field! {
        is_revoked => revoked,
        is_invalid => invalid,
    }

    #[inline]
    pub fn validity(&self) -> Validity {
        unsafe { Validity::from_raw((*self.as_raw()).validity) }
    }

    #[inline]
    pub fn is_bad(&self) -> bool {
        self.is_revoked() || self.is_invalid()
    }

    /// Certifications on this user ID. Only populated when the key was listed with
    /// [`KeyListMode::SIGS`].
    #[inline]
    pub fn signatures(&self) -> KeySignatures<'key> {
        unsafe { KeySignatures::from_list((*self.as_raw()).signatures) }
    }
}

impl fmt::Debug for UserId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserId")
            .field("id", &self.id_raw())
            .field("validity", &self.validity())
            .field("bad", &self.is_bad())
            .field("signatures", &self.signatures())
            .finish()
    }
}

impl fmt::Display for UserId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id_raw().map(|s| s.to_string_lossy()).unwrap_or_default())
    }
}

impl_list_iterator!(pub struct UserIds(UserId: ffi::gpgme_user_id_t));

/// A certification made on a user ID.
///
/// Upstream documentation: [`gpgme_key_sig_t`](https://www.gnupg.org/documentation/manuals/gpgme/Key-objects.html#index-gpgme_005fkey_005fsig_005ft)
#[derive(Copy, Clone)]
pub struct KeySignature<'key>(NonNull<ffi::gpgme_key_sig_t>, PhantomData<&'key Key>);

unsafe impl Send for KeySignature<'_> {}
unsafe impl Sync for KeySignature<'_> {}

impl<'key> KeySignature<'key> {
    impl_wrapper!(ffi::gpgme_key_sig_t, PhantomData);

    str_field! { 'key;
        signer_key_id, signer_key_id_raw => keyid;
        signer_user_id, signer_user_id_raw => uid;
    }

    bit_field! {
        is_revocation => revoked,
        is_expired => expired,
        is_invalid => invalid,
        is_exportable => exportable,
    }

    #[inline]
    pub fn algorithm(&self) -> KeyAlgorithm {
        unsafe { KeyAlgorithm::from_raw((*self.as_raw()).pubkey_algo) }
    }

    #[inline]
    pub fn creation_time(&self) -> Option<SystemTime> {
        timestamp(unsafe { (*self.as_raw()).timestamp })
    }

    #[inline]
    pub fn expiration_time(&self) -> Option<SystemTime> {
        timestamp(unsafe { (*self.as_raw()).expires })
    }

    #[inline]
    pub fn cert_class(&self) -> u64 {
        unsafe { (*self.as_raw()).sig_class.into() }
    }

    /// `NO_ERROR` for a verified certification, otherwise why it could not be checked.
    #[inline]
    pub fn status(&self) -> NativeError {
        unsafe { NativeError::new((*self.as_raw()).status) }
    }

    #[inline]
    pub fn notations(&self) -> SignatureNotations<'key> {
        unsafe { SignatureNotations::from_list((*self.as_raw()).notations) }
    }
}

impl fmt::Debug for KeySignature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySignature")
            .field("signer_key", &self.signer_key_id_raw())
            .field("signer", &self.signer_user_id_raw())
            .field("algorithm", &self.algorithm())
            .field("creation_time", &self.creation_time())
            .field("revocation", &self.is_revocation())
            .field("status", &self.status())
            .finish()
    }
}

impl_list_iterator!(pub struct KeySignatures(KeySignature: ffi::gpgme_key_sig_t));
