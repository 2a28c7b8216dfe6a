use std::{
    borrow::BorrowMut,
    ffi::CStr,
    fmt,
    iter::FusedIterator,
    mem::ManuallyDrop,
    ptr,
    str::Utf8Error,
    time::Duration,
};

use conv::{UnwrapOrSaturate, ValueInto};
use cstr_argument::CStrArgument;
use ffi;
use libc;
use tracing::{debug, trace};

use crate::{
    callbacks::{self, Hook, PassphraseHook, ProgressHook},
    engine::EngineInfos,
    error::{self, return_err, InvalidKey, SigningFailure},
    results::{
        DecryptionResult, EncryptionResult, ImportResult, KeyGenerationResult, KeyListResult,
        OpResult, SigningResult, VerificationResult,
    },
    utils::{self, SmallVec},
    CreateKeyFlags, Data, DeleteKeyFlags, EncryptFlags, Error, ExportMode, Interactor, IntoData,
    Key, KeyListMode, NativeError, NonNull, PassphraseProvider, PinentryMode, ProgressReporter,
    Protocol, Result, SignMode,
};

fn check(code: ffi::gpgme_error_t) -> std::result::Result<(), NativeError> {
    match NativeError::new(code) {
        NativeError::NO_ERROR => Ok(()),
        err => Err(err),
    }
}

fn flag(enabled: bool) -> libc::c_int {
    if enabled {
        1
    } else {
        0
    }
}

/// A session with the GPGME backend.
///
/// All configuration (armor, text mode, protocol, key list mode, pinentry mode, signers and
/// callbacks) applies to every operation started through the context until it is changed.
/// Operations never change it themselves.
///
/// A context may be moved to another thread but not shared; every operation takes
/// `&mut self`.
///
/// Upstream documentation:
/// [`gpgme_ctx_t`](https://www.gnupg.org/documentation/manuals/gpgme/Contexts.html#Contexts)
#[must_use]
pub struct Context {
    raw: NonNull<ffi::gpgme_ctx_t>,
    passphrase_hook: Option<Box<PassphraseHook>>,
    progress_hook: Option<Box<ProgressHook>>,
}

unsafe impl Send for Context {}

impl Drop for Context {
    #[inline]
    fn drop(&mut self) {
        unsafe { ffi::gpgme_release(self.as_raw()) }
    }
}

impl Context {
    #[inline]
    pub(crate) fn as_raw(&self) -> ffi::gpgme_ctx_t {
        self.raw.as_ptr()
    }

    /// Creates a context for the default protocol (OpenPGP).
    ///
    /// Upstream documentation:
    /// [`gpgme_new`](https://www.gnupg.org/documentation/manuals/gpgme/Creating-Contexts.html#index-gpgme_005fnew)
    pub fn new() -> Result<Self> {
        crate::init()?;
        let raw = unsafe {
            let mut ctx = ptr::null_mut();
            check(ffi::gpgme_new(&mut ctx)).map_err(error::unavailable)?;
            NonNull::new_unchecked(ctx)
        };
        debug!("created gpgme context");
        Ok(Context {
            raw,
            passphrase_hook: None,
            progress_hook: None,
        })
    }

    /// Creates a context for `proto`, failing with [`Error::BackendUnavailable`] if no
    /// usable engine is installed for it.
    pub fn from_protocol(proto: Protocol) -> Result<Self> {
        let gpgme = crate::init()?;
        gpgme.check_engine_version(proto)?;
        let ctx = Context::new()?;
        unsafe {
            check(ffi::gpgme_set_protocol(ctx.as_raw(), proto.raw())).map_err(error::unavailable)?;
        }
        debug!(protocol = %proto, "context protocol selected");
        Ok(ctx)
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        unsafe { Protocol::from_raw(ffi::gpgme_get_protocol(self.as_raw())) }
    }

    #[inline]
    pub fn set_protocol(&mut self, proto: Protocol) -> Result<()> {
        unsafe {
            return_err!(ffi::gpgme_set_protocol(self.as_raw(), proto.raw()));
        }
        Ok(())
    }

    /// Whether output is ASCII armored.
    #[inline]
    pub fn armor(&self) -> bool {
        unsafe { ffi::gpgme_get_armor(self.as_raw()) != 0 }
    }

    #[inline]
    pub fn set_armor(&mut self, enabled: bool) {
        unsafe {
            ffi::gpgme_set_armor(self.as_raw(), flag(enabled));
        }
    }

    #[inline]
    pub fn text_mode(&self) -> bool {
        unsafe { ffi::gpgme_get_textmode(self.as_raw()) != 0 }
    }

    #[inline]
    pub fn set_text_mode(&mut self, enabled: bool) {
        unsafe {
            ffi::gpgme_set_textmode(self.as_raw(), flag(enabled));
        }
    }

    #[inline]
    pub fn offline(&self) -> bool {
        unsafe { ffi::gpgme_get_offline(self.as_raw()) != 0 }
    }

    #[inline]
    pub fn set_offline(&mut self, enabled: bool) {
        unsafe {
            ffi::gpgme_set_offline(self.as_raw(), flag(enabled));
        }
    }

    /// How many certificates S/MIME signatures embed. Negative values have the meanings
    /// GPGME gives them (`-2` all, `-1` all but the root).
    #[inline]
    pub fn include_certs(&self) -> libc::c_int {
        unsafe { ffi::gpgme_get_include_certs(self.as_raw()) }
    }

    #[inline]
    pub fn set_include_certs(&mut self, certs: libc::c_int) {
        unsafe {
            ffi::gpgme_set_include_certs(self.as_raw(), certs);
        }
    }

    #[inline]
    pub fn key_list_mode(&self) -> KeyListMode {
        unsafe { KeyListMode::from_bits_retain(ffi::gpgme_get_keylist_mode(self.as_raw())) }
    }

    /// Adds `mask` to the current key list mode, keeping any bits this crate does not know.
    #[inline]
    pub fn add_key_list_mode(&mut self, mask: KeyListMode) -> Result<()> {
        unsafe {
            let old = ffi::gpgme_get_keylist_mode(self.as_raw());
            return_err!(ffi::gpgme_set_keylist_mode(
                self.as_raw(),
                mask.bits() | (old & !KeyListMode::all().bits())
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn set_key_list_mode(&mut self, mode: KeyListMode) -> Result<()> {
        unsafe {
            return_err!(ffi::gpgme_set_keylist_mode(self.as_raw(), mode.bits()));
        }
        Ok(())
    }

    #[inline]
    pub fn pinentry_mode(&self) -> PinentryMode {
        unsafe { PinentryMode::from_raw(ffi::gpgme_get_pinentry_mode(self.as_raw())) }
    }

    /// Upstream documentation:
    /// [`gpgme_set_pinentry_mode`](https://www.gnupg.org/documentation/manuals/gpgme/Pinentry-Mode.html#index-gpgme_005fset_005fpinentry_005fmode)
    #[inline]
    pub fn set_pinentry_mode(&mut self, mode: PinentryMode) -> Result<()> {
        unsafe {
            return_err!(ffi::gpgme_set_pinentry_mode(self.as_raw(), mode.raw()));
        }
        Ok(())
    }

    #[inline]
    pub fn get_flag(&self, name: impl CStrArgument) -> Result<&str, Option<Utf8Error>> {
        self.get_flag_raw(name)
            .map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    #[inline]
    pub fn get_flag_raw(&self, name: impl CStrArgument) -> Option<&CStr> {
        let name = name.try_into_cstr().ok()?;
        unsafe {
            ffi::gpgme_get_ctx_flag(self.as_raw(), name.as_ref().as_ptr())
                .as_ref()
                .map(|s| CStr::from_ptr(s))
        }
    }

    /// Upstream documentation:
    /// [`gpgme_set_ctx_flag`](https://www.gnupg.org/documentation/manuals/gpgme/Context-Flags.html#index-gpgme_005fset_005fctx_005fflag)
    #[inline]
    pub fn set_flag(&mut self, name: impl CStrArgument, value: impl CStrArgument) -> Result<()> {
        let name = name.try_into_cstr()?;
        let value = value.try_into_cstr()?;
        unsafe {
            return_err!(ffi::gpgme_set_ctx_flag(
                self.as_raw(),
                name.as_ref().as_ptr(),
                value.as_ref().as_ptr(),
            ));
        }
        Ok(())
    }

    /// The engines this context uses, including any per-context overrides.
    #[inline]
    pub fn engine_info(&self) -> EngineInfos<'_> {
        unsafe { EngineInfos::from_list(ffi::gpgme_ctx_get_engine_info(self.as_raw())) }
    }

    fn current_engine(&self) -> Option<crate::EngineInfo<'_>> {
        let proto = self.protocol();
        self.engine_info().find(|e| e.protocol() == proto)
    }

    /// Points the engine of the current protocol at another executable. The home directory
    /// is kept.
    pub fn set_engine_path(&mut self, path: impl CStrArgument) -> Result<()> {
        let path = path.try_into_cstr()?;
        let home_dir = self
            .current_engine()
            .and_then(|e| e.home_dir_raw())
            .map(CStr::to_owned);
        unsafe {
            return_err!(ffi::gpgme_ctx_set_engine_info(
                self.as_raw(),
                self.protocol().raw(),
                path.as_ref().as_ptr(),
                home_dir.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            ));
        }
        Ok(())
    }

    /// Makes the engine of the current protocol use another home directory (for GnuPG, the
    /// directory holding the key ring). The executable path is kept.
    pub fn set_engine_home_dir(&mut self, home_dir: impl CStrArgument) -> Result<()> {
        let home_dir = home_dir.try_into_cstr()?;
        let path = self
            .current_engine()
            .and_then(|e| e.path_raw())
            .map(CStr::to_owned);
        unsafe {
            return_err!(ffi::gpgme_ctx_set_engine_info(
                self.as_raw(),
                self.protocol().raw(),
                path.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                home_dir.as_ref().as_ptr(),
            ));
        }
        debug!(home_dir = %home_dir.as_ref().to_string_lossy(), "engine home directory set");
        Ok(())
    }

    /// Sets the locale passed to the engine for `category` (one of the `LC_*` constants, e.g.
    /// [`libc::LC_CTYPE`]). `None` restores the process default.
    ///
    /// Upstream documentation:
    /// [`gpgme_set_locale`](https://www.gnupg.org/documentation/manuals/gpgme/Locale.html#index-gpgme_005fset_005flocale)
    pub fn set_locale(
        &mut self, category: libc::c_int, value: Option<impl CStrArgument>,
    ) -> Result<()> {
        let value = value.map(CStrArgument::try_into_cstr).transpose()?;
        unsafe {
            return_err!(ffi::gpgme_set_locale(
                self.as_raw(),
                category,
                value.as_ref().map_or(ptr::null(), |s| s.as_ref().as_ptr()),
            ));
        }
        Ok(())
    }

    fn install_passphrase_hook(&mut self, hook: Option<Box<PassphraseHook>>) {
        self.passphrase_hook = hook;
        unsafe {
            match self.passphrase_hook.as_mut() {
                Some(hook) => ffi::gpgme_set_passphrase_cb(
                    self.raw.as_ptr(),
                    Some(callbacks::passphrase_cb),
                    ptr::addr_of_mut!(**hook).cast(),
                ),
                None => ffi::gpgme_set_passphrase_cb(self.raw.as_ptr(), None, ptr::null_mut()),
            }
        }
    }

    fn enable_loopback(&mut self) -> Result<()> {
        if self.pinentry_mode() == PinentryMode::Default {
            self.set_pinentry_mode(PinentryMode::Loopback)?;
        }
        Ok(())
    }

    /// Installs a provider that answers passphrase requests for all following operations.
    ///
    /// If the pinentry mode is still [`PinentryMode::Default`] it is switched to
    /// [`PinentryMode::Loopback`], since GnuPG 2.1 and later never consult the provider
    /// otherwise.
    ///
    /// Upstream documentation:
    /// [`gpgme_set_passphrase_cb`](https://www.gnupg.org/documentation/manuals/gpgme/Passphrase-Callback.html#index-gpgme_005fset_005fpassphrase_005fcb)
    pub fn set_passphrase_provider(
        &mut self, provider: impl PassphraseProvider + 'static,
    ) -> Result<()> {
        self.enable_loopback()?;
        self.install_passphrase_hook(Some(Box::new(PassphraseHook::from(
            Box::new(provider) as Box<dyn PassphraseProvider>
        ))));
        debug!("passphrase provider installed");
        Ok(())
    }

    /// Removes the passphrase provider and hands it back. The pinentry mode is left as is.
    pub fn clear_passphrase_provider(&mut self) -> Option<Box<dyn PassphraseProvider>> {
        let hook = self.passphrase_hook.take();
        self.install_passphrase_hook(None);
        hook.and_then(|h| h.into_inner())
    }

    /// Runs `f` with `provider` installed, then puts back the previous provider and pinentry
    /// mode, even if `f` panics.
    pub fn with_passphrase_provider<R>(
        &mut self, provider: impl PassphraseProvider + 'static,
        f: impl FnOnce(&mut Context) -> R,
    ) -> R {
        struct Restore<'a> {
            ctx: &'a mut Context,
            hook: Option<Box<PassphraseHook>>,
            mode: PinentryMode,
        }

        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                if self.ctx.pinentry_mode() != self.mode {
                    if let Err(err) = self.ctx.set_pinentry_mode(self.mode) {
                        debug!(error = %err, "unable to restore pinentry mode");
                    }
                }
                let hook = self.hook.take();
                self.ctx.install_passphrase_hook(hook);
            }
        }

        let mode = self.pinentry_mode();
        if let Err(err) = self.enable_loopback() {
            debug!(error = %err, "unable to switch to loopback pinentry");
        }
        let hook = self.passphrase_hook.take();
        let mut guard = Restore {
            ctx: self,
            hook,
            mode,
        };
        guard.ctx.install_passphrase_hook(Some(Box::new(PassphraseHook::from(
            Box::new(provider) as Box<dyn PassphraseProvider>
        ))));
        f(&mut *guard.ctx)
    }

    /// Upstream documentation:
    /// [`gpgme_set_progress_cb`](https://www.gnupg.org/documentation/manuals/gpgme/Progress-Meter-Callback.html#index-gpgme_005fset_005fprogress_005fcb)
    pub fn set_progress_reporter(&mut self, reporter: impl ProgressReporter + 'static) {
        let mut hook = Box::new(ProgressHook::from(Box::new(reporter) as Box<dyn ProgressReporter>));
        unsafe {
            ffi::gpgme_set_progress_cb(
                self.as_raw(),
                Some(callbacks::progress_cb),
                ptr::addr_of_mut!(*hook).cast(),
            );
        }
        self.progress_hook = Some(hook);
    }

    pub fn clear_progress_reporter(&mut self) -> Option<Box<dyn ProgressReporter>> {
        unsafe {
            ffi::gpgme_set_progress_cb(self.as_raw(), None, ptr::null_mut());
        }
        self.progress_hook.take().and_then(|h| h.into_inner())
    }

    /// Collects what the callbacks reported during the last native call. Panics raised in a
    /// callback are resumed here.
    fn callback_failure(&mut self) -> Option<NativeError> {
        if let Some(hook) = self.progress_hook.as_mut() {
            hook.take_failure();
        }
        let failure = self.passphrase_hook.as_mut().and_then(|h| h.take_failure());
        if let Some(err) = failure {
            trace!(error = %err, "passphrase provider failed");
        }
        failure
    }

    #[inline]
    fn result<R: OpResult>(&self) -> Result<R> {
        R::from_context(self).ok_or(Error::Backend(NativeError::GENERAL))
    }

    fn invalid_signers(&self) -> Vec<InvalidKey> {
        self.result::<SigningResult>()
            .map(|r| r.invalid_signers().map(InvalidKey::from).collect())
            .unwrap_or_default()
    }

    /// Looks up a single public key by fingerprint, key id or other unique identifier.
    ///
    /// Fails with [`Error::KeyNotFound`] when nothing matches and [`Error::AmbiguousKey`]
    /// when more than one key does.
    ///
    /// Upstream documentation:
    /// [`gpgme_get_key`](https://www.gnupg.org/documentation/manuals/gpgme/Listing-Keys.html#index-gpgme_005fget_005fkey)
    #[inline]
    pub fn get_key(&mut self, fingerprint: impl CStrArgument) -> Result<Key> {
        self.lookup_key(fingerprint, false)
    }

    /// Like [`get_key`](Self::get_key), but only returns keys whose secret part is
    /// available.
    #[inline]
    pub fn get_secret_key(&mut self, fingerprint: impl CStrArgument) -> Result<Key> {
        self.lookup_key(fingerprint, true)
    }

    fn lookup_key(&mut self, fingerprint: impl CStrArgument, secret: bool) -> Result<Key> {
        let fingerprint = fingerprint.try_into_cstr()?;
        let fingerprint = fingerprint.as_ref();
        debug!(fingerprint = %fingerprint.to_string_lossy(), secret, "looking up key");
        unsafe {
            let mut key = ptr::null_mut();
            check(ffi::gpgme_get_key(
                self.as_raw(),
                fingerprint.as_ptr(),
                &mut key,
                flag(secret),
            ))
            .map_err(|err| error::key_lookup(err, &fingerprint.to_string_lossy()))?;
            if key.is_null() {
                return Err(Error::KeyNotFound(fingerprint.to_string_lossy().into_owned()));
            }
            Ok(Key::from_raw(key))
        }
    }

    /// Lists every public key in the key ring.
    #[inline]
    pub fn keys(&mut self) -> Result<Keys<'_>> {
        self.find_keys(None::<&CStr>)
    }

    #[inline]
    pub fn secret_keys(&mut self) -> Result<Keys<'_>> {
        self.find_secret_keys(None::<&CStr>)
    }

    /// Lists the public keys matching any of `patterns`. No patterns lists every key.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_keylist_ext_start`](https://www.gnupg.org/documentation/manuals/gpgme/Listing-Keys.html#index-gpgme_005fop_005fkeylist_005fext_005fstart)
    #[inline]
    pub fn find_keys<I>(&mut self, patterns: I) -> Result<Keys<'_>>
    where
        I: IntoIterator,
        I::Item: CStrArgument, {
        Keys::new(self, patterns, false)
    }

    #[inline]
    pub fn find_secret_keys<I>(&mut self, patterns: I) -> Result<Keys<'_>>
    where
        I: IntoIterator,
        I::Item: CStrArgument, {
        Keys::new(self, patterns, true)
    }

    /// Generates a key pair from a native parameter block.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_genkey`](https://www.gnupg.org/documentation/manuals/gpgme/Generating-Keys.html#index-gpgme_005fop_005fgenkey)
    pub fn generate_key<'p, 's>(
        &mut self, params: impl CStrArgument, public: Option<&mut Data<'p>>,
        secret: Option<&mut Data<'s>>,
    ) -> Result<KeyGenerationResult> {
        let params = params.try_into_cstr()?;
        let public = public.map_or(ptr::null_mut(), |d| d.as_raw());
        let secret = secret.map_or(ptr::null_mut(), |d| d.as_raw());
        debug!("generating key from parameters");
        let result = unsafe {
            check(ffi::gpgme_op_genkey(
                self.as_raw(),
                params.as_ref().as_ptr(),
                public,
                secret,
            ))
        };
        let callback = self.callback_failure();
        result.map_err(|err| callback.unwrap_or(err))?;
        self.result()
    }

    /// Creates a new primary key.
    ///
    /// `algo` uses GnuPG's algorithm names (`"default"`, `"rsa3072"`, `"ed25519"`, ...).
    /// `expires` is counted from now; `None` lets the engine pick its default unless
    /// [`CreateKeyFlags::NOEXPIRE`] is given.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_createkey`](https://www.gnupg.org/documentation/manuals/gpgme/Generating-Keys.html#index-gpgme_005fop_005fcreatekey)
    pub fn create_key(
        &mut self, userid: impl CStrArgument, algo: impl CStrArgument,
        expires: Option<Duration>, flags: CreateKeyFlags,
    ) -> Result<KeyGenerationResult> {
        let userid = userid.try_into_cstr()?;
        let algo = algo.try_into_cstr()?;
        let expires = expires.map_or(0, |e| e.as_secs().value_into().unwrap_or_saturate());
        debug!(?flags, "creating key");
        let result = unsafe {
            check(ffi::gpgme_op_createkey(
                self.as_raw(),
                userid.as_ref().as_ptr(),
                algo.as_ref().as_ptr(),
                0,
                expires,
                ptr::null_mut(),
                flags.bits(),
            ))
        };
        let callback = self.callback_failure();
        result.map_err(|err| callback.unwrap_or(err))?;
        self.result()
    }

    /// Adds a subkey to `key`.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_createsubkey`](https://www.gnupg.org/documentation/manuals/gpgme/Generating-Keys.html#index-gpgme_005fop_005fcreatesubkey)
    pub fn create_subkey(
        &mut self, key: &Key, algo: impl CStrArgument, expires: Option<Duration>,
        flags: CreateKeyFlags,
    ) -> Result<KeyGenerationResult> {
        let algo = algo.try_into_cstr()?;
        let expires = expires.map_or(0, |e| e.as_secs().value_into().unwrap_or_saturate());
        debug!(?flags, "creating subkey");
        let result = unsafe {
            check(ffi::gpgme_op_createsubkey(
                self.as_raw(),
                key.as_raw(),
                algo.as_ref().as_ptr(),
                0,
                expires,
                flags.bits(),
            ))
        };
        let callback = self.callback_failure();
        result.map_err(|err| callback.unwrap_or(err))?;
        self.result()
    }

    /// Upstream documentation:
    /// [`gpgme_op_delete_ext`](https://www.gnupg.org/documentation/manuals/gpgme/Deleting-Keys.html#index-gpgme_005fop_005fdelete_005fext)
    pub fn delete_key_with_flags(&mut self, key: &Key, flags: DeleteKeyFlags) -> Result<()> {
        debug!(?flags, "deleting key");
        unsafe {
            return_err!(ffi::gpgme_op_delete_ext(self.as_raw(), key.as_raw(), flags.bits()));
        }
        Ok(())
    }

    /// Deletes the public key. Fails if the secret key is present.
    #[inline]
    pub fn delete_key(&mut self, key: &Key) -> Result<()> {
        self.delete_key_with_flags(key, DeleteKeyFlags::empty())
    }

    /// Deletes the public and secret key without asking for confirmation.
    #[inline]
    pub fn delete_secret_key(&mut self, key: &Key) -> Result<()> {
        self.delete_key_with_flags(key, DeleteKeyFlags::ALLOW_SECRET | DeleteKeyFlags::FORCE)
    }

    /// Edits `key` interactively, answering each prompt of the engine through `interactor`.
    /// Diagnostic output of the engine is written to `output`.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_interact`](https://www.gnupg.org/documentation/manuals/gpgme/Advanced-Key-Editing.html#index-gpgme_005fop_005finteract)
    #[inline]
    pub fn interact<'a, I>(
        &mut self, key: &Key, interactor: I, output: impl IntoData<'a>,
    ) -> Result<()>
    where I: Interactor {
        self.interact_with_flags(key, 0, interactor, output)
    }

    /// Like [`Context::interact`], but edits the smartcard holding `key` instead of the key.
    #[inline]
    pub fn interact_with_card<'a, I>(
        &mut self, key: &Key, interactor: I, output: impl IntoData<'a>,
    ) -> Result<()>
    where I: Interactor {
        self.interact_with_flags(key, ffi::GPGME_INTERACT_CARD, interactor, output)
    }

    fn interact_with_flags<'a, I>(
        &mut self, key: &Key, flags: libc::c_uint, interactor: I, output: impl IntoData<'a>,
    ) -> Result<()>
    where I: Interactor {
        let mut output = output.into_data()?;
        let output: &mut Data<'_> = output.borrow_mut();
        let mut hook = Hook::from(interactor);
        debug!(card = flags != 0, "starting interactive edit");
        let result = unsafe {
            check(ffi::gpgme_op_interact(
                self.as_raw(),
                key.as_raw(),
                flags,
                Some(callbacks::interact_cb::<I>),
                ptr::addr_of_mut!(hook).cast(),
                output.as_raw(),
            ))
        };
        let callback = hook.take_failure().or_else(|| self.callback_failure());
        result.map_err(|err| Error::Backend(callback.unwrap_or(err)))
    }

    /// Adds a user ID to `key`, self-signed with its primary key.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_adduid`](https://www.gnupg.org/documentation/manuals/gpgme/Generating-Keys.html#index-gpgme_005fop_005fadduid)
    pub fn add_uid(&mut self, key: &Key, user_id: impl CStrArgument) -> Result<()> {
        let user_id = user_id.try_into_cstr()?;
        debug!(user_id = %user_id.as_ref().to_string_lossy(), "adding user id");
        let result = unsafe {
            check(ffi::gpgme_op_adduid(self.as_raw(), key.as_raw(), user_id.as_ref().as_ptr(), 0))
        };
        let callback = self.callback_failure();
        result.map_err(|err| Error::Backend(callback.unwrap_or(err)))
    }

    /// Revokes the user ID of `key` that matches `user_id` exactly.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_revuid`](https://www.gnupg.org/documentation/manuals/gpgme/Generating-Keys.html#index-gpgme_005fop_005frevuid)
    pub fn revoke_uid(&mut self, key: &Key, user_id: impl CStrArgument) -> Result<()> {
        let user_id = user_id.try_into_cstr()?;
        debug!(user_id = %user_id.as_ref().to_string_lossy(), "revoking user id");
        let result = unsafe {
            check(ffi::gpgme_op_revuid(self.as_raw(), key.as_raw(), user_id.as_ref().as_ptr(), 0))
        };
        let callback = self.callback_failure();
        result.map_err(|err| Error::Backend(callback.unwrap_or(err)))
    }

    /// Imports every key found in `key_data`.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_import`](https://www.gnupg.org/documentation/manuals/gpgme/Importing-Keys.html#index-gpgme_005fop_005fimport)
    pub fn import<'a>(&mut self, key_data: impl IntoData<'a>) -> Result<ImportResult> {
        let mut key_data = key_data.into_data()?;
        let key_data: &mut Data<'_> = key_data.borrow_mut();
        debug!("importing keys");
        let result = unsafe { check(ffi::gpgme_op_import(self.as_raw(), key_data.as_raw())) };
        let callback = self.callback_failure();
        result.map_err(|err| callback.unwrap_or(err))?;
        let result: ImportResult = self.result()?;
        debug!(
            considered = result.considered(),
            imported = result.imported(),
            unchanged = result.unchanged(),
            "import finished"
        );
        Ok(result)
    }

    /// Exports the keys matching any of `patterns`; no patterns exports every key.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_export_ext`](https://www.gnupg.org/documentation/manuals/gpgme/Exporting-Keys.html#index-gpgme_005fop_005fexport_005fext)
    pub fn export<'a, I>(
        &mut self, patterns: I, mode: ExportMode, key_data: impl IntoData<'a>,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: CStrArgument, {
        let patterns = patterns
            .into_iter()
            .map(|s| s.try_into_cstr())
            .collect::<std::result::Result<SmallVec<_>, _>>()?;
        let mut ptrs: SmallVec<*const libc::c_char> =
            patterns.iter().map(|s| s.as_ref().as_ptr()).collect();
        let ptrs = if ptrs.is_empty() {
            ptr::null_mut()
        } else {
            ptrs.push(ptr::null());
            ptrs.as_mut_ptr()
        };
        let mut key_data = key_data.into_data()?;
        let key_data: &mut Data<'_> = key_data.borrow_mut();
        debug!(patterns = patterns.len(), ?mode, "exporting keys");
        let result = unsafe {
            check(ffi::gpgme_op_export_ext(
                self.as_raw(),
                ptrs,
                mode.bits(),
                key_data.as_raw(),
            ))
        };
        let callback = self.callback_failure();
        result.map_err(|err| callback.unwrap_or(err))?;
        Ok(())
    }

    #[inline]
    pub fn export_all<'a>(&mut self, mode: ExportMode, key_data: impl IntoData<'a>) -> Result<()> {
        self.export(None::<&CStr>, mode, key_data)
    }

    /// Upstream documentation:
    /// [`gpgme_op_export_keys`](https://www.gnupg.org/documentation/manuals/gpgme/Exporting-Keys.html#index-gpgme_005fop_005fexport_005fkeys)
    pub fn export_keys<'k, 'a, I>(
        &mut self, keys: I, mode: ExportMode, key_data: impl IntoData<'a>,
    ) -> Result<()>
    where I: IntoIterator<Item = &'k Key> {
        let mut keys = utils::key_array(keys);
        let keys_ptr = keys.as_mut().map_or(ptr::null_mut(), |k| k.as_mut_ptr());
        let mut key_data = key_data.into_data()?;
        let key_data: &mut Data<'_> = key_data.borrow_mut();
        debug!(?mode, "exporting selected keys");
        let result = unsafe {
            check(ffi::gpgme_op_export_keys(
                self.as_raw(),
                keys_ptr,
                mode.bits(),
                key_data.as_raw(),
            ))
        };
        let callback = self.callback_failure();
        result.map_err(|err| callback.unwrap_or(err))?;
        Ok(())
    }

    pub fn clear_signers(&mut self) {
        unsafe { ffi::gpgme_signers_clear(self.as_raw()) }
    }

    /// Adds `key` to the keys used by signing operations. With no signers the engine's
    /// default key is used.
    ///
    /// Fails with [`SigningFailure::UnusableSigner`] if the key cannot sign.
    pub fn add_signer(&mut self, key: &Key) -> Result<()> {
        if !key.can_sign() {
            debug!(fingerprint = ?key.fingerprint().ok(), "rejecting signer without signing capability");
            return Err(Error::Signing {
                reason: SigningFailure::UnusableSigner,
                invalid_signers: vec![InvalidKey {
                    fingerprint: key.fingerprint().ok().map(str::to_owned),
                    reason: NativeError::UNUSABLE_SECKEY,
                }],
                source: NativeError::UNUSABLE_SECKEY,
            });
        }
        unsafe {
            return_err!(ffi::gpgme_signers_add(self.as_raw(), key.as_raw()));
        }
        Ok(())
    }

    #[inline]
    pub fn signers(&self) -> Signers<'_> {
        Signers {
            ctx: self,
            current: Some(0),
        }
    }

    /// Signs `plaintext`, writing the result to `signature`.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_sign`](https://www.gnupg.org/documentation/manuals/gpgme/Creating-a-Signature.html#index-gpgme_005fop_005fsign)
    pub fn sign<'p, 's>(
        &mut self, mode: SignMode, plaintext: impl IntoData<'p>, signature: impl IntoData<'s>,
    ) -> Result<SigningResult> {
        let mut plaintext = plaintext.into_data()?;
        let plaintext: &mut Data<'_> = plaintext.borrow_mut();
        let mut signature = signature.into_data()?;
        let signature: &mut Data<'_> = signature.borrow_mut();
        debug!(?mode, "signing");
        let result = unsafe {
            check(ffi::gpgme_op_sign(
                self.as_raw(),
                plaintext.as_raw(),
                signature.as_raw(),
                mode.raw(),
            ))
        };
        let callback = self.callback_failure();
        if let Err(err) = result {
            return Err(error::signing(err, callback, self.invalid_signers()));
        }
        self.result()
    }

    #[inline]
    pub fn sign_normal<'p, 's>(
        &mut self, plaintext: impl IntoData<'p>, signed: impl IntoData<'s>,
    ) -> Result<SigningResult> {
        self.sign(SignMode::Normal, plaintext, signed)
    }

    #[inline]
    pub fn sign_detached<'p, 's>(
        &mut self, plaintext: impl IntoData<'p>, signature: impl IntoData<'s>,
    ) -> Result<SigningResult> {
        self.sign(SignMode::Detached, plaintext, signature)
    }

    #[inline]
    pub fn sign_clear<'p, 's>(
        &mut self, plaintext: impl IntoData<'p>, signed: impl IntoData<'s>,
    ) -> Result<SigningResult> {
        self.sign(SignMode::Clear, plaintext, signed)
    }

    /// Checks the signatures in `signature`.
    ///
    /// For a detached signature pass the signed text as `signed_text`; for an opaque or
    /// cleartext signature pass a buffer for the recovered text as `plaintext`. Bad
    /// signatures are reported in the result, not as an error.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_verify`](https://www.gnupg.org/documentation/manuals/gpgme/Verify.html#index-gpgme_005fop_005fverify)
    pub fn verify<'s>(
        &mut self, signature: impl IntoData<'s>, signed_text: Option<&mut Data<'_>>,
        plaintext: Option<&mut Data<'_>>,
    ) -> Result<VerificationResult> {
        let mut signature = signature.into_data()?;
        let signature: &mut Data<'_> = signature.borrow_mut();
        let signed_text = signed_text.map_or(ptr::null_mut(), |d| d.as_raw());
        let plaintext = plaintext.map_or(ptr::null_mut(), |d| d.as_raw());
        debug!(detached = !signed_text.is_null(), "verifying");
        let result = unsafe {
            check(ffi::gpgme_op_verify(
                self.as_raw(),
                signature.as_raw(),
                signed_text,
                plaintext,
            ))
        };
        let callback = self.callback_failure();
        result.map_err(|err| callback.unwrap_or(err))?;
        let result: VerificationResult = self.result()?;
        debug!(signatures = result.signatures().count(), "verification finished");
        Ok(result)
    }

    #[inline]
    pub fn verify_detached<'s, 't>(
        &mut self, signature: impl IntoData<'s>, signed_text: impl IntoData<'t>,
    ) -> Result<VerificationResult> {
        let mut signed_text = signed_text.into_data()?;
        let signed_text: &mut Data<'_> = signed_text.borrow_mut();
        self.verify(signature, Some(signed_text), None)
    }

    #[inline]
    pub fn verify_opaque<'s, 'p>(
        &mut self, signature: impl IntoData<'s>, plaintext: impl IntoData<'p>,
    ) -> Result<VerificationResult> {
        let mut plaintext = plaintext.into_data()?;
        let plaintext: &mut Data<'_> = plaintext.borrow_mut();
        self.verify(signature, None, Some(plaintext))
    }

    /// Collects the recipients that cannot encrypt, before anything is sent to the engine.
    fn check_recipients(recipients: &[&Key]) -> Result<()> {
        let unusable: Vec<_> = recipients
            .iter()
            .filter(|k| !k.can_encrypt())
            .map(|k| InvalidKey {
                fingerprint: k.fingerprint().ok().map(str::to_owned),
                reason: NativeError::UNUSABLE_PUBKEY,
            })
            .collect();
        if unusable.is_empty() {
            return Ok(());
        }
        debug!(
            unusable = unusable.len(),
            "recipients without encryption capability"
        );
        Err(Error::InvalidRecipients {
            recipients: unusable,
        })
    }

    /// Encrypts `plaintext` for `recipients`, writing the result to `ciphertext`.
    ///
    /// Every recipient must be able to encrypt; otherwise [`Error::InvalidRecipients`] is
    /// returned and the engine is never invoked.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_encrypt`](https://www.gnupg.org/documentation/manuals/gpgme/Encrypting-a-Plaintext.html#index-gpgme_005fop_005fencrypt)
    #[inline]
    pub fn encrypt<'k, 'p, 'c, I>(
        &mut self, recipients: I, plaintext: impl IntoData<'p>, ciphertext: impl IntoData<'c>,
    ) -> Result<EncryptionResult>
    where I: IntoIterator<Item = &'k Key> {
        self.encrypt_with_flags(recipients, EncryptFlags::empty(), plaintext, ciphertext)
    }

    pub fn encrypt_with_flags<'k, 'p, 'c, I>(
        &mut self, recipients: I, flags: EncryptFlags, plaintext: impl IntoData<'p>,
        ciphertext: impl IntoData<'c>,
    ) -> Result<EncryptionResult>
    where I: IntoIterator<Item = &'k Key> {
        let recipients: SmallVec<&Key> = recipients.into_iter().collect();
        Self::check_recipients(&recipients)?;
        let mut keys = utils::key_array(recipients.iter().copied());
        let keys_ptr = keys.as_mut().map_or(ptr::null_mut(), |k| k.as_mut_ptr());
        let mut plaintext = plaintext.into_data()?;
        let plaintext: &mut Data<'_> = plaintext.borrow_mut();
        let mut ciphertext = ciphertext.into_data()?;
        let ciphertext: &mut Data<'_> = ciphertext.borrow_mut();
        debug!(recipients = recipients.len(), ?flags, "encrypting");
        let result = unsafe {
            check(ffi::gpgme_op_encrypt(
                self.as_raw(),
                keys_ptr,
                flags.bits(),
                plaintext.as_raw(),
                ciphertext.as_raw(),
            ))
        };
        let callback = self.callback_failure();
        if let Err(err) = result {
            if let Some(err) = callback {
                return Err(Error::Backend(err));
            }
            let invalid = self
                .result::<EncryptionResult>()
                .map(|r| r.invalid_recipients().map(InvalidKey::from).collect())
                .unwrap_or_default();
            return Err(error::encryption(
                err,
                flags.contains(EncryptFlags::ALWAYS_TRUST),
                invalid,
            ));
        }
        self.result()
    }

    /// Encrypts with a passphrase only, which is requested through the passphrase provider
    /// (or pinentry).
    #[inline]
    pub fn encrypt_symmetric<'p, 'c>(
        &mut self, plaintext: impl IntoData<'p>, ciphertext: impl IntoData<'c>,
    ) -> Result<()> {
        self.encrypt_symmetric_with_flags(EncryptFlags::empty(), plaintext, ciphertext)
    }

    pub fn encrypt_symmetric_with_flags<'p, 'c>(
        &mut self, flags: EncryptFlags, plaintext: impl IntoData<'p>,
        ciphertext: impl IntoData<'c>,
    ) -> Result<()> {
        self.encrypt_with_flags(
            None::<&Key>,
            flags | EncryptFlags::SYMMETRIC,
            plaintext,
            ciphertext,
        )?;
        Ok(())
    }

    /// Signs with the context's signers and encrypts for `recipients` in one pass.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_encrypt_sign`](https://www.gnupg.org/documentation/manuals/gpgme/Encrypting-a-Plaintext.html#index-gpgme_005fop_005fencrypt_005fsign)
    #[inline]
    pub fn sign_and_encrypt<'k, 'p, 'c, I>(
        &mut self, recipients: I, plaintext: impl IntoData<'p>, ciphertext: impl IntoData<'c>,
    ) -> Result<(EncryptionResult, SigningResult)>
    where I: IntoIterator<Item = &'k Key> {
        self.sign_and_encrypt_with_flags(recipients, EncryptFlags::empty(), plaintext, ciphertext)
    }

    pub fn sign_and_encrypt_with_flags<'k, 'p, 'c, I>(
        &mut self, recipients: I, flags: EncryptFlags, plaintext: impl IntoData<'p>,
        ciphertext: impl IntoData<'c>,
    ) -> Result<(EncryptionResult, SigningResult)>
    where I: IntoIterator<Item = &'k Key> {
        let recipients: SmallVec<&Key> = recipients.into_iter().collect();
        Self::check_recipients(&recipients)?;
        let mut keys = utils::key_array(recipients.iter().copied());
        let keys_ptr = keys.as_mut().map_or(ptr::null_mut(), |k| k.as_mut_ptr());
        let mut plaintext = plaintext.into_data()?;
        let plaintext: &mut Data<'_> = plaintext.borrow_mut();
        let mut ciphertext = ciphertext.into_data()?;
        let ciphertext: &mut Data<'_> = ciphertext.borrow_mut();
        debug!(recipients = recipients.len(), ?flags, "signing and encrypting");
        let result = unsafe {
            check(ffi::gpgme_op_encrypt_sign(
                self.as_raw(),
                keys_ptr,
                flags.bits(),
                plaintext.as_raw(),
                ciphertext.as_raw(),
            ))
        };
        let callback = self.callback_failure();
        if let Err(err) = result {
            let invalid_signers = self.invalid_signers();
            if callback.is_some() || !invalid_signers.is_empty() || error::is_signing_code(err) {
                return Err(error::signing(err, callback, invalid_signers));
            }
            let invalid = self
                .result::<EncryptionResult>()
                .map(|r| r.invalid_recipients().map(InvalidKey::from).collect())
                .unwrap_or_default();
            return Err(error::encryption(
                err,
                flags.contains(EncryptFlags::ALWAYS_TRUST),
                invalid,
            ));
        }
        Ok((self.result()?, self.result()?))
    }

    /// Decrypts `ciphertext`, writing the recovered plaintext to `plaintext`.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_decrypt`](https://www.gnupg.org/documentation/manuals/gpgme/Decrypt.html#index-gpgme_005fop_005fdecrypt)
    pub fn decrypt<'c, 'p>(
        &mut self, ciphertext: impl IntoData<'c>, plaintext: impl IntoData<'p>,
    ) -> Result<DecryptionResult> {
        let mut ciphertext = ciphertext.into_data()?;
        let ciphertext: &mut Data<'_> = ciphertext.borrow_mut();
        let mut plaintext = plaintext.into_data()?;
        let plaintext: &mut Data<'_> = plaintext.borrow_mut();
        debug!("decrypting");
        let result = unsafe {
            check(ffi::gpgme_op_decrypt(
                self.as_raw(),
                ciphertext.as_raw(),
                plaintext.as_raw(),
            ))
        };
        self.finish_decryption(result)?;
        self.result()
    }

    /// Decrypts `ciphertext` and checks any signatures inside it.
    ///
    /// Upstream documentation:
    /// [`gpgme_op_decrypt_verify`](https://www.gnupg.org/documentation/manuals/gpgme/Decrypt-and-Verify.html#index-gpgme_005fop_005fdecrypt_005fverify)
    pub fn decrypt_and_verify<'c, 'p>(
        &mut self, ciphertext: impl IntoData<'c>, plaintext: impl IntoData<'p>,
    ) -> Result<(DecryptionResult, VerificationResult)> {
        let mut ciphertext = ciphertext.into_data()?;
        let ciphertext: &mut Data<'_> = ciphertext.borrow_mut();
        let mut plaintext = plaintext.into_data()?;
        let plaintext: &mut Data<'_> = plaintext.borrow_mut();
        debug!("decrypting and verifying");
        let result = unsafe {
            check(ffi::gpgme_op_decrypt_verify(
                self.as_raw(),
                ciphertext.as_raw(),
                plaintext.as_raw(),
            ))
        };
        self.finish_decryption(result)?;
        Ok((self.result()?, self.result()?))
    }

    fn finish_decryption(&mut self, result: std::result::Result<(), NativeError>) -> Result<()> {
        let callback = self.callback_failure();
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                let recipients = self
                    .result::<DecryptionResult>()
                    .ok()
                    .and_then(|r| r.recipient_failure());
                Err(error::decryption(err, callback, recipients))
            }
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("raw", &self.as_raw())
            .field("protocol", &self.protocol())
            .field("armor", &self.armor())
            .field("text_mode", &self.text_mode())
            .field("key_list_mode", &self.key_list_mode())
            .field("pinentry_mode", &self.pinentry_mode())
            .field("passphrase_provider", &self.passphrase_hook.is_some())
            .field("engine", &self.current_engine())
            .finish()
    }
}

/// An ongoing key listing. Each item is a key or the error that interrupted the listing.
///
/// Dropping the iterator ends the listing; [`finish`](Keys::finish) does the same and
/// reports whether it was truncated.
pub struct Keys<'ctx> {
    ctx: &'ctx mut Context,
}

impl<'ctx> Keys<'ctx> {
    fn new<I>(ctx: &'ctx mut Context, patterns: I, secret_only: bool) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: CStrArgument, {
        let patterns = patterns
            .into_iter()
            .map(|s| s.try_into_cstr())
            .collect::<std::result::Result<SmallVec<_>, _>>()?;
        let mut ptrs: SmallVec<*const libc::c_char> =
            patterns.iter().map(|s| s.as_ref().as_ptr()).collect();
        let ptrs = if ptrs.is_empty() {
            ptr::null_mut()
        } else {
            ptrs.push(ptr::null());
            ptrs.as_mut_ptr()
        };
        debug!(patterns = patterns.len(), secret_only, "listing keys");
        unsafe {
            return_err!(ffi::gpgme_op_keylist_ext_start(
                ctx.as_raw(),
                ptrs,
                flag(secret_only),
                0
            ));
        }
        Ok(Keys { ctx })
    }

    pub fn finish(self) -> Result<KeyListResult> {
        let this = ManuallyDrop::new(self);
        unsafe {
            return_err!(ffi::gpgme_op_keylist_end(this.ctx.as_raw()));
        }
        this.ctx.result()
    }
}

impl Drop for Keys<'_> {
    #[inline]
    fn drop(&mut self) {
        unsafe {
            ffi::gpgme_op_keylist_end(self.ctx.as_raw());
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = Result<Key>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        unsafe {
            let mut key = ptr::null_mut();
            match check(ffi::gpgme_op_keylist_next(self.ctx.as_raw(), &mut key)) {
                Ok(()) if !key.is_null() => Some(Ok(Key::from_raw(key))),
                Ok(()) => None,
                Err(err) if err.code() == NativeError::EOF.code() => None,
                Err(err) => Some(Err(err.into())),
            }
        }
    }
}

impl fmt::Debug for Keys<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys").field("ctx", &self.ctx.as_raw()).finish()
    }
}

/// The keys a context signs with.
#[derive(Clone)]
pub struct Signers<'ctx> {
    ctx: &'ctx Context,
    current: Option<libc::c_int>,
}

impl Iterator for Signers<'_> {
    type Item = Key;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        unsafe {
            self.current.and_then(|x| {
                match ffi::gpgme_signers_enum(self.ctx.as_raw(), x).as_mut() {
                    Some(key) => {
                        self.current = x.checked_add(1);
                        Some(Key::from_raw(key))
                    }
                    None => {
                        self.current = None;
                        None
                    }
                }
            })
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = unsafe { ffi::gpgme_signers_count(self.ctx.as_raw()) };
        let remaining = match self.current {
            Some(x) => usize::try_from(count)
                .unwrap_or(usize::MAX)
                .saturating_sub(usize::try_from(x).unwrap_or(0)),
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl FusedIterator for Signers<'_> {}

impl fmt::Debug for Signers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
