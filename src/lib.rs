//! Typed bindings for the OpenPGP and S/MIME operations of
//! [GPGME](https://www.gnupg.org/software/gpgme/index.html).
//!
//! A [`Context`] holds the configuration (protocol, armor, text mode, key listing mode,
//! passphrase provider) and runs the operations: key lookup and listing, encryption,
//! decryption, signing, verification, key import and export. Inputs and outputs are
//! [`Data`] streams, which most byte containers convert into through [`IntoData`].
//!
//! ```no_run
//! use gpgbind::{Context, Protocol};
//!
//! let mut ctx = Context::from_protocol(Protocol::OpenPgp)?;
//! ctx.set_armor(true);
//! let key = ctx.get_key("A0FF4590BB6122EDEF6E3C542D727CC768697734")?;
//!
//! let mut ciphertext = Vec::new();
//! ctx.encrypt(Some(&key), "Hello World\n", &mut ciphertext)?;
//! # Ok::<(), gpgbind::Error>(())
//! ```
use std::{ffi::CStr, fmt, mem, ptr, str::Utf8Error};

use cstr_argument::CStrArgument;
use once_cell::sync::OnceCell;
use static_assertions::{assert_impl_all, assert_not_impl_any};
use tracing::debug;

#[macro_use]
mod utils;
mod callbacks;
mod context;
mod data;
mod engine;
mod error;
mod flags;
mod keys;
mod notation;
mod results;

pub use crate::{
    callbacks::{
        InteractionStatus, Interactor, PassphraseProvider, ProgressInfo, ProgressReporter,
    },
    context::{Context, Keys, Signers},
    data::{Data, DataEncoding, DataType, IntoData, WrappedError},
    engine::{EngineInfo, EngineInfos},
    error::{
        DecryptionFailure, Error, ErrorKind, InvalidKey, NativeError, Result, SigningFailure,
    },
    flags::{
        CreateKeyFlags, DeleteKeyFlags, EncryptFlags, ExportMode, HashAlgorithm, ImportFlags,
        KeyAlgorithm, KeyListMode, PinentryMode, Protocol, SignMode, SignatureNotationFlags,
        SignatureSummary, Validity,
    },
    keys::{Key, KeySignature, KeySignatures, Subkey, Subkeys, UserId, UserIds},
    notation::{SignatureNotation, SignatureNotations},
    results::{
        DecryptionResult, EncryptionResult, Import, ImportResult, Imports, KeyGenerationResult,
        KeyListResult, NewSignature, NewSignatures, Recipient, Recipients, RejectedKey,
        RejectedKeys, Signature, SignatureStatus, Signatures, SigningResult,
        VerificationResult,
    },
};

assert_impl_all!(Context: Send);
assert_not_impl_any!(Context: Sync);
assert_impl_all!(Key: Send, Sync);
assert_impl_all!(Data<'static>: Send);
assert_impl_all!(VerificationResult: Send, Sync);

/// Names accepted by [`Gpgme::get_dir_info`].
pub mod info {
    pub const HOME_DIR: &str = "homedir";
    pub const SYS_CONF_DIR: &str = "sysconfdir";
    pub const BIN_DIR: &str = "bindir";
    pub const LIB_DIR: &str = "libdir";
    pub const LIBEXEC_DIR: &str = "libexecdir";
    pub const DATA_DIR: &str = "datadir";
    pub const LOCALE_DIR: &str = "localedir";
    pub const AGENT_SOCKET: &str = "agent-socket";
    pub const AGENT_SSH_SOCKET: &str = "agent-ssh-socket";
    pub const DIRMNGR_SOCKET: &str = "dirmngr-socket";
    pub const UISERVER_SOCKET: &str = "uiserver-socket";
    pub const GPGCONF_NAME: &str = "gpgconf-name";
    pub const GPG_NAME: &str = "gpg-name";
    pub const GPGSM_NAME: &str = "gpgsm-name";
    pub const G13_NAME: &str = "g13-name";
}

/// The oldest library release whose interface this crate relies on.
const MIN_VERSION: &[u8] = b"1.13.0\0";

static VERSION: OnceCell<&'static str> = OnceCell::new();

/// Initializes the library once per process and returns a handle to its global state.
///
/// Fails with [`Error::BackendUnavailable`] if the linked library is older than this
/// crate supports. Every constructor in this crate calls it, so calling it explicitly
/// is only needed to query the library itself.
///
/// ```no_run
/// let gpgme = gpgbind::init()?;
/// println!("gpgme {}", gpgme.version());
/// # Ok::<(), gpgbind::Error>(())
/// ```
pub fn init() -> Result<Gpgme> {
    let version = VERSION.get_or_try_init(|| {
        let version = unsafe {
            let offset = mem::offset_of!(ffi::_gpgme_signature, validity);
            let raw = ffi::gpgme_check_version_internal(MIN_VERSION.as_ptr().cast(), offset);
            raw.as_ref().map(|s| CStr::from_ptr(s))
        };
        let version = version
            .ok_or(Error::BackendUnavailable(NativeError::NOT_SUPPORTED))?
            .to_str()
            .map_err(|_| Error::BackendUnavailable(NativeError::INV_VALUE))?;
        debug!(version, "gpgme initialized");
        Ok::<_, Error>(version)
    })?;
    Ok(Gpgme { version })
}

/// A handle to the initialized library.
#[derive(Clone, Copy)]
pub struct Gpgme {
    version: &'static str,
}

impl Gpgme {
    /// The version string of the linked library.
    #[inline]
    pub fn version(&self) -> &'static str {
        self.version
    }

    /// Fails with [`Error::BackendUnavailable`] unless an engine implementing `proto` is
    /// installed and recent enough.
    ///
    /// Upstream documentation:
    /// [`gpgme_engine_check_version`](https://www.gnupg.org/documentation/manuals/gpgme/Engine-Version-Check.html#index-gpgme_005fengine_005fcheck_005fversion)
    pub fn check_engine_version(&self, proto: Protocol) -> Result<()> {
        match NativeError::new(unsafe { ffi::gpgme_engine_check_version(proto.raw()) }) {
            NativeError::NO_ERROR => Ok(()),
            err => Err(error::unavailable(err)),
        }
    }

    /// The engines known to the library with their default settings.
    pub fn engine_info(&self) -> Result<EngineInfos<'static>> {
        unsafe {
            let mut info = ptr::null_mut();
            error::return_err!(ffi::gpgme_get_engine_info(&mut info));
            Ok(EngineInfos::from_list(info))
        }
    }

    /// Looks up one of the directories or file names the library was configured with.
    /// See [`info`] for the accepted names.
    #[inline]
    pub fn get_dir_info(&self, what: impl CStrArgument) -> Result<&'static str, Option<Utf8Error>> {
        self.get_dir_info_raw(what)
            .map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    #[inline]
    pub fn get_dir_info_raw(&self, what: impl CStrArgument) -> Option<&'static CStr> {
        let what = what.try_into_cstr().ok()?;
        unsafe {
            ffi::gpgme_get_dirinfo(what.as_ref().as_ptr())
                .as_ref()
                .map(|s| CStr::from_ptr(s))
        }
    }
}

impl fmt::Debug for Gpgme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gpgme")
            .field("version", &self.version)
            .finish()
    }
}

/// A pointer that is never null.
#[derive(Copy, Clone)]
#[repr(transparent)]
pub(crate) struct NonNull<T>(T);

impl<T> NonNull<*mut T> {
    #[inline(always)]
    pub unsafe fn new_unchecked(raw: *mut T) -> Self {
        NonNull(raw)
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> *mut T {
        self.0
    }
}

impl<T> fmt::Debug for NonNull<*mut T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.0, f)
    }
}

