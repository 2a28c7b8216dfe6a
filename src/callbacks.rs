use std::{
    ffi::CStr,
    io::prelude::*,
    panic::{self, AssertUnwindSafe},
    str::Utf8Error,
    thread,
};

use ffi;
use libc;
use static_assertions::assert_obj_safe;
use tracing::trace;
use zeroize::Zeroizing;

use crate::{utils::FdWriter, NativeError};

assert_obj_safe!(PassphraseProvider);
assert_obj_safe!(ProgressReporter);
assert_obj_safe!(Interactor);

/// Supplies passphrases for secret keys while an operation runs.
///
/// The provider is invoked synchronously on the thread that started the operation, once for
/// every secret key the engine needs to unlock (and again after a rejected attempt).
/// Returning `Err` aborts the operation; the error is reported back as
/// [`DecryptionFailure::PassphraseCallback`](crate::DecryptionFailure::PassphraseCallback) or
/// [`SigningFailure::PassphraseCallback`](crate::SigningFailure::PassphraseCallback).
///
/// With GnuPG 2.1 and later the engine only asks the provider when the context's pinentry
/// mode is [`Loopback`](crate::PinentryMode::Loopback).
///
/// Upstream documentation:
/// [`gpgme_passphrase_cb_t`](https://www.gnupg.org/documentation/manuals/gpgme/Passphrase-Callback.html#index-gpgme_005fpassphrase_005fcb_005ft)
pub trait PassphraseProvider: Send {
    /// `key_hint` identifies the key, usually as its key id followed by the primary user ID.
    fn provide_passphrase(
        &mut self, key_hint: Option<&str>, prior_attempt_failed: bool,
    ) -> Result<Zeroizing<Vec<u8>>, NativeError>;
}

impl<F> PassphraseProvider for F
where F: FnMut(Option<&str>, bool) -> Result<Zeroizing<Vec<u8>>, NativeError> + Send
{
    fn provide_passphrase(
        &mut self, key_hint: Option<&str>, prior_attempt_failed: bool,
    ) -> Result<Zeroizing<Vec<u8>>, NativeError> {
        (*self)(key_hint, prior_attempt_failed)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ProgressInfo<'a> {
    what: Option<&'a CStr>,
    pub typ: i64,
    pub current: i64,
    pub total: i64,
}

impl<'a> ProgressInfo<'a> {
    pub fn what(&self) -> Result<&'a str, Option<Utf8Error>> {
        self.what.map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    pub fn what_raw(&self) -> Option<&'a CStr> {
        self.what
    }
}

/// Upstream documentation:
/// [`gpgme_progress_cb_t`](https://www.gnupg.org/documentation/manuals/gpgme/Progress-Meter-Callback.html#index-gpgme_005fprogress_005fcb_005ft)
pub trait ProgressReporter: Send {
    fn report(&mut self, info: ProgressInfo<'_>);
}

impl<F> ProgressReporter for F
where F: FnMut(ProgressInfo<'_>) + Send
{
    fn report(&mut self, info: ProgressInfo<'_>) {
        (*self)(info);
    }
}

/// A status line the engine emitted during an interactive key edit.
#[derive(Debug, Copy, Clone)]
pub struct InteractionStatus<'a> {
    keyword: Option<&'a CStr>,
    args: Option<&'a CStr>,
}

impl<'a> InteractionStatus<'a> {
    /// The status keyword, e.g. `GET_LINE` or `GET_BOOL`.
    pub fn keyword(&self) -> Result<&'a str, Option<Utf8Error>> {
        self.keyword.map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    pub fn keyword_raw(&self) -> Option<&'a CStr> {
        self.keyword
    }

    /// For prompts, the name of the value asked for, e.g. `keyedit.prompt`.
    pub fn args(&self) -> Result<&'a str, Option<Utf8Error>> {
        self.args.map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    pub fn args_raw(&self) -> Option<&'a CStr> {
        self.args
    }
}

/// Drives an interactive key edit (`gpg --edit-key`) one status line at a time.
///
/// `response` is `Some` when the engine expects an answer. Whatever is written to it is sent
/// as one line; the terminating newline is added by the binding. Returning `Err` aborts the
/// edit.
///
/// Upstream documentation:
/// [`gpgme_interact_cb_t`](https://www.gnupg.org/documentation/manuals/gpgme/Advanced-Key-Editing.html#index-gpgme_005finteract_005fcb_005ft)
pub trait Interactor: Send {
    fn interact(
        &mut self, status: InteractionStatus<'_>, response: Option<&mut dyn Write>,
    ) -> Result<(), NativeError>;
}

impl<F> Interactor for F
where F: FnMut(InteractionStatus<'_>, Option<&mut dyn Write>) -> Result<(), NativeError> + Send
{
    fn interact(
        &mut self, status: InteractionStatus<'_>, response: Option<&mut dyn Write>,
    ) -> Result<(), NativeError> {
        (*self)(status, response)
    }
}

/// Owns a callback object handed to the native library and remembers how its last
/// invocations ended.
pub(crate) struct Hook<T> {
    inner: Option<thread::Result<T>>,
    failure: Option<NativeError>,
}

impl<T> From<T> for Hook<T> {
    fn from(hook: T) -> Self {
        Self {
            inner: Some(Ok(hook)),
            failure: None,
        }
    }
}

impl<T> Hook<T> {
    /// Returns the error the callback raised since the last check, if any.
    ///
    /// A panic caught inside the callback is resumed here, on the caller's thread.
    pub fn take_failure(&mut self) -> Option<NativeError> {
        if let Some(Err(_)) = self.inner {
            if let Some(Err(payload)) = self.inner.take() {
                panic::resume_unwind(payload);
            }
        }
        self.failure.take()
    }

    pub fn into_inner(mut self) -> Option<T> {
        match self.inner.take() {
            Some(Ok(hook)) => Some(hook),
            Some(Err(payload)) => panic::resume_unwind(payload),
            None => None,
        }
    }
}

pub(crate) type PassphraseHook = Hook<Box<dyn PassphraseProvider>>;
pub(crate) type ProgressHook = Hook<Box<dyn ProgressReporter>>;

fn update_hook<T, F>(hook: &mut Hook<T>, f: F) -> ffi::gpgme_error_t
where F: FnOnce(&mut T) -> Result<(), NativeError> {
    let mut provider = match hook.inner.take() {
        Some(Ok(p)) => p,
        other => {
            hook.inner = other;
            return NativeError::GENERAL.raw();
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(move || {
        let result = f(&mut provider);
        (provider, result)
    })) {
        Ok((provider, result)) => {
            hook.inner = Some(Ok(provider));
            match result {
                Ok(()) => 0,
                Err(err) => {
                    let err = if err == NativeError::NO_ERROR {
                        NativeError::CANCELED
                    } else {
                        err
                    };
                    hook.failure = Some(err);
                    err.raw()
                }
            }
        }
        Err(err) => {
            hook.inner = Some(Err(err));
            NativeError::GENERAL.raw()
        }
    }
}

pub(crate) extern "C" fn passphrase_cb(
    hook: *mut libc::c_void, uid_hint: *const libc::c_char, _info: *const libc::c_char,
    was_bad: libc::c_int, fd: libc::c_int,
) -> ffi::gpgme_error_t {
    let hook = unsafe { &mut *(hook as *mut PassphraseHook) };
    update_hook(hook, move |p| {
        let hint = unsafe { uid_hint.as_ref().map(|s| CStr::from_ptr(s).to_string_lossy()) };
        trace!(hint = ?hint, prior_attempt_failed = was_bad != 0, "passphrase requested");
        let passphrase = p.provide_passphrase(hint.as_deref(), was_bad != 0)?;
        let mut writer = FdWriter::new(fd);
        writer
            .write_all(&passphrase)
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(NativeError::from)
    })
}

pub(crate) extern "C" fn progress_cb(
    hook: *mut libc::c_void, what: *const libc::c_char, typ: libc::c_int, current: libc::c_int,
    total: libc::c_int,
) {
    let hook = unsafe { &mut *(hook as *mut ProgressHook) };
    update_hook(hook, move |h| {
        let info = ProgressInfo {
            what: unsafe { what.as_ref().map(|s| CStr::from_ptr(s)) },
            typ: typ.into(),
            current: current.into(),
            total: total.into(),
        };
        h.report(info);
        Ok(())
    });
}

pub(crate) extern "C" fn interact_cb<I: Interactor>(
    hook: *mut libc::c_void, keyword: *const libc::c_char, args: *const libc::c_char,
    fd: libc::c_int,
) -> ffi::gpgme_error_t {
    let hook = unsafe { &mut *(hook as *mut Hook<I>) };
    update_hook(hook, move |h| {
        let status = InteractionStatus {
            keyword: unsafe { keyword.as_ref().map(|s| CStr::from_ptr(s)) },
            args: unsafe { args.as_ref().map(|s| CStr::from_ptr(s)) },
        };
        trace!(keyword = ?status.keyword_raw(), args = ?status.args_raw(), "edit status");
        if fd < 0 {
            return h.interact(status, None);
        }
        let mut writer = FdWriter::new(fd);
        h.interact(status, Some(&mut writer))?;
        writer.write_all(b"\n").map_err(NativeError::from)
    })
}

#[cfg(test)]
mod tests {
    use std::{
        ptr,
        sync::{Arc, Mutex},
    };

    use super::*;

    fn hook_for<F>(provider: F) -> PassphraseHook
    where F: FnMut(Option<&str>, bool) -> Result<Zeroizing<Vec<u8>>, NativeError> + Send + 'static
    {
        Hook::from(Box::new(provider) as Box<dyn PassphraseProvider>)
    }

    #[test]
    fn provider_errors_are_recorded() {
        let mut hook = hook_for(|_, _| Err(NativeError::CANCELED));
        let code = update_hook(&mut hook, |p| p.provide_passphrase(None, false).map(drop));
        assert_eq!(NativeError::new(code), NativeError::CANCELED);
        assert_eq!(hook.take_failure(), Some(NativeError::CANCELED));
        assert_eq!(hook.take_failure(), None);
    }

    #[test]
    fn successful_calls_leave_no_failure() {
        let mut seen = Vec::new();
        let mut hook = hook_for(move |hint, retry| {
            seen.push((hint.map(str::to_owned), retry));
            Ok(Zeroizing::new(b"abc".to_vec()))
        });
        let code = update_hook(&mut hook, |p| {
            let secret = p.provide_passphrase(Some("2D727CC768697734 Alfa"), true)?;
            assert_eq!(&secret[..], b"abc");
            Ok(())
        });
        assert_eq!(code, 0);
        assert_eq!(hook.take_failure(), None);
    }

    #[test]
    fn interactor_errors_abort_and_are_recorded() {
        let mut hook = Hook::from(
            |status: InteractionStatus<'_>, _: Option<&mut dyn Write>| -> Result<(), NativeError> {
                match status.args() {
                    Ok("keyedit.prompt") => Err(NativeError::NO_ERROR),
                    _ => Ok(()),
                }
            },
        );
        let status = InteractionStatus {
            keyword: Some(c"GET_LINE"),
            args: Some(c"keyedit.prompt"),
        };
        let code = update_hook(&mut hook, |i| i.interact(status, None));
        assert_eq!(NativeError::new(code), NativeError::CANCELED);
        assert_eq!(hook.take_failure(), Some(NativeError::CANCELED));

        let other = InteractionStatus {
            keyword: Some(c"GOT_IT"),
            args: None,
        };
        assert_eq!(update_hook(&mut hook, |i| i.interact(other, None)), 0);
        assert_eq!(other.args(), Err(None));
    }

    #[test]
    fn passphrase_is_written_with_retry_flag() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let flags = seen.clone();
        let mut hook = hook_for(move |hint, retry| {
            assert_eq!(hint, Some("2D727CC768697734 Alfa"));
            flags.lock().unwrap().push(retry);
            Ok(Zeroizing::new(b"abc".to_vec()))
        });
        let code = passphrase_cb(
            ptr::addr_of_mut!(hook).cast(),
            c"2D727CC768697734 Alfa".as_ptr(),
            ptr::null(),
            1,
            fds[1],
        );
        assert_eq!(code, 0);
        let mut buf = [0u8; 8];
        let read = unsafe { libc::read(fds[0], buf.as_mut_ptr().cast(), buf.len()) };
        assert_eq!(&buf[..read as usize], b"abc\n");
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
        assert_eq!(*seen.lock().unwrap(), [true]);
    }

    #[test]
    fn panics_are_resumed_on_check() {
        let mut hook = hook_for(|_, _| panic!("provider exploded"));
        let code = update_hook(&mut hook, |p| p.provide_passphrase(None, false).map(drop));
        assert_eq!(NativeError::new(code), NativeError::GENERAL);
        let resumed = panic::catch_unwind(AssertUnwindSafe(|| hook.take_failure()));
        assert!(resumed.is_err());
    }
}
