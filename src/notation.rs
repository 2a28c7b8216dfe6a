use std::{fmt, marker::PhantomData};

use ffi;

use crate::{NonNull, SignatureNotationFlags};

/// A notation (or policy URL, when it has no name) attached to a signature.
///
/// Upstream documentation:
/// [`gpgme_sig_notation_t`](https://www.gnupg.org/documentation/manuals/gpgme/Verify.html#index-gpgme_005fsig_005fnotation_005ft)
#[derive(Copy, Clone)]
pub struct SignatureNotation<'a>(NonNull<ffi::gpgme_sig_notation_t>, PhantomData<&'a ()>);

unsafe impl Send for SignatureNotation<'_> {}
unsafe impl Sync for SignatureNotation<'_> {}

impl<'a> SignatureNotation<'a> {
    impl_wrapper!(ffi::gpgme_sig_notation_t, PhantomData);

    bit_field! {
        is_human_readable => human_readable,
        is_critical => critical,
    }

    #[inline]
    pub fn flags(&self) -> SignatureNotationFlags {
        unsafe { SignatureNotationFlags::from_bits_retain((*self.as_raw()).flags) }
    }

    str_field! { 'a;
        name, name_raw => name;
        value, value_raw => value;
    }

    /// Policy URLs are stored as notations without a name.
    #[inline]
    pub fn is_policy_url(&self) -> bool {
        self.name_raw().is_none()
    }
}

impl fmt::Debug for SignatureNotation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureNotation")
            .field("raw", &self.as_raw())
            .field("name", &self.name_raw())
            .field("value", &self.value_raw())
            .field("critical", &self.is_critical())
            .field("human_readable", &self.is_human_readable())
            .finish()
    }
}

impl_list_iterator!(pub struct SignatureNotations(SignatureNotation: ffi::gpgme_sig_notation_t));
