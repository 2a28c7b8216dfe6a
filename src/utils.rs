use std::{
    io::{self, prelude::*},
    ptr,
};

use ffi;
use libc;

use crate::{Key, NativeError};

macro_rules! impl_wrapper {
    ($T:ty$(, $Args:expr)*) => {
        #[inline]
        pub unsafe fn from_raw(raw: $T) -> Self {
            debug_assert!(!raw.is_null());
            Self($crate::NonNull::<$T>::new_unchecked(raw)$(, $Args)*)
        }

        #[inline]
        pub fn as_raw(&self) -> $T {
            self.0.as_ptr()
        }

        #[inline]
        pub fn into_raw(self) -> $T {
            let raw = self.as_raw();
            ::std::mem::forget(self);
            raw
        }
    };
}

macro_rules! impl_list_iterator {
    ($Vis:vis struct $Name:ident($Item:ident: $Raw:ty)) => {
        #[derive(Clone)]
        $Vis struct $Name<'a>(Option<$Item<'a>>);

        impl $Name<'_> {
            #[inline]
            pub unsafe fn from_list(first: $Raw) -> Self {
                $Name(first.as_mut().map(|r| $Item::from_raw(r)))
            }
        }

        impl<'a> Iterator for $Name<'a> {
            type Item = $Item<'a>;

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                unsafe {
                    self.0.take().inspect(|c| {
                        self.0 = (*c.as_raw()).next.as_mut().map(|r| $Item::from_raw(r));
                    })
                }
            }
        }

        impl ::std::iter::FusedIterator for $Name<'_> {}

        impl ::std::fmt::Debug for $Name<'_> {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_list().entries(self.clone()).finish()
            }
        }
    };
}

macro_rules! ffi_enum_wrapper {
    ($(#[$Attr:meta])* $Vis:vis enum $Name:ident($Default:ident): $T:ty {
        $($(#[$ItemAttr:meta])* $Item:ident = $Value:expr),+ $(,)?
    }) => {
        #[derive(Copy, Clone, Eq, PartialEq, Hash)]
        $(#[$Attr])*
        $Vis enum $Name {
            $($(#[$ItemAttr])* $Item,)+
            $Default($T),
        }

        impl $Name {
            #[inline]
            pub unsafe fn from_raw(raw: $T) -> $Name {
                $(if raw == ($Value as $T) {
                    $Name::$Item
                } else )+ {
                    $Name::$Default(raw)
                }
            }

            #[inline]
            pub fn raw(&self) -> $T {
                match *self {
                    $($Name::$Item => $Value as $T,)+
                    $Name::$Default(raw) => raw,
                }
            }
        }

        impl ::std::fmt::Debug for $Name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match *self {
                    $($Name::$Item => {
                        write!(f, concat!(stringify!($Name), "::", stringify!($Item), "({:?})"),
                            self.raw())
                    })+
                    _ => write!(f, concat!(stringify!($Name), "({:?})"), self.raw()),
                }
            }
        }
    };
    ($(#[$Attr:meta])* $Vis:vis enum $Name:ident: $T:ty {
        $($(#[$ItemAttr:meta])* $Item:ident = $Value:expr),+ $(,)?
    }) => {
        ffi_enum_wrapper! {
            $(#[$Attr])*
            $Vis enum $Name(Other): $T {
                $($(#[$ItemAttr])* $Item = $Value,)+
            }
        }
    };
}

/// Generates a `name`/`name_raw` pair reading a nullable C string field of the wrapped
/// native struct.
macro_rules! str_field {
    ($Lt:lifetime; $($(#[$Attr:meta])* $name:ident, $raw:ident => $field:ident;)+) => {
        $(
            $(#[$Attr])*
            #[inline]
            pub fn $name(&self) -> ::std::result::Result<&$Lt str, Option<::std::str::Utf8Error>> {
                self.$raw().map_or(Err(None), |s| s.to_str().map_err(Some))
            }

            #[inline]
            pub fn $raw(&self) -> Option<&$Lt ::std::ffi::CStr> {
                unsafe {
                    (*self.as_raw())
                        .$field
                        .as_ref()
                        .map(|s| ::std::ffi::CStr::from_ptr(s))
                }
            }
        )+
    };
}

/// Generates boolean getters backed by the bitfield accessors of the wrapped native struct.
macro_rules! bit_field {
    ($($(#[$Attr:meta])* $name:ident => $bit:ident),+ $(,)?) => {
        $(
            $(#[$Attr])*
            #[inline]
            pub fn $name(&self) -> bool {
                unsafe { (*self.as_raw()).$bit() }
            }
        )+
    };
}

pub(crate) type SmallVec<T> = ::smallvec::SmallVec<[T; 4]>;

/// Builds the null terminated key array expected by the multi-recipient native calls.
///
/// An empty input yields `None` so that callers can pass a null pointer instead.
pub(crate) fn key_array<'k, I>(keys: I) -> Option<SmallVec<ffi::gpgme_key_t>>
where I: IntoIterator<Item = &'k Key> {
    let mut ptrs: SmallVec<_> = keys.into_iter().map(|k| k.as_raw()).collect();
    if ptrs.is_empty() {
        None
    } else {
        ptrs.push(ptr::null_mut());
        Some(ptrs)
    }
}

pub(crate) struct FdWriter(libc::c_int);

impl FdWriter {
    pub fn new(fd: libc::c_int) -> FdWriter {
        FdWriter(fd)
    }
}

impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = unsafe { ffi::gpgme_io_write(self.0, buf.as_ptr().cast(), buf.len()) };
        if result >= 0 {
            Ok(result as usize)
        } else {
            Err(NativeError::last_os_error().into())
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
