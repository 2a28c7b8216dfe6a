use std::{
    borrow::BorrowMut,
    error::Error as StdError,
    ffi::CStr,
    fmt,
    fs::File,
    io::{self, prelude::*, SeekFrom},
    marker::PhantomData,
    ptr, slice,
    str::Utf8Error,
};

use cstr_argument::CStrArgument;
use ffi;
use libc;

use crate::{error::return_err, NativeError, NonNull, Result};

ffi_enum_wrapper! {
    /// Upstream documentation:
    /// [`gpgme_data_encoding_t`](https://www.gnupg.org/documentation/manuals/gpgme/Data-Buffer-Meta_002dData.html#index-gpgme_005fdata_005fencoding_005ft)
    #[non_exhaustive]
    pub enum DataEncoding: ffi::gpgme_data_encoding_t {
        None = ffi::GPGME_DATA_ENCODING_NONE,
        Binary = ffi::GPGME_DATA_ENCODING_BINARY,
        Base64 = ffi::GPGME_DATA_ENCODING_BASE64,
        Armor = ffi::GPGME_DATA_ENCODING_ARMOR,
        Url = ffi::GPGME_DATA_ENCODING_URL,
        UrlEscaped = ffi::GPGME_DATA_ENCODING_URLESC,
        Url0 = ffi::GPGME_DATA_ENCODING_URL0,
        Mime = ffi::GPGME_DATA_ENCODING_MIME,
    }
}

ffi_enum_wrapper! {
    /// Upstream documentation:
    /// [`gpgme_data_type_t`](https://www.gnupg.org/documentation/manuals/gpgme/Data-Buffer-Convenience.html#index-gpgme_005fdata_005ftype_005ft)
    #[non_exhaustive]
    pub enum DataType: ffi::gpgme_data_type_t {
        Unknown = ffi::GPGME_DATA_TYPE_UNKNOWN,
        Invalid = ffi::GPGME_DATA_TYPE_INVALID,
        PgpSigned = ffi::GPGME_DATA_TYPE_PGP_SIGNED,
        PgpEncrypted = ffi::GPGME_DATA_TYPE_PGP_ENCRYPTED,
        PgpSignature = ffi::GPGME_DATA_TYPE_PGP_SIGNATURE,
        PgpOther = ffi::GPGME_DATA_TYPE_PGP_OTHER,
        PgpKey = ffi::GPGME_DATA_TYPE_PGP_KEY,
        CmsSigned = ffi::GPGME_DATA_TYPE_CMS_SIGNED,
        CmsEncrypted = ffi::GPGME_DATA_TYPE_CMS_ENCRYPTED,
        CmsOther = ffi::GPGME_DATA_TYPE_CMS_OTHER,
        X509Certificate = ffi::GPGME_DATA_TYPE_X509_CERT,
        Pkcs12 = ffi::GPGME_DATA_TYPE_PKCS12,
    }
}

/// The error returned when a data object could not be built around a stream. The stream is
/// handed back.
#[derive(Clone)]
pub struct WrappedError<S>(NativeError, S);

impl<S> WrappedError<S> {
    #[inline]
    pub fn error(&self) -> NativeError {
        self.0
    }

    #[inline]
    pub fn into_inner(self) -> S {
        self.1
    }
}

impl<S> fmt::Debug for WrappedError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<S> fmt::Display for WrappedError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<S> StdError for WrappedError<S> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

struct CallbackWrapper<S> {
    cbs: ffi::gpgme_data_cbs,
    inner: S,
}

/// A buffer or stream that GPGME reads its input from or writes its output to.
///
/// Memory-backed objects can be read, written and seeked freely. Objects wrapping a Rust
/// stream support whichever of those operations the stream does.
///
/// Upstream documentation:
/// [`gpgme_data_t`](https://www.gnupg.org/documentation/manuals/gpgme/Exchanging-Data.html#Exchanging-Data)
#[must_use]
pub struct Data<'data>(NonNull<ffi::gpgme_data_t>, PhantomData<&'data mut ()>);

unsafe impl Send for Data<'_> {}

impl Drop for Data<'_> {
    #[inline]
    fn drop(&mut self) {
        unsafe {
            ffi::gpgme_data_release(self.as_raw());
        }
    }
}

impl<'data> Data<'data> {
    impl_wrapper!(ffi::gpgme_data_t, PhantomData);

    /// A write-only stream backed by the process's standard output.
    #[inline]
    pub fn stdout() -> Result<Data<'static>> {
        Data::from_writer(io::stdout()).map_err(|err| err.error().into())
    }

    /// Constructs an empty, growable in-memory buffer.
    ///
    /// Upstream documentation:
    /// [`gpgme_data_new`](https://www.gnupg.org/documentation/manuals/gpgme/Memory-Based-Data-Buffers.html#index-gpgme_005fdata_005fnew)
    #[inline]
    pub fn new() -> Result<Data<'static>> {
        crate::init()?;
        unsafe {
            let mut data = ptr::null_mut();
            return_err!(ffi::gpgme_data_new(&mut data));
            Ok(Data::from_raw(data))
        }
    }

    /// Constructs a buffer holding the contents of the file at `path`.
    ///
    /// Upstream documentation:
    /// [`gpgme_data_new_from_file`](https://www.gnupg.org/documentation/manuals/gpgme/Memory-Based-Data-Buffers.html#index-gpgme_005fdata_005fnew_005ffrom_005ffile)
    #[inline]
    pub fn load(path: impl CStrArgument) -> Result<Data<'static>> {
        crate::init()?;
        let path = path.try_into_cstr()?;
        unsafe {
            let mut data = ptr::null_mut();
            return_err!(ffi::gpgme_data_new_from_file(
                &mut data,
                path.as_ref().as_ptr(),
                1
            ));
            Ok(Data::from_raw(data))
        }
    }

    /// Constructs a buffer holding a copy of `bytes`.
    ///
    /// Upstream documentation:
    /// [`gpgme_data_new_from_mem`](https://www.gnupg.org/documentation/manuals/gpgme/Memory-Based-Data-Buffers.html#index-gpgme_005fdata_005fnew_005ffrom_005fmem)
    #[inline]
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Data<'static>> {
        crate::init()?;
        let bytes = bytes.as_ref();
        unsafe {
            let mut data = ptr::null_mut();
            return_err!(ffi::gpgme_data_new_from_mem(
                &mut data,
                bytes.as_ptr().cast(),
                bytes.len(),
                1
            ));
            Ok(Data::from_raw(data))
        }
    }

    /// Constructs a buffer that reads from `buf` without copying it.
    #[inline]
    pub fn from_buffer(buf: &'data (impl AsRef<[u8]> + ?Sized)) -> Result<Self> {
        crate::init()?;
        let buf = buf.as_ref();
        unsafe {
            let mut data = ptr::null_mut();
            return_err!(ffi::gpgme_data_new_from_mem(
                &mut data,
                buf.as_ptr().cast(),
                buf.len(),
                0
            ));
            Ok(Data::from_raw(data))
        }
    }

    #[cfg(unix)]
    #[inline]
    pub fn from_fd(file: &'data (impl std::os::unix::io::AsRawFd + ?Sized)) -> Result<Self> {
        crate::init()?;
        unsafe {
            let mut data = ptr::null_mut();
            return_err!(ffi::gpgme_data_new_from_fd(&mut data, file.as_raw_fd()));
            Ok(Data::from_raw(data))
        }
    }

    unsafe fn from_callbacks<S>(
        cbs: ffi::gpgme_data_cbs, src: S,
    ) -> std::result::Result<Self, WrappedError<S>>
    where S: Send + 'data {
        if let Err(err) = crate::init() {
            return Err(WrappedError(
                err.native().unwrap_or(NativeError::GENERAL),
                src,
            ));
        }
        let src = Box::into_raw(Box::new(CallbackWrapper { cbs, inner: src }));
        let cbs = ptr::addr_of_mut!((*src).cbs);
        let mut data = ptr::null_mut();
        let result = ffi::gpgme_data_new_from_cbs(&mut data, cbs, src.cast());
        if result == 0 {
            Ok(Data::from_raw(data))
        } else {
            Err(WrappedError(
                NativeError::new(result),
                Box::from_raw(src).inner,
            ))
        }
    }

    /// Upstream documentation:
    /// [`gpgme_data_new_from_cbs`](https://www.gnupg.org/documentation/manuals/gpgme/Callback-Based-Data-Buffers.html#index-gpgme_005fdata_005fnew_005ffrom_005fcbs)
    #[inline]
    pub fn from_reader<R>(r: R) -> std::result::Result<Self, WrappedError<R>>
    where R: Read + Send + 'data {
        let cbs = ffi::gpgme_data_cbs {
            read: Some(read_callback::<R>),
            write: None,
            seek: None,
            release: Some(release_callback::<R>),
        };
        unsafe { Data::from_callbacks(cbs, r) }
    }

    #[inline]
    pub fn from_seekable_reader<R>(r: R) -> std::result::Result<Self, WrappedError<R>>
    where R: Read + Seek + Send + 'data {
        let cbs = ffi::gpgme_data_cbs {
            read: Some(read_callback::<R>),
            write: None,
            seek: Some(seek_callback::<R>),
            release: Some(release_callback::<R>),
        };
        unsafe { Data::from_callbacks(cbs, r) }
    }

    #[inline]
    pub fn from_writer<W>(w: W) -> std::result::Result<Self, WrappedError<W>>
    where W: Write + Send + 'data {
        let cbs = ffi::gpgme_data_cbs {
            read: None,
            write: Some(write_callback::<W>),
            seek: None,
            release: Some(release_callback::<W>),
        };
        unsafe { Data::from_callbacks(cbs, w) }
    }

    #[inline]
    pub fn from_seekable_writer<W>(w: W) -> std::result::Result<Self, WrappedError<W>>
    where W: Write + Seek + Send + 'data {
        let cbs = ffi::gpgme_data_cbs {
            read: None,
            write: Some(write_callback::<W>),
            seek: Some(seek_callback::<W>),
            release: Some(release_callback::<W>),
        };
        unsafe { Data::from_callbacks(cbs, w) }
    }

    #[inline]
    pub fn from_stream<S>(s: S) -> std::result::Result<Self, WrappedError<S>>
    where S: Read + Write + Send + 'data {
        let cbs = ffi::gpgme_data_cbs {
            read: Some(read_callback::<S>),
            write: Some(write_callback::<S>),
            seek: None,
            release: Some(release_callback::<S>),
        };
        unsafe { Data::from_callbacks(cbs, s) }
    }

    #[inline]
    pub fn from_seekable_stream<S>(s: S) -> std::result::Result<Self, WrappedError<S>>
    where S: Read + Write + Seek + Send + 'data {
        let cbs = ffi::gpgme_data_cbs {
            read: Some(read_callback::<S>),
            write: Some(write_callback::<S>),
            seek: Some(seek_callback::<S>),
            release: Some(release_callback::<S>),
        };
        unsafe { Data::from_callbacks(cbs, s) }
    }

    /// The file name GPGME embeds in (or recovered from) an OpenPGP literal data packet.
    #[inline]
    pub fn file_name(&self) -> Result<&str, Option<Utf8Error>> {
        self.file_name_raw()
            .map_or(Err(None), |s| s.to_str().map_err(Some))
    }

    #[inline]
    pub fn file_name_raw(&self) -> Option<&CStr> {
        unsafe {
            ffi::gpgme_data_get_file_name(self.as_raw())
                .as_ref()
                .map(|s| CStr::from_ptr(s))
        }
    }

    #[inline]
    pub fn set_file_name(&mut self, name: impl CStrArgument) -> Result<()> {
        let name = name.try_into_cstr()?;
        unsafe {
            return_err!(ffi::gpgme_data_set_file_name(
                self.as_raw(),
                name.as_ref().as_ptr()
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn clear_file_name(&mut self) -> Result<()> {
        unsafe {
            return_err!(ffi::gpgme_data_set_file_name(self.as_raw(), ptr::null()));
        }
        Ok(())
    }

    #[inline]
    pub fn encoding(&self) -> DataEncoding {
        unsafe { DataEncoding::from_raw(ffi::gpgme_data_get_encoding(self.as_raw())) }
    }

    #[inline]
    pub fn set_encoding(&mut self, enc: DataEncoding) -> Result<()> {
        unsafe { return_err!(ffi::gpgme_data_set_encoding(self.as_raw(), enc.raw())) }
        Ok(())
    }

    /// Upstream documentation:
    /// [`gpgme_data_set_flag`](https://www.gnupg.org/documentation/manuals/gpgme/Data-Buffer-Meta_002dData.html#index-gpgme_005fdata_005fset_005fflag)
    #[inline]
    pub fn set_flag(&mut self, name: impl CStrArgument, value: impl CStrArgument) -> Result<()> {
        let name = name.try_into_cstr()?;
        let value = value.try_into_cstr()?;
        unsafe {
            return_err!(ffi::gpgme_data_set_flag(
                self.as_raw(),
                name.as_ref().as_ptr(),
                value.as_ref().as_ptr()
            ));
        }
        Ok(())
    }

    /// Tells the engine how much data to expect, which lets it report progress.
    #[inline]
    pub fn set_size_hint(&mut self, size: u64) -> Result<()> {
        self.set_flag("size-hint", size.to_string())
    }

    /// Guesses what kind of content the object holds. The read position is restored
    /// afterwards.
    ///
    /// Upstream documentation:
    /// [`gpgme_data_identify`](https://www.gnupg.org/documentation/manuals/gpgme/Data-Buffer-Convenience.html#index-gpgme_005fdata_005fidentify)
    #[inline]
    pub fn identify(&mut self) -> DataType {
        unsafe { DataType::from_raw(ffi::gpgme_data_identify(self.as_raw(), 0)) }
    }

    /// Releases the object and returns its contents.
    ///
    /// Returns `None` for objects that are not backed by memory.
    #[inline]
    pub fn try_into_bytes(self) -> Option<Vec<u8>> {
        unsafe {
            let mut len = 0;
            let buf = ffi::gpgme_data_release_and_get_mem(self.into_raw(), &mut len);
            if buf.is_null() {
                return None;
            }
            let bytes = slice::from_raw_parts(buf.cast::<u8>(), len).to_vec();
            ffi::gpgme_free(buf.cast());
            Some(bytes)
        }
    }
}

impl fmt::Debug for Data<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("raw", &self.as_raw())
            .finish()
    }
}

impl Read for Data<'_> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = unsafe {
            ffi::gpgme_data_read(self.as_raw(), buf.as_mut_ptr().cast(), buf.len())
        };
        usize::try_from(result).map_err(|_| NativeError::last_os_error().into())
    }
}

impl Write for Data<'_> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result =
            unsafe { ffi::gpgme_data_write(self.as_raw(), buf.as_ptr().cast(), buf.len()) };
        usize::try_from(result).map_err(|_| NativeError::last_os_error().into())
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Data<'_> {
    #[inline]
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (off, whence) = match pos {
            SeekFrom::Start(off) => (to_offset(off)?, libc::SEEK_SET),
            SeekFrom::End(off) => (to_offset(off)?, libc::SEEK_END),
            SeekFrom::Current(off) => (to_offset(off)?, libc::SEEK_CUR),
        };
        let result = unsafe { ffi::gpgme_data_seek(self.as_raw(), off, whence) };
        u64::try_from(result).map_err(|_| NativeError::last_os_error().into())
    }
}

fn to_offset<T>(off: T) -> io::Result<ffi::gpgme_off_t>
where ffi::gpgme_off_t: TryFrom<T> {
    ffi::gpgme_off_t::try_from(off).map_err(|_| io::ErrorKind::InvalidInput.into())
}

fn set_errno(err: io::Error) {
    unsafe {
        ffi::gpgme_err_set_errno(NativeError::from(err).to_errno());
    }
}

unsafe extern "C" fn read_callback<S: Read>(
    handle: *mut libc::c_void, buffer: *mut libc::c_void, size: libc::size_t,
) -> libc::ssize_t {
    let handle = handle.cast::<CallbackWrapper<S>>();
    let slice = slice::from_raw_parts_mut(buffer.cast::<u8>(), size);
    (*handle)
        .inner
        .read(slice)
        .map(|n| libc::ssize_t::try_from(n).unwrap_or(libc::ssize_t::MAX))
        .unwrap_or_else(|err| {
            set_errno(err);
            -1
        })
}

unsafe extern "C" fn write_callback<S: Write>(
    handle: *mut libc::c_void, buffer: *const libc::c_void, size: libc::size_t,
) -> libc::ssize_t {
    let handle = handle.cast::<CallbackWrapper<S>>();
    let slice = slice::from_raw_parts(buffer.cast::<u8>(), size);
    (*handle)
        .inner
        .write(slice)
        .map(|n| libc::ssize_t::try_from(n).unwrap_or(libc::ssize_t::MAX))
        .unwrap_or_else(|err| {
            set_errno(err);
            -1
        })
}

unsafe extern "C" fn seek_callback<S: Seek>(
    handle: *mut libc::c_void, offset: ffi::gpgme_off_t, whence: libc::c_int,
) -> ffi::gpgme_off_t {
    let handle = handle.cast::<CallbackWrapper<S>>();
    let offset = i64::from(offset);
    let pos = match whence {
        libc::SEEK_SET => match u64::try_from(offset) {
            Ok(off) => SeekFrom::Start(off),
            Err(_) => {
                set_errno(io::ErrorKind::InvalidInput.into());
                return -1;
            }
        },
        libc::SEEK_END => SeekFrom::End(offset),
        libc::SEEK_CUR => SeekFrom::Current(offset),
        _ => {
            set_errno(io::ErrorKind::InvalidInput.into());
            return -1;
        }
    };
    (*handle)
        .inner
        .seek(pos)
        .map(|n| ffi::gpgme_off_t::try_from(n).unwrap_or(ffi::gpgme_off_t::MAX))
        .unwrap_or_else(|err| {
            set_errno(err);
            -1
        })
}

unsafe extern "C" fn release_callback<S>(handle: *mut libc::c_void) {
    drop(Box::from_raw(handle.cast::<CallbackWrapper<S>>()));
}

/// Conversion into a [`Data`] object, used for the inputs and outputs of every operation on
/// a [`Context`](crate::Context).
pub trait IntoData<'a> {
    type Output: BorrowMut<Data<'a>>;

    fn into_data(self) -> Result<Self::Output>;
}

impl<'a> IntoData<'a> for Data<'a> {
    type Output = Self;

    #[inline]
    fn into_data(self) -> Result<Self> {
        Ok(self)
    }
}

impl<'a, 'b> IntoData<'a> for &'b mut Data<'a> {
    type Output = Self;

    #[inline]
    fn into_data(self) -> Result<Self> {
        Ok(self)
    }
}

impl<'a> IntoData<'a> for &'a [u8] {
    type Output = Data<'a>;

    #[inline]
    fn into_data(self) -> Result<Data<'a>> {
        Data::from_buffer(self)
    }
}

impl<'a> IntoData<'a> for &'a Vec<u8> {
    type Output = Data<'a>;

    #[inline]
    fn into_data(self) -> Result<Data<'a>> {
        Data::from_buffer(self)
    }
}

impl<'a> IntoData<'a> for &'a str {
    type Output = Data<'a>;

    #[inline]
    fn into_data(self) -> Result<Data<'a>> {
        Data::from_buffer(self)
    }
}

impl<'a> IntoData<'a> for &'a String {
    type Output = Data<'a>;

    #[inline]
    fn into_data(self) -> Result<Data<'a>> {
        Data::from_buffer(self)
    }
}

impl<'a> IntoData<'a> for &'a mut Vec<u8> {
    type Output = Data<'a>;

    #[inline]
    fn into_data(self) -> Result<Data<'a>> {
        Data::from_writer(self).map_err(|err| err.error().into())
    }
}

impl<'a> IntoData<'a> for &'a mut File {
    type Output = Data<'a>;

    #[inline]
    fn into_data(self) -> Result<Data<'a>> {
        Data::from_seekable_stream(self).map_err(|err| err.error().into())
    }
}

impl<'a> IntoData<'a> for &'a File {
    type Output = Data<'a>;

    #[inline]
    fn into_data(self) -> Result<Data<'a>> {
        Data::from_seekable_stream(self).map_err(|err| err.error().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_buffers_read_write_and_seek() {
        let mut data = Data::new().unwrap();
        data.write_all(b"Hello World\n").unwrap();
        assert_eq!(data.seek(SeekFrom::Start(6)).unwrap(), 6);
        let mut rest = String::new();
        data.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "World\n");
        assert_eq!(data.try_into_bytes().unwrap(), b"Hello World\n");
    }

    #[test]
    fn borrowed_buffers_are_readable() {
        let input = b"borrowed bytes".to_vec();
        let mut data = Data::from_buffer(&input).unwrap();
        let mut out = Vec::new();
        data.read_to_end(&mut out).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn file_names_round_trip() {
        let mut data = Data::new().unwrap();
        assert!(data.file_name_raw().is_none());
        data.set_file_name("report.txt").unwrap();
        assert_eq!(data.file_name(), Ok("report.txt"));
        data.clear_file_name().unwrap();
        assert_eq!(data.file_name(), Err(None));
    }

    #[test]
    fn writer_streams_receive_output() {
        let mut sink = Vec::new();
        {
            let mut data = Data::from_writer(&mut sink).unwrap();
            data.write_all(b"streamed").unwrap();
        }
        assert_eq!(sink, b"streamed");
    }

    #[test]
    fn interior_nul_in_flag_is_rejected() {
        let mut data = Data::new().unwrap();
        let err = data.set_flag("size-hint", "1\02").unwrap_err();
        assert_eq!(err.native(), Some(NativeError::INV_VALUE));
    }
}
