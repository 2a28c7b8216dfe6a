use std::{fmt, marker::PhantomData};

use ffi;

use crate::{NonNull, Protocol};

/// Location and version of the engine behind one protocol.
///
/// Upstream documentation:
/// [`gpgme_engine_info_t`](https://www.gnupg.org/documentation/manuals/gpgme/Engine-Information.html#index-gpgme_005fengine_005finfo_005ft)
#[derive(Copy, Clone)]
pub struct EngineInfo<'a>(NonNull<ffi::gpgme_engine_info_t>, PhantomData<&'a ()>);

unsafe impl Send for EngineInfo<'_> {}
unsafe impl Sync for EngineInfo<'_> {}

impl<'a> EngineInfo<'a> {
    impl_wrapper!(ffi::gpgme_engine_info_t, PhantomData);

    #[inline]
    pub fn protocol(&self) -> Protocol {
        unsafe { Protocol::from_raw((*self.as_raw()).protocol) }
    }

    str_field! { 'a;
        path, path_raw => file_name;
        home_dir, home_dir_raw => home_dir;
    }

    /// Returns `true` if the engine's version is at least `req`, compared numerically
    /// component by component.
    pub fn check_version(&self, req: &str) -> bool {
        self.version()
            .map(|v| version_at_least(v, req))
            .unwrap_or(false)
    }

    str_field! { 'a;
        version, version_raw => version;
        required_version, required_version_raw => req_version;
    }
}

impl fmt::Debug for EngineInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInfo")
            .field("raw", &self.as_raw())
            .field("protocol", &self.protocol())
            .field("path", &self.path_raw())
            .field("home_dir", &self.home_dir_raw())
            .field("version", &self.version_raw())
            .field("required_version", &self.required_version_raw())
            .finish()
    }
}

impl_list_iterator!(pub struct EngineInfos(EngineInfo: ffi::gpgme_engine_info_t));

fn version_at_least(version: &str, req: &str) -> bool {
    fn parts(s: &str) -> impl Iterator<Item = u32> + '_ {
        s.split('.')
            .map(|p| p.split(|c: char| !c.is_ascii_digit()).next().unwrap_or(""))
            .map(|p| p.parse().unwrap_or(0))
            .chain(std::iter::repeat(0))
            .take(3)
    }
    parts(version).cmp(parts(req)) != std::cmp::Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::version_at_least;

    #[test]
    fn versions_compare_numerically() {
        assert!(version_at_least("2.2.40", "2.1.13"));
        assert!(version_at_least("2.1.13", "2.1.13"));
        assert!(!version_at_least("2.1.9", "2.1.13"));
        assert!(version_at_least("2.4.0-beta12", "2.4"));
        assert!(!version_at_least("1.4.23", "2"));
    }
}
