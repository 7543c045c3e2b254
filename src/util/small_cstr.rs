use smallvec::SmallVec;
use std::ffi::{CStr, CString, NulError};

/// A NUL-terminated string that avoids heap allocation for the short
/// identifiers we feed the engine (parameter names, pragma names).
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SmallCString(SmallVec<[u8; 24]>);

impl SmallCString {
    #[inline]
    pub fn new(s: &str) -> Result<Self, NulError> {
        if s.as_bytes().contains(&0u8) {
            // CString::new rescans, but only on this cold path.
            return Err(CString::new(s).unwrap_err());
        }
        let mut buf = SmallVec::with_capacity(s.len() + 1);
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
        Ok(Self(buf))
    }

    #[inline]
    pub fn as_cstr(&self) -> &CStr {
        debug_assert!(CStr::from_bytes_with_nul(&self.0).is_ok());
        // The constructor rejects interior NULs and always appends one.
        unsafe { CStr::from_bytes_with_nul_unchecked(&self.0) }
    }

    #[inline]
    pub fn as_bytes_without_nul(&self) -> &[u8] {
        &self.0[..self.0.len() - 1]
    }
}

impl std::fmt::Debug for SmallCString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SmallCString")
            .field(&String::from_utf8_lossy(self.as_bytes_without_nul()))
            .finish()
    }
}

impl std::ops::Deref for SmallCString {
    type Target = CStr;
    #[inline]
    fn deref(&self) -> &CStr {
        self.as_cstr()
    }
}
