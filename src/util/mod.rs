// Internal utilities
mod small_cstr;
pub(crate) use small_cstr::SmallCString;
