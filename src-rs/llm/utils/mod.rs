pub mod cancel;
pub mod serde_util;
pub(crate) mod sse;
pub mod string_util;
