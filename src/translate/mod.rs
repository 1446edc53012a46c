//! Translation between the relay's chat format and the Gemini API.
//!
//! All translation functions are pure (no I/O).

pub mod gemini_types;
pub mod request;
pub mod response;
