//! Canned HTML bodies baked into the binary. Kept as standalone files
//! under `pages/` (rather than inline string literals) so they can be
//! edited without touching Rust source, matching the original's
//! separately-maintained `Strings::*Page` constants.

pub const NOT_FOUND: &str = include_str!("../pages/not_found.html");
pub const FORBIDDEN: &str = include_str!("../pages/forbidden.html");
pub const HOMEPAGE: &str = include_str!("../pages/homepage.html");
