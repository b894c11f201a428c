//! Middleware Error Types

use derive_more::Display;
use std::error::Error as StdError;

/// Either the wrapped handler failed, or converting its response did.
///
/// Neither is handled here: the host server decides how to answer
/// (usually with a 500).
#[derive(Debug, Display)]
pub enum Error<E> {
    /// The wrapped handler's own error, untouched.
    #[display("{_0}")]
    Upstream(E),
    /// Converting the HTML response to PDF failed.
    #[display("PDF conversion failed: {}", **_0)]
    Render(pagekit_render::Error),
}
impl<E> Error<E> {
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// The conversion failure, if that is what this is.
    pub fn render_error(&self) -> Option<&pagekit_render::ErrorKind> {
        match self {
            Self::Render(e) => Some(&**e),
            Self::Upstream(_) => None,
        }
    }
}
impl<E: StdError + 'static> StdError for Error<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Upstream(e) => Some(e),
            Self::Render(e) => Some(&**e),
        }
    }
}
