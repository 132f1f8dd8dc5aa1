mod html;
mod imageresize;

pub use html::escape_html;
pub use imageresize::{CacheStats, ImageResizer, ImageResizerError};

#[cfg(test)]
pub(crate) use imageresize::serve_once;
