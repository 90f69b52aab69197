//! String type wrapping [`Cow<'static, str>`].
use std::borrow::Cow;

/// An alias for [`Cow<'static, str>`](std::borrow::Cow).
pub type Str = Cow<'static, str>;

/// Split a space-delimited class string into its non-empty tokens.
pub fn class_tokens(classes: &str) -> impl Iterator<Item = &str> {
    classes.split(' ').filter(|s| !s.is_empty())
}
