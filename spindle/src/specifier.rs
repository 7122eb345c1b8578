//! Specifier parsing and classification.
//!
//! A specifier is a typed string identity. It comes in two forms:
//!
//! - relative: `type:name`, e.g. `component:date-picker`;
//! - absolute: `type:/root/path/to/item`, e.g. `component:/app/components/date-picker`.
//!
//! The first `:` separates the type from the rest. A specifier with an empty
//! remainder (`router:`) names a whole type and is only meaningful as an
//! injection or option target.
//!
//! ```rust
//! use spindle::Specifier;
//!
//! let specifier = Specifier::parse("component:/app/components/date-picker").unwrap();
//! assert_eq!(specifier.kind(), "component");
//! assert!(specifier.is_absolute());
//! assert_eq!(specifier.root_name(), Some("app"));
//! ```

use std::fmt;

use crate::{Error, Result};

/// Separator between the type segment and the name or path.
pub const TYPE_SEPARATOR: char = ':';

const PATH_SEPARATOR: char = '/';

/// Borrowed view over a parsed specifier string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Specifier<'a> {
    raw: &'a str,
    split: usize,
}

impl<'a> Specifier<'a> {
    /// Parses a specifier, failing only when the type separator is missing.
    pub fn parse(raw: &'a str) -> Result<Self> {
        match raw.find(TYPE_SEPARATOR) {
            Some(split) => Ok(Self { raw, split }),
            None => Err(Error::InvalidSpecifier(raw.to_owned())),
        }
    }

    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// The type segment (`component` in `component:date-picker`).
    pub fn kind(&self) -> &'a str {
        &self.raw[..self.split]
    }

    /// Everything after the type separator.
    pub fn remainder(&self) -> &'a str {
        &self.raw[self.split + TYPE_SEPARATOR.len_utf8()..]
    }

    pub fn is_absolute(&self) -> bool {
        self.remainder().starts_with(PATH_SEPARATOR)
    }

    /// Whether this specifier names a whole type (`router:`).
    pub fn is_type(&self) -> bool {
        self.remainder().is_empty()
    }

    /// The name of a relative specifier.
    pub fn name(&self) -> Option<&'a str> {
        if self.is_absolute() || self.is_type() {
            None
        } else {
            Some(self.remainder())
        }
    }

    /// The path of an absolute specifier, including the leading `/`.
    pub fn path(&self) -> Option<&'a str> {
        self.is_absolute().then(|| self.remainder())
    }

    /// The first path segment of an absolute specifier.
    pub fn root_name(&self) -> Option<&'a str> {
        self.segments().next()
    }

    /// Non-empty path segments of an absolute specifier.
    pub fn segments(self) -> impl Iterator<Item = &'a str> {
        self.path()
            .unwrap_or_default()
            .split(PATH_SEPARATOR)
            .filter(|v| !v.is_empty())
    }

    /// The type-level specifier this one belongs to (`router:` for `router:/app/main`).
    pub fn type_specifier(&self) -> &'a str {
        &self.raw[..self.split + TYPE_SEPARATOR.len_utf8()]
    }
}

impl fmt::Display for Specifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw)
    }
}

/// Returns `true` iff the remainder after the type separator begins with `/`.
pub fn is_absolute(specifier: &str) -> bool {
    Specifier::parse(specifier).is_ok_and(|v| v.is_absolute())
}

/// Returns the type segment of a specifier, if it has one.
pub fn specifier_type(specifier: &str) -> Option<&str> {
    Specifier::parse(specifier).ok().map(|v| v.kind())
}

pub(crate) fn parse_absolute(specifier: &str) -> Result<Specifier<'_>> {
    let parsed = Specifier::parse(specifier)?;
    if !parsed.is_absolute() {
        return Err(Error::NotAbsolute(specifier.to_owned()));
    }
    Ok(parsed)
}
