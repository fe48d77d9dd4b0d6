//! Field materialization.
//!
//! Raw fields are turned into caller-visible text along the cheapest correct
//! path, see [`Strategy`].

use std::borrow::Cow;

use crate::scanner::EscapeMeta;
use crate::unit::CodeUnit;

const REPLACEMENT_CHARACTER: u16 = 0xfffd;

/// Returns the inside of `cell` if it is enclosed by a pair of quotes.
#[inline]
pub fn unquoted<T: CodeUnit>(cell: &[T]) -> Option<&[T]> {
    let len = cell.len();

    if len >= 2 && cell[0] == T::QUOTE && cell[len - 1] == T::QUOTE {
        Some(&cell[1..len - 1])
    } else {
        None
    }
}

/// Collapses doubled quotes from the inside of a quoted cell.
///
/// A lone quote is kept as-is.
pub fn unescape<T: CodeUnit>(inner: &[T]) -> Cow<'_, [T]> {
    if T::find_quote(inner).is_none() {
        return Cow::Borrowed(inner);
    }

    let mut output = Vec::with_capacity(inner.len());
    unescape_to(inner, &mut output);

    Cow::Owned(output)
}

pub fn unescape_to<T: CodeUnit>(inner: &[T], output: &mut Vec<T>) {
    let mut rest = inner;

    while let Some(offset) = T::find_quote(rest) {
        output.extend_from_slice(&rest[..=offset]);
        rest = &rest[offset + 1..];

        if rest.first() == Some(&T::QUOTE) {
            rest = &rest[1..];
        }
    }

    output.extend_from_slice(rest);
}

/// Same as [`unescape_to`] but writing into a fixed slice. Returns `None` if
/// `dest` is too short.
pub fn unescape_to_slice<T: CodeUnit>(inner: &[T], dest: &mut [T]) -> Option<usize> {
    let mut rest = inner;
    let mut written: usize = 0;

    loop {
        let run = match T::find_quote(rest) {
            Some(offset) => offset + 1,
            None => rest.len(),
        };

        dest.get_mut(written..written + run)?
            .copy_from_slice(&rest[..run]);
        written += run;
        rest = &rest[run..];

        if rest.is_empty() {
            return Some(written);
        }

        if rest[0] == T::QUOTE {
            rest = &rest[1..];
        }
    }
}

/// Unescaped view of a raw field in its own encoding.
#[inline]
pub fn unescaped<T: CodeUnit>(raw: &[T], meta: EscapeMeta) -> Cow<'_, [T]> {
    if !meta.is_quoted() {
        return Cow::Borrowed(raw);
    }

    match unquoted(raw) {
        None => Cow::Borrowed(raw),
        Some(inner) if meta.quotes == 2 => Cow::Borrowed(inner),
        Some(inner) => unescape(inner),
    }
}

/// How a raw field must be turned into UTF-16 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy<'a, T> {
    /// Field can be used as-is.
    Raw(&'a [T]),
    /// Field was wrapped in a single pair of quotes, and nothing else.
    Unquote(&'a [T]),
    /// Field must be walked, to collapse doubled quotes and/or to decode
    /// multi-byte UTF-8 sequences.
    General { span: &'a [T], collapse_quotes: bool },
}

impl<'a, T: CodeUnit> Strategy<'a, T> {
    #[inline]
    pub fn choose(raw: &'a [T], meta: EscapeMeta) -> Self {
        if meta.non_ascii {
            return match unquoted(raw).filter(|_| meta.is_quoted()) {
                Some(inner) => Self::General {
                    span: inner,
                    collapse_quotes: meta.quotes > 2,
                },
                None => Self::General {
                    span: raw,
                    collapse_quotes: false,
                },
            };
        }

        if !meta.is_quoted() {
            return Self::Raw(raw);
        }

        match unquoted(raw) {
            Some(inner) if meta.quotes == 2 => Self::Unquote(inner),
            Some(inner) => Self::General {
                span: inner,
                collapse_quotes: true,
            },
            // Stray quotes not wrapping the field are kept verbatim
            None => Self::Raw(raw),
        }
    }

    #[inline]
    pub fn is_general(&self) -> bool {
        matches!(self, Self::General { .. })
    }

    /// Writes the field as UTF-16 into `dest`, returning the number of units
    /// written or `None` if `dest` is too short.
    #[inline]
    pub fn write_utf16(&self, dest: &mut [u16]) -> Option<usize> {
        match *self {
            Self::Raw(span) | Self::Unquote(span) => T::widen_utf16(span, dest),
            Self::General {
                span,
                collapse_quotes,
            } => T::transcode_utf16(span, collapse_quotes, dest),
        }
    }
}

/// Widens ASCII bytes to UTF-16 units.
#[inline]
pub fn widen_ascii(src: &[u8], dest: &mut [u16]) -> Option<usize> {
    let dest = dest.get_mut(..src.len())?;

    for (unit, byte) in dest.iter_mut().zip(src) {
        *unit = *byte as u16;
    }

    Some(src.len())
}

/// Decodes one multi-byte UTF-8 sequence starting at `bytes[0]`. Returns the
/// code point, if valid, and the number of bytes consumed.
#[inline]
fn decode_sequence(bytes: &[u8]) -> (Option<u32>, usize) {
    let lead = bytes[0];

    let (width, min, init) = match lead {
        0xc2..=0xdf => (2, 0x80, (lead & 0x1f) as u32),
        0xe0..=0xef => (3, 0x800, (lead & 0x0f) as u32),
        0xf0..=0xf4 => (4, 0x10000, (lead & 0x07) as u32),
        _ => return (None, 1),
    };

    if bytes.len() < width {
        return (None, 1);
    }

    let mut code_point = init;

    for &byte in &bytes[1..width] {
        if byte & 0xc0 != 0x80 {
            return (None, 1);
        }

        code_point = (code_point << 6) | (byte & 0x3f) as u32;
    }

    if code_point < min || code_point > 0x10ffff || (0xd800..=0xdfff).contains(&code_point) {
        return (None, 1);
    }

    (Some(code_point), width)
}

/// Transcodes UTF-8 bytes into UTF-16 units, optionally collapsing doubled
/// quotes along the way.
///
/// Malformed sequences yield one replacement character per offending lead
/// byte, so the output never has more units than the input has bytes.
pub fn utf8_to_utf16(src: &[u8], collapse_quotes: bool, dest: &mut [u16]) -> Option<usize> {
    let len = src.len();
    let mut i: usize = 0;
    let mut written: usize = 0;

    while i < len {
        let byte = src[i];

        if byte < 0x80 {
            *dest.get_mut(written)? = byte as u16;
            written += 1;
            i += 1;

            if collapse_quotes && byte == b'"' && src.get(i) == Some(&b'"') {
                i += 1;
            }

            continue;
        }

        let (code_point, width) = decode_sequence(&src[i..]);

        match code_point {
            Some(code_point) if code_point >= 0x10000 => {
                let offset = code_point - 0x10000;
                let pair = dest.get_mut(written..written + 2)?;

                pair[0] = 0xd800 + (offset >> 10) as u16;
                pair[1] = 0xdc00 + (offset & 0x3ff) as u16;
                written += 2;
            }
            Some(code_point) => {
                *dest.get_mut(written)? = code_point as u16;
                written += 1;
            }
            None => {
                *dest.get_mut(written)? = REPLACEMENT_CHARACTER;
                written += 1;
            }
        }

        i += width;
    }

    Some(written)
}
