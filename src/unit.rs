use std::fmt;

use memchr::memchr;

use crate::error::ErrorKind;
use crate::searcher::Kernel;
use crate::unescape::{unescape_to_slice, utf8_to_utf16, widen_ascii};

mod private {
    use super::*;

    // Encoding-specific hooks of the engine. Kept out of reach so that
    // `CodeUnit` cannot be implemented outside of this crate.
    pub trait Sealed: Sized {
        fn is_non_ascii(self) -> bool;

        fn special_mask(kernel: &Kernel, chunk: &[Self]) -> u32;

        fn find_quote(haystack: &[Self]) -> Option<usize>;

        fn as_utf16(units: &[Self]) -> Option<&[u16]>;

        fn widen_utf16(units: &[Self], dest: &mut [u16]) -> Option<usize>;

        fn transcode_utf16(units: &[Self], collapse_quotes: bool, dest: &mut [u16])
            -> Option<usize>;

        fn as_str(units: &[Self]) -> Option<&str>;

        fn decode_to(units: &[Self], output: &mut String) -> bool;

        fn into_string(units: Vec<Self>) -> Option<String>;

        fn invalid_text(field: usize) -> ErrorKind;
    }

    impl Sealed for u8 {
        #[inline(always)]
        fn is_non_ascii(self) -> bool {
            self >= 0x80
        }

        #[inline(always)]
        fn special_mask(kernel: &Kernel, chunk: &[Self]) -> u32 {
            kernel.mask_bytes(chunk)
        }

        #[inline(always)]
        fn find_quote(haystack: &[Self]) -> Option<usize> {
            memchr(b'"', haystack)
        }

        #[inline]
        fn as_utf16(_units: &[Self]) -> Option<&[u16]> {
            None
        }

        #[inline]
        fn widen_utf16(units: &[Self], dest: &mut [u16]) -> Option<usize> {
            widen_ascii(units, dest)
        }

        #[inline]
        fn transcode_utf16(
            units: &[Self],
            collapse_quotes: bool,
            dest: &mut [u16],
        ) -> Option<usize> {
            utf8_to_utf16(units, collapse_quotes, dest)
        }

        #[inline]
        fn as_str(units: &[Self]) -> Option<&str> {
            std::str::from_utf8(units).ok()
        }

        #[inline]
        fn decode_to(units: &[Self], output: &mut String) -> bool {
            match std::str::from_utf8(units) {
                Ok(text) => {
                    output.push_str(text);
                    true
                }
                Err(_) => false,
            }
        }

        #[inline]
        fn into_string(units: Vec<Self>) -> Option<String> {
            String::from_utf8(units).ok()
        }

        fn invalid_text(field: usize) -> ErrorKind {
            ErrorKind::InvalidUtf8 { field }
        }
    }

    impl Sealed for u16 {
        // Non-ASCII data needs no special treatment in UTF-16 mode
        #[inline(always)]
        fn is_non_ascii(self) -> bool {
            false
        }

        #[inline(always)]
        fn special_mask(kernel: &Kernel, chunk: &[Self]) -> u32 {
            kernel.mask_units(chunk)
        }

        #[inline(always)]
        fn find_quote(haystack: &[Self]) -> Option<usize> {
            haystack.iter().position(|unit| *unit == b'"' as u16)
        }

        #[inline]
        fn as_utf16(units: &[Self]) -> Option<&[u16]> {
            Some(units)
        }

        #[inline]
        fn widen_utf16(units: &[Self], dest: &mut [u16]) -> Option<usize> {
            dest.get_mut(..units.len())?.copy_from_slice(units);
            Some(units.len())
        }

        #[inline]
        fn transcode_utf16(
            units: &[Self],
            collapse_quotes: bool,
            dest: &mut [u16],
        ) -> Option<usize> {
            if collapse_quotes {
                unescape_to_slice(units, dest)
            } else {
                Self::widen_utf16(units, dest)
            }
        }

        #[inline]
        fn as_str(_units: &[Self]) -> Option<&str> {
            None
        }

        fn decode_to(units: &[Self], output: &mut String) -> bool {
            for c in char::decode_utf16(units.iter().copied()) {
                match c {
                    Ok(c) => output.push(c),
                    Err(_) => return false,
                }
            }

            true
        }

        #[inline]
        fn into_string(units: Vec<Self>) -> Option<String> {
            String::from_utf16(&units).ok()
        }

        fn invalid_text(field: usize) -> ErrorKind {
            ErrorKind::InvalidUtf16 { field }
        }
    }
}

/// A code unit of the decoded text: `u8` for UTF-8 input, `u16` for UTF-16
/// input.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait CodeUnit:
    private::Sealed + Copy + Eq + Ord + Default + fmt::Debug + Send + Sync + 'static
{
    /// Line feed, the record terminator.
    const LF: Self;
    /// Carriage return, stripped from the end of records following the
    /// stream's line ending policy.
    const CR: Self;
    /// Double quote, the only supported quoting character.
    const QUOTE: Self;
    /// Byte-order mark stripped once at the beginning of the stream.
    const BOM: &'static [Self];

    /// Converts an ASCII byte into a code unit.
    fn from_ascii(byte: u8) -> Self;
}

impl CodeUnit for u8 {
    const LF: Self = b'\n';
    const CR: Self = b'\r';
    const QUOTE: Self = b'"';
    const BOM: &'static [Self] = b"\xef\xbb\xbf";

    #[inline(always)]
    fn from_ascii(byte: u8) -> Self {
        byte
    }
}

impl CodeUnit for u16 {
    const LF: Self = b'\n' as u16;
    const CR: Self = b'\r' as u16;
    const QUOTE: Self = b'"' as u16;
    const BOM: &'static [Self] = &[0xfeff];

    #[inline(always)]
    fn from_ascii(byte: u8) -> Self {
        byte as u16
    }
}
