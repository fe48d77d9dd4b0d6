//! Classification kernels used by the vectorized field scanner.
//!
//! A kernel turns a chunk of [`LANES`] code units into a bit mask where bit
//! `i` is set when unit `i` is structural (delimiter, quote or line feed) or,
//! for UTF-8 input, when byte `i` has its high bit set.
//!
//! UTF-16 units are first narrowed to bytes with unsigned saturation, so that
//! any unit `>= 0x100` becomes `0xff`. Since delimiters are required to be
//! ASCII, a saturated lane can never alias a structural character.

/// Number of code units classified by one kernel call.
pub const LANES: usize = 32;

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use core::arch::x86_64::{
        __m128i, _mm_adds_epu16, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8,
        _mm_or_si128, _mm_packus_epi16, _mm_set1_epi16, _mm_set1_epi8, _mm_sub_epi16,
    };

    use super::LANES;

    #[derive(Debug, Clone, Copy)]
    pub struct Sse2Kernel {
        delimiter: __m128i,
        quote: __m128i,
        lf: __m128i,
        bias: __m128i,
    }

    impl Sse2Kernel {
        // SAFETY: sse2 is part of the x86_64 baseline.
        #[inline]
        pub fn new(delimiter: u8) -> Self {
            unsafe {
                Self {
                    delimiter: _mm_set1_epi8(delimiter as i8),
                    quote: _mm_set1_epi8(b'"' as i8),
                    lf: _mm_set1_epi8(b'\n' as i8),
                    bias: _mm_set1_epi16(0xff00u16 as i16),
                }
            }
        }

        #[inline(always)]
        unsafe fn structural(&self, chunk: __m128i) -> u32 {
            let cmp1 = _mm_cmpeq_epi8(chunk, self.delimiter);
            let cmp2 = _mm_cmpeq_epi8(chunk, self.quote);
            let cmp3 = _mm_cmpeq_epi8(chunk, self.lf);
            let cmp = _mm_or_si128(cmp1, cmp2);
            let cmp = _mm_or_si128(cmp, cmp3);

            _mm_movemask_epi8(cmp) as u32
        }

        // Unsigned saturation of 16-bit lanes to 0xff: adding the bias
        // saturates every unit >= 0x100 to 0xffff, subtracting it back leaves
        // either the original unit or 0xff.
        #[inline(always)]
        unsafe fn narrow(&self, a: __m128i, b: __m128i) -> __m128i {
            let a = _mm_sub_epi16(_mm_adds_epu16(a, self.bias), self.bias);
            let b = _mm_sub_epi16(_mm_adds_epu16(b, self.bias), self.bias);

            _mm_packus_epi16(a, b)
        }

        #[inline(always)]
        pub fn mask_bytes(&self, chunk: &[u8]) -> u32 {
            assert!(chunk.len() >= LANES);

            unsafe {
                let ptr = chunk.as_ptr();
                let lo = _mm_loadu_si128(ptr as *const __m128i);
                let hi = _mm_loadu_si128(ptr.add(16) as *const __m128i);

                // High bits come straight out of movemask
                let non_ascii = (_mm_movemask_epi8(lo) as u32) | ((_mm_movemask_epi8(hi) as u32) << 16);

                self.structural(lo) | (self.structural(hi) << 16) | non_ascii
            }
        }

        #[inline(always)]
        pub fn mask_units(&self, chunk: &[u16]) -> u32 {
            assert!(chunk.len() >= LANES);

            unsafe {
                let ptr = chunk.as_ptr();
                let a = _mm_loadu_si128(ptr as *const __m128i);
                let b = _mm_loadu_si128(ptr.add(8) as *const __m128i);
                let c = _mm_loadu_si128(ptr.add(16) as *const __m128i);
                let d = _mm_loadu_si128(ptr.add(24) as *const __m128i);

                let lo = self.narrow(a, b);
                let hi = self.narrow(c, d);

                self.structural(lo) | (self.structural(hi) << 16)
            }
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod aarch64 {
    use core::arch::aarch64::{
        uint8x16_t, vaddv_u8, vandq_u8, vceqq_u8, vcgeq_u8, vcombine_u8, vdupq_n_u8,
        vget_high_u8, vget_low_u8, vld1q_u16, vld1q_u8, vorrq_u8, vqmovn_u16,
    };

    use super::LANES;

    static BIT_WEIGHTS: [u8; 16] = [1, 2, 4, 8, 16, 32, 64, 128, 1, 2, 4, 8, 16, 32, 64, 128];

    #[inline(always)]
    unsafe fn neon_movemask(v: uint8x16_t) -> u32 {
        let weighted = vandq_u8(v, vld1q_u8(BIT_WEIGHTS.as_ptr()));
        let lo = vaddv_u8(vget_low_u8(weighted)) as u32;
        let hi = vaddv_u8(vget_high_u8(weighted)) as u32;

        lo | (hi << 8)
    }

    #[derive(Debug, Clone, Copy)]
    pub struct NeonKernel {
        delimiter: uint8x16_t,
        quote: uint8x16_t,
        lf: uint8x16_t,
        high: uint8x16_t,
    }

    impl NeonKernel {
        // SAFETY: neon is part of the aarch64 baseline.
        #[inline]
        pub fn new(delimiter: u8) -> Self {
            unsafe {
                Self {
                    delimiter: vdupq_n_u8(delimiter),
                    quote: vdupq_n_u8(b'"'),
                    lf: vdupq_n_u8(b'\n'),
                    high: vdupq_n_u8(0x80),
                }
            }
        }

        #[inline(always)]
        unsafe fn structural(&self, chunk: uint8x16_t) -> uint8x16_t {
            let cmp1 = vceqq_u8(chunk, self.delimiter);
            let cmp2 = vceqq_u8(chunk, self.quote);
            let cmp3 = vceqq_u8(chunk, self.lf);

            vorrq_u8(vorrq_u8(cmp1, cmp2), cmp3)
        }

        #[inline(always)]
        pub fn mask_bytes(&self, chunk: &[u8]) -> u32 {
            assert!(chunk.len() >= LANES);

            unsafe {
                let ptr = chunk.as_ptr();
                let lo = vld1q_u8(ptr);
                let hi = vld1q_u8(ptr.add(16));

                let lo = vorrq_u8(self.structural(lo), vcgeq_u8(lo, self.high));
                let hi = vorrq_u8(self.structural(hi), vcgeq_u8(hi, self.high));

                neon_movemask(lo) | (neon_movemask(hi) << 16)
            }
        }

        #[inline(always)]
        pub fn mask_units(&self, chunk: &[u16]) -> u32 {
            assert!(chunk.len() >= LANES);

            unsafe {
                let ptr = chunk.as_ptr();

                // vqmovn saturates anything above 0xff to 0xff
                let lo = vcombine_u8(vqmovn_u16(vld1q_u16(ptr)), vqmovn_u16(vld1q_u16(ptr.add(8))));
                let hi = vcombine_u8(
                    vqmovn_u16(vld1q_u16(ptr.add(16))),
                    vqmovn_u16(vld1q_u16(ptr.add(24))),
                );

                neon_movemask(self.structural(lo)) | (neon_movemask(self.structural(hi)) << 16)
            }
        }
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod portable {
    use super::LANES;

    #[derive(Debug, Clone, Copy)]
    pub struct PortableKernel {
        delimiter: u8,
    }

    impl PortableKernel {
        #[inline]
        pub fn new(delimiter: u8) -> Self {
            Self { delimiter }
        }

        #[inline(always)]
        fn is_structural(&self, byte: u8) -> bool {
            byte == self.delimiter || byte == b'"' || byte == b'\n'
        }

        #[inline(always)]
        pub fn mask_bytes(&self, chunk: &[u8]) -> u32 {
            chunk[..LANES]
                .iter()
                .enumerate()
                .fold(0, |mask, (i, &byte)| {
                    mask | (((self.is_structural(byte) || byte >= 0x80) as u32) << i)
                })
        }

        #[inline(always)]
        pub fn mask_units(&self, chunk: &[u16]) -> u32 {
            chunk[..LANES]
                .iter()
                .enumerate()
                .fold(0, |mask, (i, &unit)| {
                    let narrowed = unit.min(0xff) as u8;
                    mask | ((self.is_structural(narrowed) as u32) << i)
                })
        }
    }
}

/// Returns the SIMD instructions set used by the vectorized scanner.
pub fn kernel_simd_instructions() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        "sse2"
    }

    #[cfg(target_arch = "aarch64")]
    {
        "neon"
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        "none"
    }
}

/// Arch-dispatched classification kernel, splatted once per reader.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    #[cfg(target_arch = "x86_64")]
    inner: x86_64::Sse2Kernel,

    #[cfg(target_arch = "aarch64")]
    inner: aarch64::NeonKernel,

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    inner: portable::PortableKernel,
}

impl Kernel {
    #[inline]
    pub fn new(delimiter: u8) -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Self {
                inner: x86_64::Sse2Kernel::new(delimiter),
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            Self {
                inner: aarch64::NeonKernel::new(delimiter),
            }
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            Self {
                inner: portable::PortableKernel::new(delimiter),
            }
        }
    }

    /// Mask of structural or non-ASCII bytes among the first [`LANES`] bytes.
    #[inline(always)]
    pub fn mask_bytes(&self, chunk: &[u8]) -> u32 {
        self.inner.mask_bytes(chunk)
    }

    /// Mask of structural units among the first [`LANES`] UTF-16 units.
    #[inline(always)]
    pub fn mask_units(&self, chunk: &[u16]) -> u32 {
        self.inner.mask_units(chunk)
    }
}
