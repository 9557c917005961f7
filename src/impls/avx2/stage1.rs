use crate::stage1::Stage1Parse;

use std::arch::x86_64::{
    __m256i, _mm_clmulepi64_si128, _mm_cvtsi128_si64, _mm_set_epi64x, _mm_set1_epi8,
    _mm256_add_epi32, _mm256_and_si256, _mm256_cmpeq_epi8, _mm256_loadu_si256, _mm256_max_epu8,
    _mm256_movemask_epi8, _mm256_set_epi32, _mm256_set1_epi8, _mm256_setr_epi8,
    _mm256_setzero_si256, _mm256_shuffle_epi8, _mm256_srli_epi32, _mm256_storeu_si256,
};

macro_rules! low_nibble_mask {
    () => {
        _mm256_setr_epi8(
            16, 0, 0, 0, 0, 0, 0, 0, 0, 8, 12, 1, 2, 9, 0, 0, 16, 0, 0, 0, 0, 0, 0, 0, 0, 8, 12,
            1, 2, 9, 0, 0,
        )
    };
}

macro_rules! high_nibble_mask {
    () => {
        _mm256_setr_epi8(
            8, 0, 18, 4, 0, 1, 0, 1, 0, 0, 0, 3, 2, 1, 0, 0, 8, 0, 18, 4, 0, 1, 0, 1, 0, 0, 0, 3,
            2, 1, 0, 0,
        )
    };
}

/// 64 input bytes held as two 256-bit lanes.
#[derive(Debug)]
pub(crate) struct SimdInput {
    v0: __m256i,
    v1: __m256i,
}

impl Stage1Parse for SimdInput {
    type SimdRepresentation = __m256i;

    #[cfg_attr(not(feature = "no-inline"), inline)]
    // _mm256_loadu_si256 does not need alignment
    #[allow(clippy::cast_ptr_alignment)]
    #[target_feature(enable = "avx2")]
    unsafe fn new(ptr: &[u8]) -> Self {
        unsafe {
            Self {
                v0: _mm256_loadu_si256(ptr.as_ptr().cast::<__m256i>()),
                v1: _mm256_loadu_si256(ptr.as_ptr().add(32).cast::<__m256i>()),
            }
        }
    }

    #[cfg_attr(not(feature = "no-inline"), inline)]
    #[allow(clippy::cast_sign_loss)]
    #[target_feature(enable = "avx2,pclmulqdq")]
    unsafe fn compute_quote_mask(quote_bits: u64) -> u64 {
        unsafe {
            _mm_cvtsi128_si64(_mm_clmulepi64_si128(
                _mm_set_epi64x(0, static_cast_i64!(quote_bits)),
                _mm_set1_epi8(-1_i8 /* 0xFF */),
                0,
            )) as u64
        }
    }

    /// Returns a mask where bit i = 1 means byte i of input matches m.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    #[target_feature(enable = "avx2")]
    unsafe fn cmp_mask_against_input(&self, m: u8) -> u64 {
        unsafe {
            let mask = _mm256_set1_epi8(m as i8);
            let cmp_res_0 = _mm256_cmpeq_epi8(self.v0, mask);
            let res_0 = u64::from(static_cast_u32!(_mm256_movemask_epi8(cmp_res_0)));
            let cmp_res_1 = _mm256_cmpeq_epi8(self.v1, mask);
            let res_1 = u64::from(static_cast_u32!(_mm256_movemask_epi8(cmp_res_1)));
            res_0 | (res_1 << 32)
        }
    }

    // find all values less than or equal than the content of maxval.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    #[allow(clippy::cast_sign_loss)]
    #[target_feature(enable = "avx2")]
    unsafe fn unsigned_lteq_against_input(&self, maxval: __m256i) -> u64 {
        unsafe {
            let cmp_res_0 = _mm256_cmpeq_epi8(_mm256_max_epu8(maxval, self.v0), maxval);
            let res_0 = u64::from(static_cast_u32!(_mm256_movemask_epi8(cmp_res_0)));
            let cmp_res_1 = _mm256_cmpeq_epi8(_mm256_max_epu8(maxval, self.v1), maxval);
            let res_1 = u64::from(static_cast_u32!(_mm256_movemask_epi8(cmp_res_1)));
            res_0 | (res_1 << 32)
        }
    }

    #[cfg_attr(not(feature = "no-inline"), inline)]
    #[allow(clippy::cast_sign_loss)]
    #[target_feature(enable = "avx2")]
    unsafe fn find_whitespace_and_structurals(&self, whitespace: &mut u64, structurals: &mut u64) {
        unsafe {
            // The nibble tables classify each byte with one bit per class:
            // bits 0..2 cover { } [ ] : , and bits 3..4 cover the four
            // whitespace bytes. ANDing the low- and high-nibble lookups
            // yields the class bits actually present.
            let low_nibble_mask = low_nibble_mask!();
            let high_nibble_mask = high_nibble_mask!();

            let structural_shufti_mask = _mm256_set1_epi8(0x7);
            let whitespace_shufti_mask = _mm256_set1_epi8(0x18);

            // MSB-set bytes shuffle to zero, so non-ASCII input classifies
            // as neither structural nor whitespace.
            let msb_mask = _mm256_set1_epi8(0x7f);

            let v_0 = _mm256_and_si256(
                _mm256_shuffle_epi8(low_nibble_mask, self.v0),
                _mm256_shuffle_epi8(
                    high_nibble_mask,
                    _mm256_and_si256(_mm256_srli_epi32::<4>(self.v0), msb_mask),
                ),
            );
            let v_1 = _mm256_and_si256(
                _mm256_shuffle_epi8(low_nibble_mask, self.v1),
                _mm256_shuffle_epi8(
                    high_nibble_mask,
                    _mm256_and_si256(_mm256_srli_epi32::<4>(self.v1), msb_mask),
                ),
            );

            let tmp_0 = _mm256_cmpeq_epi8(
                _mm256_and_si256(v_0, structural_shufti_mask),
                _mm256_setzero_si256(),
            );
            let tmp_1 = _mm256_cmpeq_epi8(
                _mm256_and_si256(v_1, structural_shufti_mask),
                _mm256_setzero_si256(),
            );
            let structural_res_0 = u64::from(static_cast_u32!(_mm256_movemask_epi8(tmp_0)));
            let structural_res_1 = u64::from(static_cast_u32!(_mm256_movemask_epi8(tmp_1)));
            *structurals = !(structural_res_0 | (structural_res_1 << 32));

            let tmp_ws_0 = _mm256_cmpeq_epi8(
                _mm256_and_si256(v_0, whitespace_shufti_mask),
                _mm256_setzero_si256(),
            );
            let tmp_ws_1 = _mm256_cmpeq_epi8(
                _mm256_and_si256(v_1, whitespace_shufti_mask),
                _mm256_setzero_si256(),
            );
            let ws_res_0 = u64::from(static_cast_u32!(_mm256_movemask_epi8(tmp_ws_0)));
            let ws_res_1 = u64::from(static_cast_u32!(_mm256_movemask_epi8(tmp_ws_1)));
            *whitespace = !(ws_res_0 | (ws_res_1 << 32));
        }
    }

    // flatten out values in 'bits' assuming that they are are to have values
    // of idx plus their position in the bitvector, and store these indexes
    // at base_ptr[base] incrementing base as we go. Will potentially store
    // extra values beyond end of valid bits, so base needs to be large
    // enough to handle this.
    #[cfg_attr(not(feature = "no-inline"), inline)]
    #[allow(clippy::cast_possible_wrap, clippy::cast_ptr_alignment)]
    #[target_feature(enable = "avx2")]
    unsafe fn flatten_bits(base: &mut Vec<u32>, idx: u32, mut bits: u64) {
        unsafe {
            let cnt: usize = bits.count_ones() as usize;
            let mut l = base.len();
            let idx_64_v = _mm256_set_epi32(
                static_cast_i32!(idx),
                static_cast_i32!(idx),
                static_cast_i32!(idx),
                static_cast_i32!(idx),
                static_cast_i32!(idx),
                static_cast_i32!(idx),
                static_cast_i32!(idx),
                static_cast_i32!(idx),
            );

            // We reserve 64 extra entries because we have at most 64 bits
            // to set, then truncate to the final length afterwards. We may
            // write over the set length but the space is reserved.
            base.reserve(64);
            let final_len = l + cnt;

            while bits != 0 {
                let v0 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);
                let v1 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);
                let v2 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);
                let v3 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);
                let v4 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);
                let v5 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);
                let v6 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);
                let v7 = bits.trailing_zeros() as i32;
                bits &= bits.wrapping_sub(1);

                let v: __m256i = _mm256_set_epi32(v7, v6, v5, v4, v3, v2, v1, v0);
                let v: __m256i = _mm256_add_epi32(idx_64_v, v);
                _mm256_storeu_si256(base.as_mut_ptr().add(l).cast::<__m256i>(), v);
                l += 8;
            }
            base.set_len(final_len);
        }
    }

    #[cfg_attr(not(feature = "no-inline"), inline)]
    #[target_feature(enable = "avx2")]
    unsafe fn fill_s8(n: i8) -> __m256i {
        unsafe { _mm256_set1_epi8(n) }
    }
}
