/// Rebinds an expression as a different integer type without a checked
/// conversion. Used where SIMD index math is known to stay in range.
macro_rules! static_cast_i32 {
    ($v:expr) => {
        $v as i32
    };
}

macro_rules! static_cast_i64 {
    ($v:expr) => {
        $v as i64
    };
}

macro_rules! static_cast_u32 {
    ($v:expr) => {
        $v as u32
    };
}

macro_rules! static_cast_u64 {
    ($v:expr) => {
        $v as u64
    };
}

/// Branch-weight hint. A plain pass-through on stable; the name documents
/// the expected branch direction on the hot path.
macro_rules! unlikely {
    ($e:expr) => {
        $e
    };
}
