mod stage1;

pub(crate) use stage1::SimdInput;
