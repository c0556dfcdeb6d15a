// Deeper frame stacks are refused with a runtime error before the host stack runs out.
pub(crate) const VM_MAX_FRAME_COUNT: usize = 128;

pub(crate) const DEFAULT_FILENAME: &str = "<input>";
pub(crate) const DEFAULT_FIRST_ROW: usize = 1;
