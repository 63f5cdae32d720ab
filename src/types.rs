pub use threadinfo::Thread as ThreadId;

/// Deepest stack a capture may produce before it is treated as bogus unwind info.
pub const DEFAULT_MAX_FRAMES: usize = 64;

#[cfg(target_pointer_width = "32")]
pub type Word = u32;
#[cfg(target_pointer_width = "64")]
pub type Word = u64;

/// One step of an unwound stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackFrame {
    pub ip: Word,
    /// Empty if the provider could not resolve a symbol for `ip`.
    pub symbol: String,
    pub offset: Word,
}

impl StackFrame {
    pub fn new(ip: Word, symbol: impl Into<String>, offset: Word) -> Self {
        StackFrame {
            ip,
            symbol: symbol.into(),
            offset,
        }
    }
}

/// Frames of one thread at one instant, innermost call first.
pub type Stack = Vec<StackFrame>;

/// Result of advancing an unwind cursor by one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    More,
    Done,
}
