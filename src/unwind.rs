#![allow(non_upper_case_globals)]

use std::ffi::CStr;
use std::mem;
use std::os::raw::{c_char, c_void};
use std::ptr;

use unwind_sys::{
    _UPT_accessors, _UPT_create, _UPT_destroy, unw_addr_space_t, unw_create_addr_space,
    unw_cursor_t, unw_destroy_addr_space, unw_get_proc_name, unw_get_reg, unw_init_remote,
    unw_step, unw_word_t, UNW_REG_IP,
};

use crate::error::{Error, Result};
use crate::types::{Stack, StackFrame, Step, ThreadId, Word};

/// The external unwinder, one cursor per capture.
///
/// Error values are the provider's raw return codes.
pub trait UnwindProvider {
    type Cursor;

    /// Opens a cursor at the innermost frame of a stopped thread.
    fn init_remote(&mut self, tid: ThreadId) -> std::result::Result<Self::Cursor, i32>;
    fn instruction_pointer(&mut self, cursor: &mut Self::Cursor) -> std::result::Result<Word, i32>;
    /// Moves the cursor one frame outward.
    fn step(&mut self, cursor: &mut Self::Cursor) -> std::result::Result<Step, i32>;
    /// Name and offset of the procedure the cursor is in, if known.
    fn resolve_symbol(&mut self, cursor: &mut Self::Cursor) -> Option<(String, Word)>;
}

/// Walks the stack of one stopped thread.
///
/// Resources live only as long as the cursor, which is dropped before this returns. Fails if
/// the stack is deeper than `max_frames`, since that usually means the unwind info is bogus.
pub fn capture<P: UnwindProvider>(
    provider: &mut P,
    tid: ThreadId,
    max_frames: usize,
) -> Result<Stack> {
    let mut cursor = provider
        .init_remote(tid)
        .map_err(|code| Error::UnwindInit { tid, code })?;

    let mut frames = Vec::new();
    let mut last_ip = 0;
    loop {
        let ip = provider
            .instruction_pointer(&mut cursor)
            .map_err(|code| Error::UnwindStep { tid, code, last_ip })?;
        let start_ip = frames.first().map_or(ip, |f: &StackFrame| f.ip);

        let frame = match provider.resolve_symbol(&mut cursor) {
            Some((symbol, offset)) => StackFrame::new(ip, symbol, offset),
            None => StackFrame::new(ip, String::new(), 0),
        };
        frames.push(frame);
        last_ip = ip;

        if frames.len() > max_frames {
            return Err(Error::UnwindTooDeep {
                tid,
                max_frames,
                start_ip,
            });
        }

        match provider.step(&mut cursor) {
            Ok(Step::More) => {}
            Ok(Step::Done) => break,
            Err(code) => {
                if let Ok(ip) = provider.instruction_pointer(&mut cursor) {
                    last_ip = ip;
                }
                return Err(Error::UnwindStep { tid, code, last_ip });
            }
        }
    }

    Ok(frames)
}

/// libunwind walking a remote thread through its ptrace accessors.
///
/// The address space is shared by every capture of a run; each cursor brings its own ptrace
/// context, destroyed when the cursor is dropped.
pub struct LibunwindProvider {
    space: unw_addr_space_t,
    demangle: bool,
}

impl LibunwindProvider {
    pub fn new(demangle: bool) -> Result<Self> {
        let space = unsafe { unw_create_addr_space(ptr::addr_of!(_UPT_accessors) as *mut _, 0) };
        if space.is_null() {
            return Err(Error::UnwinderUnavailable);
        }
        Ok(LibunwindProvider { space, demangle })
    }
}

impl Drop for LibunwindProvider {
    fn drop(&mut self) {
        unsafe { unw_destroy_addr_space(self.space) };
    }
}

pub struct RemoteCursor {
    cursor: unw_cursor_t,
    upt: *mut c_void,
}

impl Drop for RemoteCursor {
    fn drop(&mut self) {
        unsafe { _UPT_destroy(self.upt) };
    }
}

impl UnwindProvider for LibunwindProvider {
    type Cursor = RemoteCursor;

    fn init_remote(&mut self, tid: ThreadId) -> std::result::Result<RemoteCursor, i32> {
        let upt = unsafe { _UPT_create(tid.as_raw()) };
        if upt.is_null() {
            return Err(-1);
        }
        let mut remote = RemoteCursor {
            cursor: unsafe { mem::zeroed() },
            upt,
        };
        let ret = unsafe { unw_init_remote(&mut remote.cursor, self.space, remote.upt) };
        if ret != 0 {
            return Err(ret);
        }
        Ok(remote)
    }

    fn instruction_pointer(&mut self, cursor: &mut RemoteCursor) -> std::result::Result<Word, i32> {
        let mut ip: unw_word_t = 0;
        let ret = unsafe { unw_get_reg(&mut cursor.cursor, UNW_REG_IP, &mut ip) };
        if ret < 0 {
            return Err(ret);
        }
        Ok(ip as Word)
    }

    fn step(&mut self, cursor: &mut RemoteCursor) -> std::result::Result<Step, i32> {
        match unsafe { unw_step(&mut cursor.cursor) } {
            ret if ret < 0 => Err(ret),
            0 => Ok(Step::Done),
            _ => Ok(Step::More),
        }
    }

    fn resolve_symbol(&mut self, cursor: &mut RemoteCursor) -> Option<(String, Word)> {
        let mut buf = [0 as c_char; 1024];
        let mut off: unw_word_t = 0;
        let ret = unsafe {
            unw_get_proc_name(&mut cursor.cursor, buf.as_mut_ptr(), buf.len(), &mut off)
        };
        if ret < 0 {
            return None;
        }
        let raw = unsafe { CStr::from_ptr(buf.as_ptr()) }.to_string_lossy();
        let name = if self.demangle {
            demangle(&raw)
        } else {
            raw.into_owned()
        };
        Some((name, off as Word))
    }
}

/// Rust symbols without their hash suffix; anything else unchanged.
pub fn demangle(symbol: &str) -> String {
    match rustc_demangle::try_demangle(symbol) {
        Ok(demangled) => format!("{:#}", demangled),
        Err(_) => symbol.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::UnwindProvider;
    use crate::types::{Step, ThreadId, Word};

    /// What a scripted thread's stack looks like.
    #[derive(Clone, Debug)]
    pub enum Script {
        /// Symbols innermost first; each frame gets a distinct ip.
        Frames(Vec<&'static str>),
        /// Like `Frames`, but the step after the given frame index fails.
        StepFailsAfter(Vec<&'static str>, usize),
        InitFails,
    }

    pub struct FakeCursor {
        frames: Vec<&'static str>,
        fail_after: Option<usize>,
        pos: usize,
        ip_base: Word,
    }

    /// Serves canned stacks per thread. `ip_base` shifts every address, to check that
    /// aggregation ignores them.
    #[derive(Default)]
    pub struct FakeUnwinder {
        pub scripts: HashMap<i32, Script>,
        pub ip_base: Word,
        pub captures: usize,
    }

    impl FakeUnwinder {
        pub fn new() -> Self {
            FakeUnwinder {
                ip_base: 0x1000,
                ..Default::default()
            }
        }

        pub fn script(mut self, tid: i32, script: Script) -> Self {
            self.scripts.insert(tid, script);
            self
        }
    }

    impl UnwindProvider for FakeUnwinder {
        type Cursor = FakeCursor;

        fn init_remote(&mut self, tid: ThreadId) -> Result<FakeCursor, i32> {
            self.captures += 1;
            let (frames, fail_after) = match self.scripts.get(&tid.as_raw()) {
                Some(Script::Frames(frames)) => (frames.clone(), None),
                Some(Script::StepFailsAfter(frames, n)) => (frames.clone(), Some(*n)),
                Some(Script::InitFails) | None => return Err(-10),
            };
            Ok(FakeCursor {
                frames,
                fail_after,
                pos: 0,
                ip_base: self.ip_base,
            })
        }

        fn instruction_pointer(&mut self, cursor: &mut FakeCursor) -> Result<Word, i32> {
            Ok(cursor.ip_base + cursor.pos as Word * 0x10)
        }

        fn step(&mut self, cursor: &mut FakeCursor) -> Result<Step, i32> {
            if cursor.fail_after == Some(cursor.pos) {
                return Err(-7);
            }
            cursor.pos += 1;
            if cursor.pos >= cursor.frames.len() {
                Ok(Step::Done)
            } else {
                Ok(Step::More)
            }
        }

        fn resolve_symbol(&mut self, cursor: &mut FakeCursor) -> Option<(String, Word)> {
            match cursor.frames.get(cursor.pos) {
                Some(name) if !name.is_empty() => Some((name.to_string(), cursor.pos as Word)),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeUnwinder, Script};
    use super::*;
    use crate::types::DEFAULT_MAX_FRAMES;

    fn tid(raw: i32) -> ThreadId {
        ThreadId::from_raw(raw)
    }

    #[test]
    fn captures_leaf_first() {
        let mut unwinder = FakeUnwinder::new().script(1, Script::Frames(vec!["g", "f", "main"]));
        let stack = capture(&mut unwinder, tid(1), DEFAULT_MAX_FRAMES).unwrap();
        let names: Vec<_> = stack.iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(names, vec!["g", "f", "main"]);
        assert_eq!(stack[0].ip, 0x1000);
        assert_eq!(stack[2].ip, 0x1020);
    }

    #[test]
    fn unresolved_symbol_is_empty() {
        let mut unwinder = FakeUnwinder::new().script(1, Script::Frames(vec!["g", "", "main"]));
        let stack = capture(&mut unwinder, tid(1), DEFAULT_MAX_FRAMES).unwrap();
        assert_eq!(stack.len(), 3);
        assert_eq!(stack[1].symbol, "");
        assert_eq!(stack[1].offset, 0);
    }

    #[test]
    fn cap_is_inclusive() {
        let frames = vec!["f"; 64];
        let mut unwinder = FakeUnwinder::new().script(1, Script::Frames(frames));
        let stack = capture(&mut unwinder, tid(1), DEFAULT_MAX_FRAMES).unwrap();
        assert_eq!(stack.len(), 64);
    }

    #[test]
    fn too_deep() {
        let frames = vec!["f"; 65];
        let mut unwinder = FakeUnwinder::new().script(1, Script::Frames(frames));
        match capture(&mut unwinder, tid(1), DEFAULT_MAX_FRAMES) {
            Err(Error::UnwindTooDeep {
                max_frames,
                start_ip,
                ..
            }) => {
                assert_eq!(max_frames, 64);
                assert_eq!(start_ip, 0x1000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn step_failure_reports_last_ip() {
        let mut unwinder = FakeUnwinder::new()
            .script(1, Script::StepFailsAfter(vec!["g", "f", "main"], 1));
        match capture(&mut unwinder, tid(1), DEFAULT_MAX_FRAMES) {
            Err(Error::UnwindStep { code, last_ip, .. }) => {
                assert_eq!(code, -7);
                assert_eq!(last_ip, 0x1010);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn init_failure() {
        let mut unwinder = FakeUnwinder::new().script(1, Script::InitFails);
        match capture(&mut unwinder, tid(1), DEFAULT_MAX_FRAMES) {
            Err(Error::UnwindInit { code, .. }) => assert_eq!(code, -10),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn demangles_rust_symbols() {
        assert_eq!(demangle("_ZN4testE"), "test");
        assert_eq!(demangle("_ZN3foo3bar17h05af221e174051e9E"), "foo::bar");
        assert_eq!(demangle("pthread_cond_wait"), "pthread_cond_wait");
        assert_eq!(
            demangle("_ZN61_$LT$$u5b$u8$u3b$$u20$32$u5d$$u20$as$u20$core..fmt..Debug$GT$3fmt17h0123456789abcdefE"),
            "<[u8; 32] as core::fmt::Debug>::fmt"
        );
    }
}
