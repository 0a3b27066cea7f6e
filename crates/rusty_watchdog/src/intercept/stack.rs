//! Call-scope tracking.
//!
//! Rust has no runtime call-stack reflection that yields readable function
//! identifiers, so instrumented functions push a [`Frame`] for the duration of
//! their body (see `#[intercept]` and `#[call_scope]`). The frames of the
//! current thread are what a [`StackWalker`] reports.

use crate::identifier::CallIdentifier;
use std::cell::RefCell;

/// One instrumented function activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The running function
    pub function: CallIdentifier,
    /// The file the frame's code lives in
    pub file: String,
}

/// A frame paired with the identifier of its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedFrame {
    /// The frame itself
    pub frame: Frame,
    /// Caller identifier, or the global-scope sentinel for the outermost frame
    pub scope: CallIdentifier,
}

/// Capability that reports the active frames, innermost first
pub trait StackWalker {
    /// Active frames, innermost first
    fn frames(&self) -> Vec<Frame>;
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Walks the instrumented frames of the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadStack;

impl StackWalker for ThreadStack {
    fn frames(&self) -> Vec<Frame> {
        FRAMES.with(|frames| frames.borrow().iter().rev().cloned().collect())
    }
}

/// Assign each frame the identifier of the frame that called it.
///
/// `frames` is innermost first; the last (outermost) frame has no caller and
/// receives the global-scope sentinel.
pub fn assign_scopes(frames: Vec<Frame>) -> Vec<ScopedFrame> {
    let callers: Vec<CallIdentifier> = frames
        .iter()
        .skip(1)
        .map(|frame| frame.function.clone())
        .chain(std::iter::once(CallIdentifier::global_scope()))
        .collect();

    frames
        .into_iter()
        .zip(callers)
        .map(|(frame, scope)| ScopedFrame { frame, scope })
        .collect()
}

/// Pops its frame when dropped
#[derive(Debug)]
#[must_use = "the scope ends when the guard is dropped"]
pub struct ScopeGuard {
    depth: usize,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        FRAMES.with(|frames| frames.borrow_mut().truncate(self.depth));
    }
}

/// Push a frame for the current thread until the guard is dropped.
pub fn push_frame(frame: Frame) -> ScopeGuard {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let depth = frames.len();
        frames.push(frame);
        ScopeGuard { depth }
    })
}

/// Enter a named scope; used by `#[call_scope]`.
///
/// A name that normalizes to nothing falls back to the global scope.
pub fn enter_scope(function: &str, file: &str) -> ScopeGuard {
    push_frame(Frame {
        function: CallIdentifier::normalize(function).unwrap_or_else(CallIdentifier::global_scope),
        file: file.to_string(),
    })
}

/// Identifier of the innermost active frame, or the global scope.
pub fn current_scope() -> CallIdentifier {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .last()
            .map(|frame| frame.function.clone())
            .unwrap_or_else(CallIdentifier::global_scope)
    })
}
