use std::collections::HashMap;

use crate::value::{EnvId, SymbolId, Value};

/// One lexical scope: local bindings plus a link to the enclosing frame.
struct Frame {
    bindings: HashMap<SymbolId, Value>,
    parent: Option<EnvId>,
}

/// Arena of environment frames. Frames are shared by handle: every closure
/// that captured a frame, and every child frame, refers to the same slot,
/// so mutation through one holder is visible to all of them.
pub struct Environments {
    frames: Vec<Frame>,
}

impl Environments {
    pub fn new() -> Self {
        Environments { frames: Vec::new() }
    }

    /// Create a fresh frame. `parent` is None only for the root.
    pub fn push(&mut self, parent: Option<EnvId>) -> EnvId {
        let id = EnvId(self.frames.len() as u32);
        self.frames.push(Frame {
            bindings: HashMap::new(),
            parent,
        });
        id
    }

    /// Introduce or overwrite a binding in this frame only. Parent frames
    /// are never touched; this is what makes define local.
    pub fn bind(&mut self, env: EnvId, sym: SymbolId, val: Value) {
        self.frames[env.0 as usize].bindings.insert(sym, val);
    }

    /// Look a symbol up the frame chain, innermost first.
    pub fn lookup(&self, env: EnvId, sym: SymbolId) -> Option<Value> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &self.frames[id.0 as usize];
            if let Some(val) = frame.bindings.get(&sym) {
                return Some(val.clone());
            }
            current = frame.parent;
        }
        None
    }

    /// Overwrite the binding in the nearest enclosing frame that already
    /// holds the symbol, returning the previous value. None means no frame
    /// in the chain holds it — set! of an unbound variable.
    pub fn assign(&mut self, env: EnvId, sym: SymbolId, val: Value) -> Option<Value> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &mut self.frames[id.0 as usize];
            if let Some(slot) = frame.bindings.get_mut(&sym) {
                return Some(std::mem::replace(slot, val));
            }
            current = frame.parent;
        }
        None
    }
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}
