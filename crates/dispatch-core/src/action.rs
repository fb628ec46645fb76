use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock, PoisonError};

/// A command value: what to do plus the input it needs.
///
/// Each action type declares the result it produces. The concrete type is the
/// lookup key for its handler and session validator.
pub trait Action: Clone + fmt::Debug + Send + Sync + 'static {
    type Result: Clone + fmt::Debug + Send + Sync + 'static;

    /// Short, human-readable type name used in errors and logs.
    fn name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Stable identifier of an action type.
#[derive(Clone, Copy)]
pub struct ActionKey {
    id: TypeId,
    name: &'static str,
}

impl ActionKey {
    pub fn of<A: Action>() -> Self {
        Self {
            id: TypeId::of::<A>(),
            name: A::name(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ActionKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActionKey {}

impl Hash for ActionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// `my_app::widgets::CreateWidget` -> `CreateWidget`, and
/// `my_app::Batch<alloc::string::String>` -> `Batch<String>`.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    if !full.contains('<') {
        return strip_path(full);
    }

    // Generic names need a new string; each distinct one is leaked once.
    static GENERIC_NAMES: OnceLock<Mutex<HashMap<&'static str, &'static str>>> = OnceLock::new();
    let mut names = GENERIC_NAMES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *names.entry(full).or_insert_with(|| {
        let short: &'static str = Box::leak(strip_paths(full).into_boxed_str());
        short
    })
}

fn strip_path(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

fn strip_paths(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut start = 0;
    for (idx, ch) in full.char_indices() {
        if matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' | '*') {
            out.push_str(strip_path(&full[start..idx]));
            out.push(ch);
            start = idx + ch.len_utf8();
        }
    }
    out.push_str(strip_path(&full[start..]));
    out
}
