//! The compiled (builtin) world: a static registry of known native classes.
//!
//! Native classes have no analyzable method bodies; their members are
//! behavior-tagged routines the engine executes directly. This mirrors how
//! real builtins behave without loading an interpreter.

use crate::arguments::Arguments;
use crate::context::{ContextId, ContextSet, InstanceKind};
use crate::evaluator::Evaluator;
use crate::instance;

/// Index into the builtin class registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuiltinClassId(u8);

impl BuiltinClassId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) const OBJECT: BuiltinClassId = BuiltinClassId(0);
pub(crate) const TYPE: BuiltinClassId = BuiltinClassId(1);
pub(crate) const FUNCTION: BuiltinClassId = BuiltinClassId(2);
pub(crate) const NONE_TYPE: BuiltinClassId = BuiltinClassId(3);
pub(crate) const BOOL: BuiltinClassId = BuiltinClassId(4);
pub(crate) const INT: BuiltinClassId = BuiltinClassId(5);
pub(crate) const FLOAT: BuiltinClassId = BuiltinClassId(6);
pub(crate) const STR: BuiltinClassId = BuiltinClassId(7);
pub(crate) const LIST: BuiltinClassId = BuiltinClassId(8);
pub(crate) const SET: BuiltinClassId = BuiltinClassId(9);
pub(crate) const FROZENSET: BuiltinClassId = BuiltinClassId(10);
pub(crate) const DICT: BuiltinClassId = BuiltinClassId(11);
pub(crate) const TUPLE: BuiltinClassId = BuiltinClassId(12);
pub(crate) const ITERATOR: BuiltinClassId = BuiltinClassId(13);

#[derive(Debug)]
pub(crate) struct BuiltinClass {
    pub(crate) name: &'static str,
    pub(crate) base: Option<BuiltinClassId>,
    pub(crate) methods: &'static [BuiltinMethod],
}

#[derive(Debug)]
pub(crate) struct BuiltinMethod {
    pub(crate) name: &'static str,
    /// Declared parameter names, receiver first.
    pub(crate) params: &'static [&'static str],
    pub(crate) behavior: Behavior,
}

/// What executing a builtin routine produces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Mutators like `list.append`: the call itself yields `None`.
    ReturnNone,
    /// Yields the receiver's element types.
    Elements,
    /// Yields an iterator instance over the receiver's element types.
    Iterator,
}

static CLASSES: &[BuiltinClass] = &[
    BuiltinClass {
        name: "object",
        base: None,
        methods: &[],
    },
    BuiltinClass {
        name: "type",
        base: Some(OBJECT),
        methods: &[],
    },
    BuiltinClass {
        name: "function",
        base: Some(OBJECT),
        methods: &[],
    },
    BuiltinClass {
        name: "NoneType",
        base: Some(OBJECT),
        methods: &[],
    },
    BuiltinClass {
        name: "bool",
        base: Some(INT),
        methods: &[],
    },
    BuiltinClass {
        name: "int",
        base: Some(OBJECT),
        methods: &[],
    },
    BuiltinClass {
        name: "float",
        base: Some(OBJECT),
        methods: &[],
    },
    BuiltinClass {
        name: "str",
        base: Some(OBJECT),
        methods: &[],
    },
    BuiltinClass {
        name: "list",
        base: Some(OBJECT),
        methods: &[
            BuiltinMethod {
                name: "append",
                params: &["self", "object"],
                behavior: Behavior::ReturnNone,
            },
            BuiltinMethod {
                name: "insert",
                params: &["self", "index", "object"],
                behavior: Behavior::ReturnNone,
            },
            BuiltinMethod {
                name: "pop",
                params: &["self"],
                behavior: Behavior::Elements,
            },
            BuiltinMethod {
                name: "__getitem__",
                params: &["self", "index"],
                behavior: Behavior::Elements,
            },
            BuiltinMethod {
                name: "__iter__",
                params: &["self"],
                behavior: Behavior::Iterator,
            },
        ],
    },
    BuiltinClass {
        name: "set",
        base: Some(OBJECT),
        methods: &[
            BuiltinMethod {
                name: "add",
                params: &["self", "object"],
                behavior: Behavior::ReturnNone,
            },
            BuiltinMethod {
                name: "pop",
                params: &["self"],
                behavior: Behavior::Elements,
            },
            BuiltinMethod {
                name: "__iter__",
                params: &["self"],
                behavior: Behavior::Iterator,
            },
        ],
    },
    BuiltinClass {
        name: "frozenset",
        base: Some(OBJECT),
        methods: &[BuiltinMethod {
            name: "__iter__",
            params: &["self"],
            behavior: Behavior::Iterator,
        }],
    },
    BuiltinClass {
        name: "dict",
        base: Some(OBJECT),
        methods: &[],
    },
    BuiltinClass {
        name: "tuple",
        base: Some(OBJECT),
        methods: &[
            BuiltinMethod {
                name: "__getitem__",
                params: &["self", "index"],
                behavior: Behavior::Elements,
            },
            BuiltinMethod {
                name: "__iter__",
                params: &["self"],
                behavior: Behavior::Iterator,
            },
        ],
    },
    BuiltinClass {
        name: "iterator",
        base: Some(OBJECT),
        methods: &[
            BuiltinMethod {
                name: "__next__",
                params: &["self"],
                behavior: Behavior::Elements,
            },
            BuiltinMethod {
                name: "next",
                params: &["self"],
                behavior: Behavior::Elements,
            },
            BuiltinMethod {
                name: "__iter__",
                params: &["self"],
                behavior: Behavior::Iterator,
            },
        ],
    },
];

pub(crate) fn class(id: BuiltinClassId) -> &'static BuiltinClass {
    &CLASSES[id.index()]
}

pub(crate) fn by_name(name: &str) -> Option<BuiltinClassId> {
    CLASSES
        .iter()
        .position(|class| class.name == name)
        .map(|index| BuiltinClassId(u8::try_from(index).expect("registry too large")))
}

/// Looks up a method on this class only (the caller iterates the MRO).
pub(crate) fn find_method(id: BuiltinClassId, name: &str) -> Option<usize> {
    class(id).methods.iter().position(|method| method.name == name)
}

pub(crate) fn method(id: BuiltinClassId, index: usize) -> &'static BuiltinMethod {
    &class(id).methods[index]
}

/// Whether instances of this class carry inferable element types.
pub(crate) fn is_container(id: BuiltinClassId) -> bool {
    matches!(id, LIST | SET | FROZENSET | DICT | TUPLE | STR)
}

/// Executes a builtin routine by its behavior tag.
pub(crate) fn execute_method(
    ev: &Evaluator,
    receiver: Option<ContextId>,
    id: BuiltinClassId,
    index: usize,
    _arguments: &Arguments,
) -> ContextSet {
    let behavior = method(id, index).behavior;
    let Some(receiver) = receiver else {
        // Unbound builtin routines have no receiver to draw elements from.
        return match behavior {
            Behavior::ReturnNone => ContextSet::single(ev.none_object()),
            Behavior::Elements | Behavior::Iterator => ContextSet::empty(),
        };
    };
    match behavior {
        Behavior::ReturnNone => ContextSet::single(ev.none_object()),
        Behavior::Elements => instance::element_types(ev, receiver),
        Behavior::Iterator => {
            let elements = instance::element_types(ev, receiver);
            let iterator = ev.compiled_instance(
                ITERATOR,
                Arguments::Values(vec![elements]),
                InstanceKind::Compiled,
            );
            ContextSet::single(iterator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("list"), Some(LIST));
        assert_eq!(by_name("object"), Some(OBJECT));
        assert_eq!(by_name("no_such_class"), None);
    }

    #[test]
    fn version_sensitive_next_slot() {
        assert!(find_method(ITERATOR, "__next__").is_some());
        assert!(find_method(ITERATOR, "next").is_some());
        assert!(find_method(LIST, "__next__").is_none());
    }

    #[test]
    fn bool_inherits_from_int() {
        assert_eq!(class(BOOL).base, Some(INT));
    }
}
