use scry_python_semantic::{
    Arguments, ContextId, ContextSet, DiagnosticKind, Evaluator, PythonVersion, Settings,
};

fn evaluator(source: &str) -> (Evaluator, ContextId) {
    let ev = Evaluator::new(Settings::default());
    let module = ev.add_module("example", source).expect("source parses");
    (ev, module)
}

fn single(ev: &Evaluator, values: &ContextSet) -> ContextId {
    assert_eq!(
        values.len(),
        1,
        "expected a single value, got {:?}",
        descriptions(ev, values)
    );
    values.iter().next().unwrap()
}

fn descriptions(ev: &Evaluator, values: &ContextSet) -> Vec<String> {
    values.iter().map(|value| ev.describe(value)).collect()
}

#[test]
fn self_attribute_is_inferred_from_init() {
    let (ev, module) = evaluator(
        "\
class Foo:
    def __init__(self):
        self.x = 1

f = Foo()
",
    );
    let f = single(&ev, &ev.module_value(module, "f"));
    assert_eq!(ev.describe(f), "instance of Foo");
    assert_eq!(descriptions(&ev, &ev.attribute(f, "x")), ["instance of int"]);
}

#[test]
fn self_attribute_sees_constructor_arguments() {
    let (ev, module) = evaluator(
        "\
class Foo:
    def __init__(self, value):
        self.value = value

f = Foo('hello')
",
    );
    let f = single(&ev, &ev.module_value(module, "f"));
    assert_eq!(
        descriptions(&ev, &ev.attribute(f, "value")),
        ["instance of str"]
    );
}

#[test]
fn self_assignment_shadows_class_level_definitions() {
    let (ev, module) = evaluator(
        "\
class Base:
    x = ''

class Child(Base):
    x = ''

    def __init__(self):
        self.x = 1

c = Child()
",
    );
    let c = single(&ev, &ev.module_value(module, "c"));
    assert_eq!(descriptions(&ev, &ev.attribute(c, "x")), ["instance of int"]);
}

#[test]
fn base_class_self_assignment_shadows_derived_class_attributes() {
    let (ev, module) = evaluator(
        "\
class Base:
    def setup(self):
        self.x = 1

class Child(Base):
    x = ''

c = Child()
",
    );
    let c = single(&ev, &ev.module_value(module, "c"));
    assert_eq!(descriptions(&ev, &ev.attribute(c, "x")), ["instance of int"]);
}

#[test]
fn self_attributes_assigned_from_method_calls_resolve() {
    let (ev, module) = evaluator(
        "\
class App:
    def make(self):
        return 1

    def setup(self):
        self.x = self.make()

a = App()
",
    );
    let a = single(&ev, &ev.module_value(module, "a"));
    assert_eq!(descriptions(&ev, &ev.attribute(a, "x")), ["instance of int"]);
}

#[test]
fn first_matching_mro_class_shadows_later_ones() {
    let (ev, module) = evaluator(
        "\
class Base:
    def method(self):
        return 1

    def base_only(self):
        return 1

class Child(Base):
    def method(self):
        return ''

c = Child()
",
    );
    let c = single(&ev, &ev.module_value(module, "c"));
    let method = single(&ev, &ev.attribute(c, "method"));
    assert_eq!(
        descriptions(&ev, &ev.execute(method, Arguments::Values(Vec::new()))),
        ["instance of str"]
    );
    let inherited = single(&ev, &ev.attribute(c, "base_only"));
    assert_eq!(
        descriptions(&ev, &ev.execute(inherited, Arguments::Values(Vec::new()))),
        ["instance of int"]
    );
}

#[test]
fn self_assigned_dunder_does_not_satisfy_call_protocol() {
    let (ev, module) = evaluator(
        "\
class Sneaky:
    def __init__(self):
        self.__call__ = 1

s = Sneaky()
",
    );
    let s = single(&ev, &ev.module_value(module, "s"));
    let result = ev.execute(s, Arguments::Values(Vec::new()));
    assert!(result.is_empty());
    let diagnostics = ev.take_diagnostics();
    assert!(diagnostics
        .iter()
        .any(|diagnostic| diagnostic.kind == DiagnosticKind::NotCallable));
}

#[test]
fn class_level_dunder_satisfies_call_protocol() {
    let (ev, module) = evaluator(
        "\
class Adder:
    def __call__(self):
        return 1

a = Adder()
",
    );
    let a = single(&ev, &ev.module_value(module, "a"));
    assert_eq!(
        descriptions(&ev, &ev.execute(a, Arguments::Values(Vec::new()))),
        ["instance of int"]
    );
}

#[test]
fn self_referential_constructor_annotation_terminates() {
    let (ev, module) = evaluator(
        "\
class Node:
    def __init__(self, nxt: Node):
        self.nxt = nxt
",
    );
    let class = single(&ev, &ev.module_value(module, "Node"));
    let node = ev.anonymous_instance(class);
    assert_eq!(
        descriptions(&ev, &ev.attribute(node, "nxt")),
        ["instance of Node"]
    );
}

#[test]
fn bound_method_signature_hides_the_receiver() {
    let (ev, module) = evaluator(
        "\
class Greeter:
    def greet(self, name):
        return name

g = Greeter()
items = [1]
",
    );
    let g = single(&ev, &ev.module_value(module, "g"));
    let greet = single(&ev, &ev.attribute(g, "greet"));
    assert_eq!(ev.parameter_names(greet), ["name"]);

    let items = single(&ev, &ev.module_value(module, "items"));
    let append = single(&ev, &ev.attribute(items, "append"));
    assert_eq!(ev.parameter_names(append), ["object"]);
}

#[test]
fn iteration_runs_iter_then_next() {
    let (ev, module) = evaluator(
        "\
class Cursor:
    def __next__(self):
        return 42

class Numbers:
    def __iter__(self):
        return Cursor()

n = Numbers()
",
    );
    let n = single(&ev, &ev.module_value(module, "n"));
    assert_eq!(descriptions(&ev, &ev.iterate(n)), ["instance of int"]);
}

#[test]
fn python2_iterators_use_the_next_slot() {
    let settings = Settings {
        python_version: PythonVersion::PY27,
        ..Settings::default()
    };
    let ev = Evaluator::new(settings);
    let module = ev
        .add_module(
            "example",
            "\
class Cursor:
    def next(self):
        return ''

class Letters:
    def __iter__(self):
        return Cursor()

l = Letters()
",
        )
        .expect("source parses");
    let l = single(&ev, &ev.module_value(module, "l"));
    assert_eq!(descriptions(&ev, &ev.iterate(l)), ["instance of str"]);
}

#[test]
fn missing_next_is_reported() {
    let (ev, module) = evaluator(
        "\
class NotAnIterator:
    def __iter__(self):
        return Broken()

class Broken:
    def unrelated(self):
        return 1

n = NotAnIterator()
",
    );
    let n = single(&ev, &ev.module_value(module, "n"));
    assert!(ev.iterate(n).is_empty());
    assert!(ev
        .take_diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.kind == DiagnosticKind::MissingNext));
}

#[test]
fn list_literals_carry_their_element_types() {
    let (ev, module) = evaluator("items = [1, '']\n");
    let items = single(&ev, &ev.module_value(module, "items"));
    assert_eq!(
        descriptions(&ev, &ev.iterate(items)),
        ["instance of int", "instance of str"]
    );
}

#[test]
fn subscripting_a_list_yields_its_elements() {
    let (ev, module) = evaluator(
        "\
items = [1]
x = items[0]
",
    );
    let x = single(&ev, &ev.module_value(module, "x"));
    assert_eq!(ev.describe(x), "instance of int");
}

#[test]
fn module_level_appends_refine_element_types() {
    let (ev, module) = evaluator(
        "\
items = list()
items.append(3.5)
",
    );
    let items = single(&ev, &ev.module_value(module, "items"));
    assert_eq!(
        descriptions(&ev, &ev.iterate(items)),
        ["instance of float"]
    );
}

#[test]
fn appends_are_ignored_when_dynamic_additions_are_off() {
    let settings = Settings {
        dynamic_array_additions: false,
        ..Settings::default()
    };
    let ev = Evaluator::new(settings);
    let module = ev
        .add_module(
            "example",
            "\
items = list()
items.append(3.5)
",
        )
        .expect("source parses");
    let items = single(&ev, &ev.module_value(module, "items"));
    assert!(ev.iterate(items).is_empty());
}

#[test]
fn descriptors_run_their_get_slot() {
    let (ev, module) = evaluator(
        "\
class Deferred:
    def __get__(self, obj, owner):
        return 42

class Holder:
    attr = Deferred()

h = Holder()
",
    );
    let h = single(&ev, &ev.module_value(module, "h"));
    assert_eq!(
        descriptions(&ev, &ev.attribute(h, "attr")),
        ["instance of int"]
    );
}

#[test]
fn plain_class_attributes_pass_through_unchanged() {
    let (ev, module) = evaluator(
        "\
class Config:
    default = ''

c = Config()
",
    );
    let c = single(&ev, &ev.module_value(module, "c"));
    assert_eq!(
        descriptions(&ev, &ev.attribute(c, "default")),
        ["instance of str"]
    );
}

#[test]
fn constructor_call_sites_bind_type_variables() {
    let (ev, module) = evaluator(
        "\
T = TypeVar('T')

class Box:
    def __init__(self, item: T):
        self.item = item

    def get(self) -> T:
        return self.item

b = Box(1)
",
    );
    let b = single(&ev, &ev.module_value(module, "b"));
    let get = single(&ev, &ev.attribute(b, "get"));
    assert_eq!(
        descriptions(&ev, &ev.execute(get, Arguments::Values(Vec::new()))),
        ["instance of int"]
    );
}

#[test]
fn only_the_first_matching_constructor_binds_type_variables() {
    let (ev, module) = evaluator(
        "\
T = TypeVar('T')
U = TypeVar('U')

class Pair:
    def __init__(self, item: T):
        self.item = item

    if 1:
        def __init__(self, item: U):
            pass

    def first(self) -> T:
        return self.item

    def second(self) -> U:
        return self.item

p = Pair(1)
",
    );
    let p = single(&ev, &ev.module_value(module, "p"));
    let first = single(&ev, &ev.attribute(p, "first"));
    assert_eq!(
        descriptions(&ev, &ev.execute(first, Arguments::Values(Vec::new()))),
        ["instance of int"]
    );
    // The conditionally defined constructor is never consulted, so `U`
    // stays unbound.
    let second = single(&ev, &ev.attribute(p, "second"));
    assert!(ev
        .execute(second, Arguments::Values(Vec::new()))
        .is_empty());
}

#[test]
fn iterating_a_non_instance_is_reported() {
    let (ev, module) = evaluator(
        "\
x = None
for item in x:
    y = item
",
    );
    assert!(ev.module_value(module, "y").is_empty());
    assert!(ev
        .take_diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.kind == DiagnosticKind::NotIterable));
}

#[test]
fn docstring_clauses_type_params_and_returns() {
    let ev = Evaluator::new(Settings::default());
    ev.add_module("threading", "class Thread:\n    pass\n")
        .expect("source parses");
    let module = ev
        .add_module(
            "example",
            "\
import threading

def start(t):
    '''
    :type t: :class:`threading.Thread`
    :rtype: threading.Thread
    '''
    return t
",
        )
        .expect("source parses");
    let start = single(&ev, &ev.module_value(module, "start"));
    assert_eq!(
        descriptions(&ev, &ev.execute(start, Arguments::Anonymous)),
        ["instance of Thread"]
    );
}

#[test]
fn unknown_imports_are_reported() {
    let (ev, module) = evaluator("import missing\n");
    assert!(ev.module_value(module, "missing").is_empty());
    assert!(ev
        .take_diagnostics()
        .iter()
        .any(|diagnostic| diagnostic.kind == DiagnosticKind::UnknownModule));
}

#[test]
fn registered_stubs_take_over_execution() {
    let (ev, module) = evaluator(
        "\
def real(x):
    return x

def typed(x) -> int:
    pass
",
    );
    let real = single(&ev, &ev.module_value(module, "real"));
    let typed = single(&ev, &ev.module_value(module, "typed"));
    ev.register_stub(real, typed);
    assert_eq!(
        descriptions(&ev, &ev.execute(real, Arguments::Anonymous)),
        ["instance of int"]
    );
}

#[test]
fn missing_attributes_infer_to_nothing() {
    let (ev, module) = evaluator(
        "\
class Empty:
    pass

e = Empty()
",
    );
    let e = single(&ev, &ev.module_value(module, "e"));
    assert!(ev.attribute(e, "missing").is_empty());
}

#[test]
fn for_targets_take_iterated_element_types() {
    let (ev, module) = evaluator(
        "\
for item in [1]:
    x = item
",
    );
    let x = single(&ev, &ev.module_value(module, "x"));
    assert_eq!(ev.describe(x), "instance of int");
}

#[test]
fn return_annotations_win_over_bodies() {
    let (ev, module) = evaluator(
        "\
def coerce(x) -> str:
    return 1
",
    );
    let coerce = single(&ev, &ev.module_value(module, "coerce"));
    assert_eq!(
        descriptions(&ev, &ev.execute(coerce, Arguments::Anonymous)),
        ["instance of str"]
    );
}
