//! The evaluator owns every arena and cache and exposes the query API.
//!
//! All state lives behind `RefCell`s so queries can take `&self`; the engine
//! is single-threaded. Accessors clone data out of the cells before any
//! recursive work so no borrow is held across inference.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use scry_python_syntax::{ParseError, Tree};

use crate::arguments::Arguments;
use crate::builtins::{self, BuiltinClassId};
use crate::context::{
    BoundMethodData, ClassData, CompiledValue, Context, ContextId, ContextKind, ContextSet,
    Contexts, ExecutionData, FunctionData, InstanceData, InstanceKind, ModuleData, Name, SourceId,
    TreeNode, TypeVarMap,
};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::filters::{Filter, FilterOptions, NameBinding};
use crate::class;
use crate::function;
use crate::instance;

/// Two-state memo entry: calls that re-enter while a result is still being
/// computed get a neutral answer instead of diverging.
#[derive(Clone)]
pub(crate) enum CacheState<T> {
    InProgress,
    Done(T),
}

pub struct Evaluator {
    settings: crate::Settings,
    sources: RefCell<Vec<Rc<Tree>>>,
    contexts: RefCell<Contexts>,
    modules: RefCell<FxHashMap<Name, ContextId>>,
    class_cache: RefCell<FxHashMap<(TreeNode, ContextId), ContextId>>,
    function_cache: RefCell<FxHashMap<(TreeNode, ContextId), ContextId>>,
    compiled_class_cache: RefCell<FxHashMap<BuiltinClassId, ContextId>>,
    none_cache: Cell<Option<ContextId>>,
    stubs: RefCell<FxHashMap<ContextId, ContextId>>,
    pub(crate) instance_context_cache:
        RefCell<FxHashMap<(ContextId, TreeNode), CacheState<ContextId>>>,
    pub(crate) annotated_class_cache: RefCell<FxHashMap<ContextId, CacheState<Option<ContextId>>>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
    depth: Cell<u32>,
}

impl Evaluator {
    pub fn new(settings: crate::Settings) -> Self {
        Self {
            settings,
            sources: RefCell::new(Vec::new()),
            contexts: RefCell::new(Contexts::default()),
            modules: RefCell::new(FxHashMap::default()),
            class_cache: RefCell::new(FxHashMap::default()),
            function_cache: RefCell::new(FxHashMap::default()),
            compiled_class_cache: RefCell::new(FxHashMap::default()),
            none_cache: Cell::new(None),
            stubs: RefCell::new(FxHashMap::default()),
            instance_context_cache: RefCell::new(FxHashMap::default()),
            annotated_class_cache: RefCell::new(FxHashMap::default()),
            diagnostics: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        }
    }

    pub fn settings(&self) -> &crate::Settings {
        &self.settings
    }

    /// Parses `source` and registers it as module `name`.
    pub fn add_module(&self, name: &str, source: &str) -> Result<ContextId, ParseError> {
        let tree = scry_python_syntax::parse_module(source)?;
        let source_id = self.add_source(tree);
        let module = self.alloc(Context {
            kind: ContextKind::Module(ModuleData {
                source: source_id,
                name: Name::from(name),
            }),
            parent: None,
        });
        self.modules.borrow_mut().insert(Name::from(name), module);
        tracing::debug!(module = name, "registered module");
        Ok(module)
    }

    pub fn module(&self, name: &str) -> Option<ContextId> {
        self.modules.borrow().get(name).copied()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    /// An instance of `class` constructed without any call site.
    pub fn anonymous_instance(&self, class: ContextId) -> ContextId {
        self.alloc(Context {
            kind: ContextKind::Instance(InstanceData {
                class,
                arguments: Rc::new(Arguments::Anonymous),
                kind: InstanceKind::Anonymous,
            }),
            parent: None,
        })
    }

    /// Resolves and infers `name` on `context` in one step.
    pub fn attribute(&self, context: ContextId, name: &str) -> ContextSet {
        let bindings = self.attribute_bindings(context, name, FilterOptions::default());
        ContextSet::union(bindings.iter().map(|binding| binding.infer(self)))
    }

    /// Walks the filter chain of `context` and returns the bindings of the
    /// first filter that knows `name`.
    pub fn attribute_bindings(
        &self,
        context: ContextId,
        name: &str,
        options: FilterOptions,
    ) -> Vec<NameBinding> {
        for filter in self.filters(context, options) {
            let bindings = filter.get(self, name);
            if !bindings.is_empty() {
                return bindings;
            }
        }
        // Module attribute access can resolve to a registered submodule.
        if let ContextKind::Module(data) = self.kind(context) {
            let dotted = format!("{}.{name}", data.name);
            if let Some(submodule) = self.module(&dotted) {
                return vec![NameBinding::Module(submodule)];
            }
        }
        Vec::new()
    }

    /// Infers a top-level name of a module.
    pub fn module_value(&self, module: ContextId, name: &str) -> ContextSet {
        self.attribute(module, name)
    }

    /// Executes a callable with the given arguments.
    pub fn execute(&self, callee: ContextId, arguments: Arguments) -> ContextSet {
        self.guard(|| self.execute_inner(callee, arguments))
    }

    fn execute_inner(&self, callee: ContextId, arguments: Arguments) -> ContextSet {
        match self.kind(callee) {
            ContextKind::Class(_) => {
                let instance = self.alloc(Context {
                    kind: ContextKind::Instance(InstanceData {
                        class: callee,
                        arguments: Rc::new(arguments),
                        kind: InstanceKind::Tree,
                    }),
                    parent: None,
                });
                ContextSet::single(instance)
            }
            ContextKind::CompiledClass(id) => {
                if id == builtins::NONE_TYPE {
                    return ContextSet::single(self.none_object());
                }
                ContextSet::single(self.compiled_instance(id, arguments, InstanceKind::Compiled))
            }
            ContextKind::Function(_) => {
                let callee = self.preferred_callable(callee);
                function::execute_function(self, callee, arguments)
            }
            ContextKind::BoundMethod(data) => {
                let function = self.preferred_callable(data.function);
                let arguments = Arguments::Instance {
                    instance: data.instance,
                    inner: Box::new(arguments),
                };
                function::execute_function(self, function, arguments)
            }
            ContextKind::Instance(_) => instance::py_call(self, callee, arguments),
            ContextKind::CompiledValue(CompiledValue::Function { class, method }) => {
                builtins::execute_method(self, None, class, method, &arguments)
            }
            ContextKind::CompiledValue(CompiledValue::BoundMethod {
                instance,
                class,
                method,
            }) => builtins::execute_method(self, Some(instance), class, method, &arguments),
            other => {
                self.add_diagnostic(Diagnostic::new(
                    DiagnosticKind::NotCallable,
                    format!("{} is not callable", self.describe(callee)),
                ));
                tracing::debug!(kind = ?other, "attempted to call a non-callable");
                ContextSet::empty()
            }
        }
    }

    /// Iterates a value, yielding the union of its element types.
    pub fn iterate(&self, context: ContextId) -> ContextSet {
        self.guard(|| instance::py_iter(self, ContextSet::single(context)))
    }

    pub fn infer(&self, binding: &NameBinding) -> ContextSet {
        self.guard(|| binding.infer(self))
    }

    /// The filter chain of a context, in lookup order.
    pub fn filters(&self, context: ContextId, options: FilterOptions) -> Vec<Filter> {
        match self.kind(context) {
            ContextKind::Module(data) => {
                let tree = self.tree(data.source);
                vec![Filter::Scope {
                    context,
                    scope: TreeNode {
                        source: data.source,
                        node: tree.root(),
                    },
                }]
            }
            ContextKind::Class(_) => class::class_filters(self, context),
            ContextKind::Function(data) => vec![Filter::Scope {
                context,
                scope: data.node,
            }],
            ContextKind::BoundMethod(data) => self.filters(data.function, options),
            ContextKind::Execution(data) => function::function_node(self, data.function)
                .map(|node| {
                    vec![Filter::Scope {
                        context,
                        scope: node,
                    }]
                })
                .unwrap_or_default(),
            ContextKind::Instance(_) => {
                instance::instance_filters(self, context, options.include_self_names)
            }
            ContextKind::CompiledClass(id) => class::compiled_mro(id)
                .into_iter()
                .map(|class| Filter::CompiledClass { class })
                .collect(),
            ContextKind::CompiledValue(_) => Vec::new(),
        }
    }

    /// Declared parameter names of a callable, hiding bound receivers.
    pub fn parameter_names(&self, callable: ContextId) -> Vec<Name> {
        match self.kind(callable) {
            ContextKind::Function(data) => {
                let tree = self.tree(data.node.source);
                tree.params(data.node.node)
                    .iter()
                    .filter_map(|&param| tree.children(param).first())
                    .map(|&target| Name::from(tree.value(target)))
                    .collect()
            }
            ContextKind::BoundMethod(data) => {
                let mut names = self.parameter_names(data.function);
                if !names.is_empty() {
                    names.remove(0);
                }
                names
            }
            ContextKind::CompiledValue(CompiledValue::Function { class, method }) => {
                builtins::method(class, method)
                    .params
                    .iter()
                    .map(|&name| Name::from(name))
                    .collect()
            }
            ContextKind::CompiledValue(CompiledValue::BoundMethod { class, method, .. }) => {
                let params = builtins::method(class, method).params;
                params.iter().skip(1).map(|&name| Name::from(name)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Prefers a registered stub over `function` when executing.
    pub fn register_stub(&self, function: ContextId, stub: ContextId) {
        self.stubs.borrow_mut().insert(function, stub);
    }

    fn preferred_callable(&self, function: ContextId) -> ContextId {
        self.stubs.borrow().get(&function).copied().unwrap_or(function)
    }

    /// A short human-readable description, for diagnostics and tests.
    pub fn describe(&self, context: ContextId) -> String {
        match self.kind(context) {
            ContextKind::Module(data) => format!("module {}", data.name),
            ContextKind::Class(data) => {
                let tree = self.tree(data.node.source);
                format!("class {}", tree.value(tree.definition_name(data.node.node)))
            }
            ContextKind::Function(data) => {
                let tree = self.tree(data.node.source);
                format!(
                    "function {}",
                    tree.value(tree.definition_name(data.node.node))
                )
            }
            ContextKind::BoundMethod(data) => {
                let inner = self.describe(data.function);
                format!("bound method {}", inner.trim_start_matches("function "))
            }
            ContextKind::Execution(data) => {
                let inner = self.describe(data.function);
                format!("execution of {inner}")
            }
            ContextKind::Instance(data) => {
                let class = self.describe(data.class);
                format!(
                    "instance of {}",
                    class
                        .trim_start_matches("class ")
                        .trim_start_matches("compiled class ")
                )
            }
            ContextKind::CompiledClass(id) => {
                format!("compiled class {}", builtins::class(id).name)
            }
            ContextKind::CompiledValue(CompiledValue::None) => "None".to_string(),
            ContextKind::CompiledValue(CompiledValue::Function { class, method }) => {
                format!(
                    "builtin function {}.{}",
                    builtins::class(class).name,
                    builtins::method(class, method).name
                )
            }
            ContextKind::CompiledValue(CompiledValue::BoundMethod { class, method, .. }) => {
                format!(
                    "builtin method {}.{}",
                    builtins::class(class).name,
                    builtins::method(class, method).name
                )
            }
        }
    }

    // ---- crate-internal plumbing ----

    pub(crate) fn add_source(&self, tree: Tree) -> SourceId {
        let mut sources = self.sources.borrow_mut();
        let id = SourceId::new(sources.len());
        sources.push(Rc::new(tree));
        id
    }

    pub(crate) fn tree(&self, source: SourceId) -> Rc<Tree> {
        Rc::clone(&self.sources.borrow()[source.index()])
    }

    pub(crate) fn context(&self, id: ContextId) -> Context {
        self.contexts.borrow().get(id).clone()
    }

    pub(crate) fn kind(&self, id: ContextId) -> ContextKind {
        self.context(id).kind
    }

    pub(crate) fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.context(id).parent
    }

    pub(crate) fn alloc(&self, context: Context) -> ContextId {
        self.contexts.borrow_mut().alloc(context)
    }

    /// The canonical class context for a class definition node.
    pub(crate) fn class_context(&self, parent: ContextId, node: TreeNode) -> ContextId {
        if let Some(&id) = self.class_cache.borrow().get(&(node, parent)) {
            return id;
        }
        let id = self.alloc(Context {
            kind: ContextKind::Class(ClassData {
                node,
                generics: None,
            }),
            parent: Some(parent),
        });
        self.class_cache.borrow_mut().insert((node, parent), id);
        id
    }

    /// A fresh class context carrying inferred type variable bindings.
    pub(crate) fn specialized_class(&self, class: ContextId, map: TypeVarMap) -> ContextId {
        let context = self.context(class);
        match context.kind {
            ContextKind::Class(data) => self.alloc(Context {
                kind: ContextKind::Class(ClassData {
                    node: data.node,
                    generics: Some(Rc::new(map)),
                }),
                parent: context.parent,
            }),
            _ => class,
        }
    }

    pub(crate) fn function_context(&self, parent: ContextId, node: TreeNode) -> ContextId {
        if let Some(&id) = self.function_cache.borrow().get(&(node, parent)) {
            return id;
        }
        let id = self.alloc(Context {
            kind: ContextKind::Function(FunctionData { node }),
            parent: Some(parent),
        });
        self.function_cache.borrow_mut().insert((node, parent), id);
        id
    }

    pub(crate) fn compiled_class(&self, id: BuiltinClassId) -> ContextId {
        if let Some(&context) = self.compiled_class_cache.borrow().get(&id) {
            return context;
        }
        let context = self.alloc(Context {
            kind: ContextKind::CompiledClass(id),
            parent: None,
        });
        self.compiled_class_cache.borrow_mut().insert(id, context);
        context
    }

    pub(crate) fn compiled_instance(
        &self,
        class: BuiltinClassId,
        arguments: Arguments,
        kind: InstanceKind,
    ) -> ContextId {
        self.alloc(Context {
            kind: ContextKind::Instance(InstanceData {
                class: self.compiled_class(class),
                arguments: Rc::new(arguments),
                kind,
            }),
            parent: None,
        })
    }

    pub(crate) fn none_object(&self) -> ContextId {
        if let Some(id) = self.none_cache.get() {
            return id;
        }
        let id = self.alloc(Context {
            kind: ContextKind::CompiledValue(CompiledValue::None),
            parent: None,
        });
        self.none_cache.set(Some(id));
        id
    }

    pub(crate) fn bound_method(&self, instance: ContextId, function: ContextId) -> ContextId {
        self.alloc(Context {
            kind: ContextKind::BoundMethod(BoundMethodData { instance, function }),
            parent: self.parent(function),
        })
    }

    pub(crate) fn execution(&self, function: ContextId, arguments: Arguments) -> ContextId {
        self.alloc(Context {
            kind: ContextKind::Execution(ExecutionData {
                function,
                arguments: Rc::new(arguments),
            }),
            parent: Some(function),
        })
    }

    /// Runs `f` unless the recursion ceiling is hit, in which case the
    /// type-neutral default is returned.
    pub(crate) fn guard<T: Default>(&self, f: impl FnOnce() -> T) -> T {
        let depth = self.depth.get();
        if depth >= self.settings.recursion_limit {
            tracing::debug!(depth, "recursion ceiling reached");
            return T::default();
        }
        self.depth.set(depth + 1);
        let result = f();
        self.depth.set(depth);
        result
    }

    pub(crate) fn add_diagnostic(&self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "diagnostic");
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}
