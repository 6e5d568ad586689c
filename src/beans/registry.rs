use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;
use log::debug;

use crate::beans::class_def::{
    ClassDef, CtorDef, FieldDef, MethodBody, MethodDef, NativeFn, capitalize,
};
use crate::beans::metadata::BeanMetadata;
use crate::core::{Bean, DynSqlError, Result, TypeId, TypeTag, Value};

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<TypeRegistry> = Arc::new(TypeRegistry::new());
}

/// Arena of type descriptors plus the process-wide bean metadata cache.
///
/// Definitions are append-only; metadata entries are built lazily, once per
/// type, and never evicted (key cardinality is the number of registered
/// types). Concurrent first access is safe: racing builders produce
/// idempotent results and the first inserted entry wins, so readers never
/// see a partially built one. A build failure is local to its key and does
/// not poison other entries.
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
    metadata: RwLock<HashMap<TypeId, Arc<BeanMetadata>>>,
}

#[derive(Default)]
struct RegistryInner {
    defs: Vec<Arc<ClassDef>>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// The shared registry used when an engine is not given its own.
    pub fn global() -> &'static Arc<TypeRegistry> {
        &GLOBAL_REGISTRY
    }

    /// Starts declaring a new type. Finish with
    /// [`ClassDefBuilder::register`].
    pub fn define(&self, name: &str) -> ClassDefBuilder<'_> {
        ClassDefBuilder::new(self, name)
    }

    pub fn class(&self, id: TypeId) -> Result<Arc<ClassDef>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .defs
            .get(id.index())
            .cloned()
            .ok_or_else(|| DynSqlError::InvalidArgument(format!("Unknown type id: {}", id)))
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_name
            .get(name)
            .copied()
    }

    /// Whether a value of type `source` can stand where `target` is
    /// declared: same type, or `target` appears in `source`'s superclass
    /// chain or (transitively) implemented interfaces.
    pub fn is_assignable_from(&self, target: TypeId, source: TypeId) -> bool {
        if target == source {
            return true;
        }
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut worklist = vec![source];
        let mut visited = vec![false; inner.defs.len()];
        while let Some(current) = worklist.pop() {
            if current == target {
                return true;
            }
            let Some(def) = inner.defs.get(current.index()) else {
                continue;
            };
            if std::mem::replace(&mut visited[current.index()], true) {
                continue;
            }
            if let Some(superclass) = def.superclass {
                worklist.push(superclass);
            }
            worklist.extend(def.interfaces.iter().copied());
        }
        false
    }

    /// Strict assignability of one argument against one parameter tag.
    /// NULL matches any parameter, mirroring reference semantics.
    pub fn accepts(&self, param: &TypeTag, arg: &Value) -> bool {
        match (param, arg) {
            (_, Value::Null) => true,
            (TypeTag::Object(target), Value::Bean(bean)) => {
                self.is_assignable_from(*target, bean.class())
            }
            (tag, value) => *tag == value.runtime_tag(),
        }
    }

    /// Gets or builds the metadata for a type. Compute-if-absent: the build
    /// runs outside the lock and the first finished entry is kept.
    pub fn metadata(&self, id: TypeId) -> Result<Arc<BeanMetadata>> {
        if let Some(found) = self
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Ok(found.clone());
        }
        let built = Arc::new(BeanMetadata::build(self, id)?);
        debug!("built bean metadata for {}", built.class_name());
        let mut map = self.metadata.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.entry(id).or_insert(built).clone())
    }

    /// Convenience for the ORM boundary: construct an instance through
    /// suitable-constructor resolution.
    pub fn new_instance(&self, id: TypeId, args: Vec<Value>) -> Result<Bean> {
        self.metadata(id)?.new_instance(self, args)
    }

    /// Convenience for the ORM boundary: invoke through suitable-method
    /// resolution.
    pub fn invoke(&self, bean: &Bean, name: &str, args: Vec<Value>) -> Result<Value> {
        self.metadata(bean.class())?.invoke(self, bean, name, args)
    }

    fn insert(&self, def: ClassDef) -> Result<TypeId> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.by_name.contains_key(&def.name) {
            return Err(DynSqlError::InvalidArgument(format!(
                "Type '{}' is already defined",
                def.name
            )));
        }
        let id = TypeId(inner.defs.len());
        let mut def = def;
        def.id = id;
        inner.by_name.insert(def.name.clone(), id);
        inner.defs.push(Arc::new(def));
        Ok(id)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent declaration of one type's shape. Accessor helpers follow the
/// get/is/set naming convention the property scanner recognizes.
pub struct ClassDefBuilder<'a> {
    registry: &'a TypeRegistry,
    def: ClassDef,
}

impl<'a> ClassDefBuilder<'a> {
    fn new(registry: &'a TypeRegistry, name: &str) -> Self {
        Self {
            registry,
            def: ClassDef {
                id: TypeId(usize::MAX),
                name: name.to_string(),
                superclass: None,
                interfaces: Vec::new(),
                is_interface: false,
                constructors: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
            },
        }
    }

    pub fn extends(mut self, superclass: TypeId) -> Self {
        self.def.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: TypeId) -> Self {
        self.def.interfaces.push(interface);
        self
    }

    pub fn interface(mut self) -> Self {
        self.def.is_interface = true;
        self
    }

    /// Public instance field. Becomes a field-only property unless an
    /// accessor pair claims the same name.
    pub fn field(mut self, name: &str, tag: TypeTag) -> Self {
        self.def.fields.push(FieldDef {
            name: name.to_string(),
            tag,
            public: true,
        });
        self
    }

    /// Non-public backing field: joins the field map (and an existing
    /// property as its backing store) but never forms a property alone.
    pub fn hidden_field(mut self, name: &str, tag: TypeTag) -> Self {
        self.def.fields.push(FieldDef {
            name: name.to_string(),
            tag,
            public: false,
        });
        self
    }

    /// Read accessor: `getX()` returning `tag`, reading slot `name`.
    pub fn getter(mut self, name: &str, tag: TypeTag) -> Self {
        self.def.methods.push(MethodDef {
            name: format!("get{}", capitalize(name)),
            params: Vec::new(),
            returns: Some(tag),
            body: MethodBody::GetSlot(name.to_string()),
        });
        self
    }

    /// Boolean read accessor in the `isX()` form.
    pub fn boolean_getter(mut self, name: &str) -> Self {
        self.def.methods.push(MethodDef {
            name: format!("is{}", capitalize(name)),
            params: Vec::new(),
            returns: Some(TypeTag::Boolean),
            body: MethodBody::GetSlot(name.to_string()),
        });
        self
    }

    /// Write accessor: `setX(tag)` storing into slot `name`.
    pub fn setter(mut self, name: &str, tag: TypeTag) -> Self {
        self.def.methods.push(MethodDef {
            name: format!("set{}", capitalize(name)),
            params: vec![tag],
            returns: None,
            body: MethodBody::SetSlot(name.to_string()),
        });
        self
    }

    /// Full read/write property: getter, setter, and a hidden backing
    /// field of the same name.
    pub fn property(self, name: &str, tag: TypeTag) -> Self {
        self.getter(name, tag)
            .setter(name, tag)
            .hidden_field(name, tag)
    }

    /// Boolean property using the `isX` read form.
    pub fn boolean_property(self, name: &str) -> Self {
        self.boolean_getter(name)
            .setter(name, TypeTag::Boolean)
            .hidden_field(name, TypeTag::Boolean)
    }

    pub fn method(
        mut self,
        name: &str,
        params: &[TypeTag],
        returns: Option<TypeTag>,
        body: NativeFn,
    ) -> Self {
        self.def.methods.push(MethodDef {
            name: name.to_string(),
            params: params.to_vec(),
            returns,
            body: MethodBody::Native(body),
        });
        self
    }

    /// Constructor assigning each argument to the named slot, in order.
    pub fn constructor(mut self, assigns: &[(&str, TypeTag)]) -> Self {
        self.def.constructors.push(CtorDef {
            params: assigns.iter().map(|(_, tag)| *tag).collect(),
            assigns: assigns.iter().map(|(name, _)| name.to_string()).collect(),
        });
        self
    }

    pub fn no_arg_constructor(mut self) -> Self {
        self.def.constructors.push(CtorDef {
            params: Vec::new(),
            assigns: Vec::new(),
        });
        self
    }

    pub fn register(self) -> Result<TypeId> {
        if self.def.name.trim().is_empty() {
            return Err(DynSqlError::InvalidArgument(
                "Type name must not be empty".to_string(),
            ));
        }
        self.registry.insert(self.def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_lookup() {
        let registry = TypeRegistry::new();
        let id = registry
            .define("Member")
            .property("memberName", TypeTag::Text)
            .no_arg_constructor()
            .register()
            .unwrap();

        assert_eq!(registry.lookup("Member"), Some(id));
        assert_eq!(registry.class(id).unwrap().name(), "Member");
        assert!(registry.lookup("Nothing").is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let registry = TypeRegistry::new();
        registry.define("Member").register().unwrap();
        let err = registry.define("Member").register().unwrap_err();
        assert!(matches!(err, DynSqlError::InvalidArgument(_)));
    }

    #[test]
    fn assignability_walks_hierarchy() {
        let registry = TypeRegistry::new();
        let readable = registry.define("Readable").interface().register().unwrap();
        let base = registry.define("Base").register().unwrap();
        let derived = registry
            .define("Derived")
            .extends(base)
            .implements(readable)
            .register()
            .unwrap();

        assert!(registry.is_assignable_from(base, derived));
        assert!(registry.is_assignable_from(readable, derived));
        assert!(registry.is_assignable_from(derived, derived));
        assert!(!registry.is_assignable_from(derived, base));
    }

    #[test]
    fn accepts_null_everywhere() {
        let registry = TypeRegistry::new();
        assert!(registry.accepts(&TypeTag::Integer, &Value::Null));
        assert!(registry.accepts(&TypeTag::Integer, &Value::Integer(1)));
        assert!(!registry.accepts(&TypeTag::Integer, &Value::Long(1)));
        assert!(!registry.accepts(&TypeTag::Text, &Value::Integer(1)));
    }
}
