use std::collections::{HashMap, HashSet};

use crate::beans::class_def::{CtorDef, FieldDef, MethodDef, decapitalize, invoke_method};
use crate::beans::property::PropertyAccessor;
use crate::beans::registry::TypeRegistry;
use crate::core::{Bean, DynSqlError, Result, TypeId, TypeTag, Value, adjust_number};

/// Reflected view of one registered type: constructors in declared order, a
/// case-insensitive property map, method overloads grouped by name, and the
/// merged field map. Built once per type by the registry's metadata cache
/// and immutable afterwards.
#[derive(Debug)]
pub struct BeanMetadata {
    type_id: TypeId,
    class_name: String,
    constructors: Vec<CtorDef>,
    properties: HashMap<String, PropertyAccessor>,
    methods: HashMap<String, Vec<MethodDef>>,
    fields: HashMap<String, FieldDef>,
}

impl BeanMetadata {
    pub(crate) fn build(registry: &TypeRegistry, id: TypeId) -> Result<Self> {
        let def = registry.class(id)?;
        let mut metadata = Self {
            type_id: id,
            class_name: def.name().to_string(),
            constructors: def.constructors.clone(),
            properties: HashMap::new(),
            methods: HashMap::new(),
            fields: HashMap::new(),
        };
        let all_methods = gather_methods(registry, id)?;
        metadata.setup_properties(&all_methods);
        metadata.setup_methods(all_methods);
        metadata.setup_fields(registry, id)?;
        Ok(metadata)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn constructors(&self) -> &[CtorDef] {
        &self.constructors
    }

    /// Exact-signature lookup.
    pub fn get_constructor(&self, param_tags: &[TypeTag]) -> Result<&CtorDef> {
        self.constructors
            .iter()
            .find(|ctor| ctor.params == param_tags)
            .ok_or_else(|| {
                DynSqlError::ConstructorNotFound(format!(
                    "{}({})",
                    self.class_name,
                    describe_tags(param_tags)
                ))
            })
    }

    /// Two-pass resolution over declared order: strict assignability first,
    /// then a retry allowing numeric coercion, which converts the matched
    /// arguments in place.
    pub fn get_suitable_constructor(
        &self,
        registry: &TypeRegistry,
        args: &mut [Value],
    ) -> Result<&CtorDef> {
        if let Some(idx) = self
            .constructors
            .iter()
            .position(|ctor| match_strict(registry, &ctor.params, args))
        {
            return Ok(&self.constructors[idx]);
        }
        if let Some(idx) = self
            .constructors
            .iter()
            .position(|ctor| match_adjusting(registry, &ctor.params, args))
        {
            return Ok(&self.constructors[idx]);
        }
        Err(DynSqlError::ConstructorNotFound(format!(
            "{}({})",
            self.class_name,
            describe_args(args)
        )))
    }

    /// Constructs an instance, filling the constructor's assigned slots
    /// from the (possibly coerced) arguments.
    pub fn new_instance(&self, registry: &TypeRegistry, mut args: Vec<Value>) -> Result<Bean> {
        let ctor = self.get_suitable_constructor(registry, &mut args)?;
        let bean = Bean::new(self.type_id);
        for (slot, value) in ctor.assigns.iter().zip(args) {
            bean.set_slot(slot, value);
        }
        Ok(bean)
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(&name.to_lowercase())
    }

    /// Case-insensitive property lookup.
    pub fn get_property(&self, name: &str) -> Result<&PropertyAccessor> {
        self.properties.get(&name.to_lowercase()).ok_or_else(|| {
            DynSqlError::PropertyNotFound(format!("{}#{}", self.class_name, name))
        })
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.values().map(|p| p.name()).collect()
    }

    // ------------------------------------------------------------------
    // Methods
    // ------------------------------------------------------------------

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn get_methods(&self, name: &str) -> Result<&[MethodDef]> {
        self.methods
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DynSqlError::MethodNotFound(format!("{}#{}", self.class_name, name)))
    }

    /// Exact-signature lookup within one overload set.
    pub fn get_method(&self, name: &str, param_tags: &[TypeTag]) -> Result<&MethodDef> {
        self.get_methods(name)?
            .iter()
            .find(|m| m.params == param_tags)
            .ok_or_else(|| {
                DynSqlError::MethodNotFound(format!(
                    "{}#{}({})",
                    self.class_name,
                    name,
                    describe_tags(param_tags)
                ))
            })
    }

    /// Same two-pass matching as constructors, scoped to one overload set.
    pub fn get_suitable_method(
        &self,
        registry: &TypeRegistry,
        name: &str,
        args: &mut [Value],
    ) -> Result<&MethodDef> {
        let overloads = self.get_methods(name)?;
        if let Some(idx) = overloads
            .iter()
            .position(|m| match_strict(registry, &m.params, args))
        {
            return Ok(&overloads[idx]);
        }
        if let Some(idx) = overloads
            .iter()
            .position(|m| match_adjusting(registry, &m.params, args))
        {
            return Ok(&overloads[idx]);
        }
        Err(DynSqlError::MethodNotFound(format!(
            "{}#{}({})",
            self.class_name,
            name,
            describe_args(args)
        )))
    }

    pub fn invoke(
        &self,
        registry: &TypeRegistry,
        bean: &Bean,
        name: &str,
        mut args: Vec<Value>,
    ) -> Result<Value> {
        let method = self.get_suitable_method(registry, name, &mut args)?;
        invoke_method(method, bean, &args)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get_field(&self, name: &str) -> Result<&FieldDef> {
        self.fields
            .get(name)
            .ok_or_else(|| DynSqlError::FieldNotFound(format!("{}#{}", self.class_name, name)))
    }

    pub fn get_field_value(&self, bean: &Bean, name: &str) -> Result<Value> {
        let field = self.get_field(name)?;
        Ok(bean.get_slot(&field.name).unwrap_or(Value::Null))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    // ------------------------------------------------------------------
    // Build steps
    // ------------------------------------------------------------------

    /// Scans accessor-shaped methods into properties. An accessor whose
    /// type disagrees with the property's already-registered type marks the
    /// whole property invalid; invalid properties are dropped after the
    /// scan rather than silently merged.
    fn setup_properties(&mut self, methods: &[MethodDef]) {
        use std::collections::hash_map::Entry;

        let mut invalid: HashSet<String> = HashSet::new();
        for method in methods {
            if let Some((name, tag)) = read_accessor_shape(method) {
                let key = name.to_lowercase();
                match self.properties.entry(key.clone()) {
                    Entry::Occupied(mut existing) => {
                        if existing.get().tag() != tag {
                            invalid.insert(key);
                        } else {
                            existing.get_mut().set_read_method(method.clone());
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(PropertyAccessor::new(
                            &name,
                            tag,
                            Some(method.clone()),
                            None,
                            None,
                        ));
                    }
                }
            } else if let Some((name, tag)) = write_accessor_shape(method) {
                let key = name.to_lowercase();
                match self.properties.entry(key.clone()) {
                    Entry::Occupied(mut existing) => {
                        if existing.get().tag() != tag {
                            invalid.insert(key);
                        } else {
                            existing.get_mut().set_write_method(method.clone());
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(PropertyAccessor::new(
                            &name,
                            tag,
                            None,
                            Some(method.clone()),
                            None,
                        ));
                    }
                }
            }
        }
        for key in invalid {
            self.properties.remove(&key);
        }
    }

    fn setup_methods(&mut self, methods: Vec<MethodDef>) {
        for method in methods {
            self.methods
                .entry(method.name.clone())
                .or_default()
                .push(method);
        }
    }

    /// Worklist traversal over the descriptor arena: own fields first, then
    /// each interface chain recursively, then the superclass chain, each
    /// type visited at most once, first occurrence of a field name winning.
    fn setup_fields(&mut self, registry: &TypeRegistry, id: TypeId) -> Result<()> {
        let mut visited = HashSet::new();
        self.visit_fields(registry, id, &mut visited)
    }

    fn visit_fields(
        &mut self,
        registry: &TypeRegistry,
        id: TypeId,
        visited: &mut HashSet<TypeId>,
    ) -> Result<()> {
        if !visited.insert(id) {
            return Ok(());
        }
        let def = registry.class(id)?;
        self.add_fields(def.as_ref());
        for &interface in def.interfaces() {
            self.visit_fields(registry, interface, visited)?;
        }
        if let Some(superclass) = def.superclass() {
            self.visit_fields(registry, superclass, visited)?;
        }
        Ok(())
    }

    fn add_fields(&mut self, def: &crate::beans::class_def::ClassDef) {
        use std::collections::hash_map::Entry;

        for field in &def.fields {
            if self.fields.contains_key(&field.name) {
                continue;
            }
            self.fields.insert(field.name.clone(), field.clone());
            match self.properties.entry(field.name.to_lowercase()) {
                Entry::Occupied(mut property) => {
                    property.get_mut().set_field(field.clone());
                }
                Entry::Vacant(slot) => {
                    if field.public {
                        slot.insert(PropertyAccessor::new(
                            &field.name,
                            field.tag,
                            None,
                            None,
                            Some(field.clone()),
                        ));
                    }
                }
            }
        }
    }
}

/// `getX()` with a return value, or `isX()` returning BOOLEAN.
fn read_accessor_shape(method: &MethodDef) -> Option<(String, TypeTag)> {
    if !method.params.is_empty() {
        return None;
    }
    if let Some(rest) = method.name.strip_prefix("get") {
        if !rest.is_empty() {
            if let Some(tag) = method.returns {
                return Some((decapitalize(rest), tag));
            }
        }
    }
    if let Some(rest) = method.name.strip_prefix("is") {
        if !rest.is_empty() && method.returns == Some(TypeTag::Boolean) {
            return Some((decapitalize(rest), TypeTag::Boolean));
        }
    }
    None
}

/// `setX(tag)` returning unit.
fn write_accessor_shape(method: &MethodDef) -> Option<(String, TypeTag)> {
    let rest = method.name.strip_prefix("set")?;
    if rest.is_empty() || method.params.len() != 1 || method.returns.is_some() {
        return None;
    }
    Some((decapitalize(rest), method.params[0]))
}

/// All methods visible on a type: own declarations first, then the
/// superclass chain, then interface chains, overridden signatures kept
/// from the most derived declarer.
fn gather_methods(registry: &TypeRegistry, id: TypeId) -> Result<Vec<MethodDef>> {
    let mut collected = Vec::new();
    let mut seen: HashSet<(String, Vec<TypeTag>)> = HashSet::new();
    let mut visited = HashSet::new();
    let mut worklist = vec![id];
    while let Some(current) = worklist.pop() {
        if !visited.insert(current) {
            continue;
        }
        let def = registry.class(current)?;
        for method in &def.methods {
            if seen.insert((method.name.clone(), method.params.clone())) {
                collected.push(method.clone());
            }
        }
        // Superclass before interfaces so class declarations shadow
        // interface ones.
        for &interface in def.interfaces().iter().rev() {
            worklist.push(interface);
        }
        if let Some(superclass) = def.superclass() {
            worklist.push(superclass);
        }
    }
    Ok(collected)
}

fn match_strict(registry: &TypeRegistry, params: &[TypeTag], args: &[Value]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(param, arg)| arg.is_null() || registry.accepts(param, arg))
}

/// Adjusting pass: candidates are tried against a scratch copy of the
/// arguments so a half-matching overload leaves the originals untouched;
/// the copy is committed only when every parameter matched.
fn match_adjusting(registry: &TypeRegistry, params: &[TypeTag], args: &mut [Value]) -> bool {
    if params.len() != args.len() {
        return false;
    }
    let mut adjusted = args.to_vec();
    for (param, slot) in params.iter().zip(adjusted.iter_mut()) {
        if slot.is_null() || registry.accepts(param, slot) || adjust_number(param, slot) {
            continue;
        }
        return false;
    }
    for (slot, value) in args.iter_mut().zip(adjusted) {
        *slot = value;
    }
    true
}

fn describe_tags(tags: &[TypeTag]) -> String {
    tags.iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_args(args: &[Value]) -> String {
    args.iter()
        .map(|a| a.type_name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
