use crate::core::{Bean, Result, TypeId, TypeTag, Value};

/// Native method implementation hook. Receives the target bean and the
/// (already resolved and coerced) argument values.
pub type NativeFn = fn(&Bean, &[Value]) -> Result<Value>;

/// What a declared method does when invoked.
#[derive(Debug, Clone)]
pub enum MethodBody {
    /// Reads a slot and returns its value (missing slot reads as NULL).
    GetSlot(String),
    /// Writes the single argument into a slot.
    SetSlot(String),
    Native(NativeFn),
}

/// One declared method overload: name, ordered parameter tags, return tag
/// (`None` meaning unit/void), and its body.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<TypeTag>,
    pub returns: Option<TypeTag>,
    pub body: MethodBody,
}

/// One declared constructor overload. `assigns` lists the slot each
/// argument is stored into, in parameter order.
#[derive(Debug, Clone)]
pub struct CtorDef {
    pub params: Vec<TypeTag>,
    pub assigns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub tag: TypeTag,
    pub public: bool,
}

/// Declared shape of one registered type: the descriptor the metadata
/// layer "reflects" over instead of a host reflection API.
#[derive(Debug)]
pub struct ClassDef {
    pub(crate) id: TypeId,
    pub(crate) name: String,
    pub(crate) superclass: Option<TypeId>,
    pub(crate) interfaces: Vec<TypeId>,
    pub(crate) is_interface: bool,
    pub(crate) constructors: Vec<CtorDef>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) fields: Vec<FieldDef>,
}

impl ClassDef {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<TypeId> {
        self.superclass
    }

    pub fn interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }
}

/// Runs a method body against a bean. Arity and coercion have already been
/// settled by overload resolution.
pub fn invoke_method(method: &MethodDef, bean: &Bean, args: &[Value]) -> Result<Value> {
    match &method.body {
        MethodBody::GetSlot(slot) => Ok(bean.get_slot(slot).unwrap_or(Value::Null)),
        MethodBody::SetSlot(slot) => {
            bean.set_slot(slot, args.first().cloned().unwrap_or(Value::Null));
            Ok(Value::Null)
        }
        MethodBody::Native(body) => body(bean, args),
    }
}

pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// JavaBeans-style decapitalization: `MemberName` becomes `memberName`,
/// but a leading acronym (`URL`) is left alone.
pub(crate) fn decapitalize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() > 1 && chars[0].is_uppercase() && chars[1].is_uppercase() {
        return name.to_string();
    }
    match chars.first() {
        Some(first) => first.to_lowercase().collect::<String>() + &name[first.len_utf8()..],
        None => String::new(),
    }
}
