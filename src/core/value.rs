use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::{TypeId, TypeTag};

/// Dynamic runtime value flowing through the template engine and the bean
/// layer. Numeric widths are kept distinct so overload resolution can tell
/// an INTEGER parameter from a LONG one.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    List(Vec<Value>),
    Bean(Bean),
}

/// Shared handle to one bean instance: a typed record of named slots.
/// Cloning shares the instance, matching reference semantics of the value
/// objects the metadata layer reads and writes.
#[derive(Debug, Clone)]
pub struct Bean {
    inner: Arc<RwLock<BeanInner>>,
}

#[derive(Debug)]
struct BeanInner {
    class: TypeId,
    slots: HashMap<String, Value>,
}

impl Bean {
    pub fn new(class: TypeId) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BeanInner {
                class,
                slots: HashMap::new(),
            })),
        }
    }

    pub fn class(&self) -> TypeId {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .class
    }

    pub fn get_slot(&self, name: &str) -> Option<Value> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .get(name)
            .cloned()
    }

    pub fn set_slot(&self, name: &str, value: Value) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .insert(name.to_string(), value);
    }

    /// Identity comparison: two handles are equal when they refer to the
    /// same instance.
    pub fn same_instance(&self, other: &Bean) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Short(_) => "SHORT",
            Self::Integer(_) => "INTEGER",
            Self::Long(_) => "LONG",
            Self::Float(_) => "FLOAT",
            Self::Double(_) => "DOUBLE",
            Self::Text(_) => "TEXT",
            Self::List(_) => "LIST",
            Self::Bean(_) => "BEAN",
        }
    }

    /// Tag describing this value's own runtime shape. `Null` carries no
    /// shape of its own and defaults to TEXT; callers who care about the
    /// type of a null pass a declared tag alongside the value.
    pub fn runtime_tag(&self) -> TypeTag {
        match self {
            Self::Null => TypeTag::Text,
            Self::Boolean(_) => TypeTag::Boolean,
            Self::Short(_) => TypeTag::Short,
            Self::Integer(_) => TypeTag::Integer,
            Self::Long(_) => TypeTag::Long,
            Self::Float(_) => TypeTag::Float,
            Self::Double(_) => TypeTag::Double,
            Self::Text(_) => TypeTag::Text,
            Self::List(_) => TypeTag::List,
            Self::Bean(b) => TypeTag::Object(b.class()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Short(_) | Self::Integer(_) | Self::Long(_) | Self::Float(_) | Self::Double(_)
        )
    }

    /// Truthiness for IF conditions: NULL and zero are false, everything
    /// else goes by its natural emptiness.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Short(v) => *v != 0,
            Self::Integer(v) => *v != 0,
            Self::Long(v) => *v != 0,
            Self::Float(v) => *v != 0.0 && !v.is_nan(),
            Self::Double(v) => *v != 0.0 && !v.is_nan(),
            Self::Text(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Bean(_) => true,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Short(v) => Some(*v as i64),
            Self::Integer(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Short(v) => Some(*v as f64),
            Self::Integer(v) => Some(*v as f64),
            Self::Long(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    // Numeric conversions backing the coercion pass of overload resolution.
    // Each accepts any numeric variant plus numeric text; anything else is
    // not convertible.

    pub fn to_short(&self) -> Option<i16> {
        match self {
            Self::Short(v) => Some(*v),
            Self::Integer(v) => i16::try_from(*v).ok(),
            Self::Long(v) => i16::try_from(*v).ok(),
            Self::Float(v) => Some(*v as i16),
            Self::Double(v) => Some(*v as i16),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_integer(&self) -> Option<i32> {
        match self {
            Self::Short(v) => Some(*v as i32),
            Self::Integer(v) => Some(*v),
            Self::Long(v) => i32::try_from(*v).ok(),
            Self::Float(v) => Some(*v as i32),
            Self::Double(v) => Some(*v as i32),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_long(&self) -> Option<i64> {
        match self {
            Self::Short(v) => Some(*v as i64),
            Self::Integer(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            Self::Double(v) => Some(*v as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_float(&self) -> Option<f32> {
        match self {
            Self::Short(v) => Some(*v as f32),
            Self::Integer(v) => Some(*v as f32),
            Self::Long(v) => Some(*v as f32),
            Self::Float(v) => Some(*v),
            Self::Double(v) => Some(*v as f32),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_double(&self) -> Option<f64> {
        match self {
            Self::Short(v) => Some(*v as f64),
            Self::Integer(v) => Some(*v as f64),
            Self::Long(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Converts `slot` in place toward a numeric parameter tag, the fallback
/// pass of overload resolution. Returns false when the tag is not numeric
/// or the value cannot be converted, leaving the slot untouched.
pub fn adjust_number(tag: &TypeTag, slot: &mut Value) -> bool {
    let converted = match tag {
        TypeTag::Short => slot.to_short().map(Value::Short),
        TypeTag::Integer => slot.to_integer().map(Value::Integer),
        TypeTag::Long => slot.to_long().map(Value::Long),
        TypeTag::Float => slot.to_float().map(Value::Float),
        TypeTag::Double => slot.to_double().map(Value::Double),
        _ => return false,
    };
    match converted {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Bean(a), Self::Bean(b)) => a.same_instance(b),
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => {
                        (x.is_nan() && y.is_nan()) || (x - y).abs() < f64::EPSILON
                    }
                    _ => false,
                },
            },
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (Self::Text(a), Self::Text(b)) => a.partial_cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.partial_cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
            },
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Short(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Self::Bean(b) => write!(f, "bean:{}", b.class()),
        }
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}
