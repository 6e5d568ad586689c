use crate::beans::class_def::{FieldDef, MethodDef, invoke_method};
use crate::core::{Bean, DynSqlError, Result, TypeTag, Value, adjust_number};

/// One named property of a bean type: its declared tag plus whichever of
/// read method, write method, and backing field the scan discovered. At
/// least one of the three is always present.
#[derive(Debug, Clone)]
pub struct PropertyAccessor {
    name: String,
    tag: TypeTag,
    read_method: Option<MethodDef>,
    write_method: Option<MethodDef>,
    field: Option<FieldDef>,
}

impl PropertyAccessor {
    pub(crate) fn new(
        name: &str,
        tag: TypeTag,
        read_method: Option<MethodDef>,
        write_method: Option<MethodDef>,
        field: Option<FieldDef>,
    ) -> Self {
        Self {
            name: name.to_string(),
            tag,
            read_method,
            write_method,
            field,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn has_read_method(&self) -> bool {
        self.read_method.is_some()
    }

    pub fn has_write_method(&self) -> bool {
        self.write_method.is_some()
    }

    pub fn has_field(&self) -> bool {
        self.field.is_some()
    }

    pub fn is_readable(&self) -> bool {
        self.read_method.is_some() || self.field.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.write_method.is_some() || self.field.is_some()
    }

    pub(crate) fn set_read_method(&mut self, method: MethodDef) {
        self.read_method = Some(method);
    }

    pub(crate) fn set_write_method(&mut self, method: MethodDef) {
        self.write_method = Some(method);
    }

    pub(crate) fn set_field(&mut self, field: FieldDef) {
        self.field = Some(field);
    }

    /// Reads the property, preferring the read accessor over direct field
    /// access.
    pub fn get_value(&self, bean: &Bean) -> Result<Value> {
        if let Some(method) = &self.read_method {
            return invoke_method(method, bean, &[]);
        }
        if let Some(field) = &self.field {
            return Ok(bean.get_slot(&field.name).unwrap_or(Value::Null));
        }
        Err(DynSqlError::IllegalProperty(format!(
            "Property '{}' is not readable",
            self.name
        )))
    }

    /// Writes the property, converting numeric values toward the declared
    /// tag when needed. Incompatible values are rejected rather than
    /// stored misshapen.
    pub fn set_value(&self, bean: &Bean, value: Value) -> Result<()> {
        let value = self.convert_if_needed(value)?;
        if let Some(method) = &self.write_method {
            invoke_method(method, bean, &[value])?;
            return Ok(());
        }
        if let Some(field) = &self.field {
            bean.set_slot(&field.name, value);
            return Ok(());
        }
        Err(DynSqlError::IllegalProperty(format!(
            "Property '{}' is not writable",
            self.name
        )))
    }

    fn convert_if_needed(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }
        match self.tag {
            TypeTag::Object(_) => {
                if matches!(value, Value::Bean(_)) {
                    return Ok(value);
                }
            }
            tag => {
                if value.runtime_tag() == tag {
                    return Ok(value);
                }
                if tag.is_numeric() {
                    let mut slot = value.clone();
                    if adjust_number(&tag, &mut slot) {
                        return Ok(slot);
                    }
                }
            }
        }
        Err(DynSqlError::IllegalProperty(format!(
            "Property '{}' expects {} but got {} ({})",
            self.name,
            self.tag,
            value.type_name(),
            value
        )))
    }
}
