use thiserror::Error;

#[derive(Error, Debug)]
pub enum DynSqlError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Constructor not found: {0}")]
    ConstructorNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Illegal property access: {0}")]
    IllegalProperty(String),

    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    #[error("Null bind parameter: {0}")]
    BindParameterNull(String),

    #[error("Empty or null-only bind list: {0}")]
    BindListEmptyOrNullOnly(String),

    #[error("Illegal embedded value: {0}")]
    IllegalEmbeddedValue(String),

    #[error("Expression evaluation failed: {0}")]
    ExpressionEvaluation(String),
}

pub type Result<T> = std::result::Result<T, DynSqlError>;
