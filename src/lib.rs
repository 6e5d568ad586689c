// ============================================================================
// dynsql Library
// ============================================================================

pub mod beans;
pub mod core;
pub mod evaluator;
pub mod template;

// Re-export main types for convenience
pub use crate::beans::{BeanMetadata, ClassDefBuilder, PropertyAccessor, TypeRegistry};
pub use crate::core::{Bean, DynSqlError, MessageBuilder, Result, TypeId, TypeTag, Value};
pub use crate::template::{CommandContext, CommandContextCreator, Node, TemplateParser};

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use lru::LruCache;

const TEMPLATE_CACHE_CAPACITY: usize = 256;

/// Result of one generation call: executable SQL with positional `?`
/// placeholders, plus the bind values and their declared tags in
/// placeholder order. `bind_values.len()` always equals the placeholder
/// count in `sql`.
#[derive(Debug)]
pub struct GeneratedSql {
    pub sql: String,
    pub bind_values: Vec<Value>,
    pub bind_tags: Vec<TypeTag>,
}

/// Two-way SQL engine: parses annotated templates (caching the node tree
/// per distinct template text) and evaluates them against named arguments.
///
/// The engine itself is cheap state and safe to share across threads; each
/// `generate` call works on its own context.
///
/// # Examples
///
/// ```
/// use dynsql::{SqlEngine, TypeTag, Value};
///
/// # fn main() -> dynsql::Result<()> {
/// let engine = SqlEngine::new();
/// let generated = engine.generate(
///     "select * from MEMBER where MEMBER_ID = /*id*/3",
///     &["id"],
///     &[TypeTag::Integer],
///     &[Value::Integer(42)],
/// )?;
///
/// assert_eq!(generated.sql, "select * from MEMBER where MEMBER_ID = ?");
/// assert_eq!(generated.bind_values, vec![Value::Integer(42)]);
/// # Ok(())
/// # }
/// ```
///
/// Optional clauses elide themselves when nothing inside fired:
///
/// ```
/// use dynsql::{SqlEngine, TypeTag, Value};
///
/// # fn main() -> dynsql::Result<()> {
/// let engine = SqlEngine::new();
/// let sql = "select * from MEMBER \
///            /*BEGIN*/where /*IF name != null*/NAME = /*name*/'x'/*END*//*END*/";
///
/// let skipped = engine.generate(sql, &["name"], &[TypeTag::Text], &[Value::Null])?;
/// assert_eq!(skipped.sql, "select * from MEMBER ");
///
/// let kept = engine.generate(sql, &["name"], &[TypeTag::Text], &[Value::from("abc")])?;
/// assert_eq!(kept.sql, "select * from MEMBER where NAME = ?");
/// # Ok(())
/// # }
/// ```
pub struct SqlEngine {
    registry: Arc<TypeRegistry>,
    templates: Mutex<LruCache<String, Arc<Node>>>,
    block_null_parameter: bool,
}

impl SqlEngine {
    /// Engine over the global type registry.
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::global().clone())
    }

    /// Engine over its own registry. Tests and embedders use this for
    /// isolation.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            templates: Mutex::new(LruCache::new(
                NonZeroUsize::new(TEMPLATE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
            block_null_parameter: false,
        }
    }

    /// Rejects null bind/embedded values for every variable comment in
    /// templates parsed by this engine.
    pub fn block_null_parameter(mut self, block: bool) -> Self {
        self.block_null_parameter = block;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Parses a template to its node tree, serving repeats from the LRU
    /// cache keyed by the exact template text.
    pub fn analyze(&self, sql: &str) -> Result<Arc<Node>> {
        {
            let mut cache = self
                .templates
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(found) = cache.get(sql) {
                return Ok(found.clone());
            }
        }
        let parsed = Arc::new(TemplateParser::new(sql, self.block_null_parameter).parse()?);
        debug!("parsed two-way SQL template ({} chars)", sql.len());
        let mut cache = self
            .templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        cache.put(sql.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Generates SQL from a template and three parallel argument arrays.
    /// Either the full result is produced or the first failure aborts the
    /// call; there is no partial output.
    pub fn generate(
        &self,
        sql: &str,
        arg_names: &[&str],
        arg_tags: &[TypeTag],
        arg_values: &[Value],
    ) -> Result<GeneratedSql> {
        let node = self.analyze(sql)?;
        let creator = CommandContextCreator::new(arg_names, arg_tags);
        let mut ctx = creator.create(self.registry.clone(), arg_values);
        node.accept(&mut ctx)?;
        let (sql, bind_values, bind_tags) = ctx.into_result();
        Ok(GeneratedSql {
            sql,
            bind_values,
            bind_tags,
        })
    }
}

impl Default for SqlEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_literal_roundtrip() {
        let engine = SqlEngine::with_registry(Arc::new(TypeRegistry::new()));
        let generated = engine
            .generate("select * from MEMBER", &[], &[], &[])
            .unwrap();
        assert_eq!(generated.sql, "select * from MEMBER");
        assert!(generated.bind_values.is_empty());
        assert!(generated.bind_tags.is_empty());
    }

    #[test]
    fn test_engine_caches_parsed_templates() {
        let engine = SqlEngine::with_registry(Arc::new(TypeRegistry::new()));
        let sql = "select * from MEMBER where MEMBER_ID = /*id*/3";
        let first = engine.analyze(sql).unwrap();
        let second = engine.analyze(sql).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_engine_block_null_parameter() {
        let engine =
            SqlEngine::with_registry(Arc::new(TypeRegistry::new())).block_null_parameter(true);
        let err = engine
            .generate(
                "where ID = /*id*/3",
                &["id"],
                &[TypeTag::Integer],
                &[Value::Null],
            )
            .unwrap_err();
        assert!(matches!(err, DynSqlError::BindParameterNull(_)));
    }
}
