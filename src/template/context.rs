use std::collections::HashMap;
use std::sync::Arc;

use crate::beans::TypeRegistry;
use crate::core::{TypeTag, Value};

/// One output frame: accumulated SQL, bind pairs in appearance order, and
/// the enabled flag that decides whether an optional clause survives. The
/// root frame starts enabled; BEGIN blocks evaluate into a disabled scratch
/// frame and only transfer it when a condition inside fired.
#[derive(Debug)]
pub struct OutFrame {
    pub sql: String,
    pub bind_values: Vec<Value>,
    pub bind_tags: Vec<TypeTag>,
    pub enabled: bool,
}

impl OutFrame {
    fn new(enabled: bool) -> Self {
        Self {
            sql: String::new(),
            bind_values: Vec::new(),
            bind_tags: Vec::new(),
            enabled,
        }
    }
}

#[derive(Debug)]
struct ArgEntry {
    value: Value,
    tag: TypeTag,
}

#[derive(Debug)]
struct LoopFrame {
    current: Value,
    index: usize,
    size: usize,
}

/// Per-generation-call state: the named-argument namespace, the output
/// frame stack, and the FOR-loop stack. One context per call, never
/// shared; the parsed node tree mutates it while walking and the caller
/// extracts the finished SQL and bind list afterwards.
pub struct CommandContext {
    registry: Arc<TypeRegistry>,
    args: HashMap<String, ArgEntry>,
    frames: Vec<OutFrame>,
    loops: Vec<LoopFrame>,
}

impl CommandContext {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            args: HashMap::new(),
            frames: vec![OutFrame::new(true)],
            loops: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Registers a named argument. Lookup is case-insensitive.
    pub fn add_arg(&mut self, name: &str, value: Value, tag: TypeTag) {
        self.args
            .insert(name.to_lowercase(), ArgEntry { value, tag });
    }

    pub fn get_arg(&self, name: &str) -> Option<(&Value, TypeTag)> {
        self.args
            .get(&name.to_lowercase())
            .map(|entry| (&entry.value, entry.tag))
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.args.contains_key(&name.to_lowercase())
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    pub fn add_sql(&mut self, sql: &str) {
        self.current_frame().sql.push_str(sql);
    }

    /// Appends SQL together with one bind pair, keeping the list aligned
    /// with placeholder positions.
    pub fn add_bind(&mut self, sql: &str, value: Value, tag: TypeTag) {
        let frame = self.current_frame();
        frame.sql.push_str(sql);
        frame.bind_values.push(value);
        frame.bind_tags.push(tag);
    }

    pub fn push_frame(&mut self) {
        self.frames.push(OutFrame::new(false));
    }

    pub fn pop_frame(&mut self) -> OutFrame {
        debug_assert!(self.frames.len() > 1, "root frame must not be popped");
        self.frames.pop().unwrap_or_else(|| OutFrame::new(true))
    }

    /// Transfers a popped scratch frame into the current one, binds and
    /// all.
    pub fn append_frame(&mut self, frame: OutFrame) {
        let current = self.current_frame();
        current.sql.push_str(&frame.sql);
        current.bind_values.extend(frame.bind_values);
        current.bind_tags.extend(frame.bind_tags);
    }

    pub fn is_enabled(&self) -> bool {
        self.frames.last().map(|f| f.enabled).unwrap_or(true)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.current_frame().enabled = enabled;
    }

    pub fn sql(&self) -> &str {
        self.frames.first().map(|f| f.sql.as_str()).unwrap_or("")
    }

    /// Tears the context down into (sql, bind values, bind tags) of the
    /// root frame.
    pub fn into_result(mut self) -> (String, Vec<Value>, Vec<TypeTag>) {
        if self.frames.is_empty() {
            return (String::new(), Vec::new(), Vec::new());
        }
        let root = self.frames.swap_remove(0);
        (root.sql, root.bind_values, root.bind_tags)
    }

    fn current_frame(&mut self) -> &mut OutFrame {
        if self.frames.is_empty() {
            self.frames.push(OutFrame::new(true));
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    // ------------------------------------------------------------------
    // FOR loops
    // ------------------------------------------------------------------

    pub fn push_loop(&mut self, current: Value, index: usize, size: usize) {
        self.loops.push(LoopFrame {
            current,
            index,
            size,
        });
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn loop_index(&self) -> Option<usize> {
        self.loops.last().map(|l| l.index)
    }

    pub fn is_loop_last(&self) -> bool {
        self.loops
            .last()
            .map(|l| l.index + 1 == l.size)
            .unwrap_or(false)
    }

    /// The innermost loop element, referenced in templates as `#current`.
    pub fn current_loop_value(&self) -> Option<Value> {
        self.loops.last().map(|l| l.current.clone())
    }
}

/// Builds contexts from the caller's three parallel argument arrays.
/// Surplus values get positional `$n` names (matching the names the
/// tokenizer hands out for plain `?` markers); a missing tag falls back to
/// the value's runtime tag.
pub struct CommandContextCreator {
    arg_names: Vec<String>,
    arg_tags: Vec<TypeTag>,
}

impl CommandContextCreator {
    pub fn new(names: &[&str], tags: &[TypeTag]) -> Self {
        Self {
            arg_names: names.iter().map(|n| n.to_string()).collect(),
            arg_tags: tags.to_vec(),
        }
    }

    pub fn create(&self, registry: Arc<TypeRegistry>, values: &[Value]) -> CommandContext {
        let mut ctx = CommandContext::new(registry);
        for (i, value) in values.iter().enumerate() {
            let tag = self
                .arg_tags
                .get(i)
                .copied()
                .unwrap_or_else(|| value.runtime_tag());
            match self.arg_names.get(i) {
                Some(name) => ctx.add_arg(name, value.clone(), tag),
                None => ctx.add_arg(&format!("${}", i + 1), value.clone(), tag),
            }
        }
        ctx
    }
}
