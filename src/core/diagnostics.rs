use std::fmt::Write;

/// Builds the multi-section failure messages used by template and binding
/// errors: a one-line notice followed by titled items, each with element
/// lines, fenced by a star banner so the sections stand out in logs.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    notice: Option<String>,
    items: Vec<(String, Vec<String>)>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_notice(&mut self, notice: impl Into<String>) -> &mut Self {
        self.notice = Some(notice.into());
        self
    }

    pub fn add_item(&mut self, title: impl Into<String>) -> &mut Self {
        self.items.push((title.into(), Vec::new()));
        self
    }

    /// Adds a line under the most recent item. Lines added before any item
    /// open an implicit "Description" item.
    pub fn add_element(&mut self, element: impl Into<String>) -> &mut Self {
        if self.items.is_empty() {
            self.items.push(("Description".to_string(), Vec::new()));
        }
        if let Some((_, elements)) = self.items.last_mut() {
            elements.push(element.into());
        }
        self
    }

    pub fn build(&self) -> String {
        let mut msg = String::new();
        if let Some(notice) = &self.notice {
            msg.push_str(notice);
            msg.push('\n');
        }
        msg.push_str("/* * * * * * * * * * * * * * * * * * * * * * * * * * * * *\n");
        for (title, elements) in &self.items {
            let _ = writeln!(msg, "[{}]", title);
            for element in elements {
                let _ = writeln!(msg, "{}", element);
            }
        }
        msg.push_str("* * * * * * * * * */");
        msg
    }
}
