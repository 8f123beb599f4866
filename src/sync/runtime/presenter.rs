use std::fmt::Write as _;

use crate::sync::domain::SectionedStore;
use crate::sync::engine::{EditOp, EditScript};
use crate::sync::types::{RecordId, RecordKind};

/// Rendering side of the list, driven by engine commands.
pub trait Presenter {
    /// Replace the whole list with the store's current contents.
    fn rebuild(&mut self, store: &SectionedStore);

    /// Apply an incremental edit. `store` already reflects the edit.
    fn apply(&mut self, script: &EditScript, store: &SectionedStore);

    /// Select the pivot row again once an edit has settled.
    fn reselect(&mut self, kind: RecordKind, id: &str);

    /// Close the detail view if it shows a deleted record.
    fn clear_detail(&mut self, kind: RecordKind, id: &str);

    /// User-visible alert; the rendered list stays as it was.
    fn show_error(&mut self, title: &str, message: &str);
}

/// Renders a store as an indented text list.
pub fn render(store: &SectionedStore) -> String {
    let mut out = String::new();
    for section in store.sections() {
        let _ = writeln!(out, "{}", section.key().title());
        for record in section.records() {
            let _ = writeln!(out, "    {}  [{}]", record.display_text(), record.id);
        }
    }
    out
}

/// Presenter for the command-line tool.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    pub selected: Option<(RecordKind, RecordId)>,
    pub detail: Option<(RecordKind, RecordId)>,
    pub quiet: bool,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the detail view for a record.
    pub fn show_detail(&mut self, kind: RecordKind, id: &str) {
        self.detail = Some((kind, id.to_string()));
    }
}

impl Presenter for ConsolePresenter {
    fn rebuild(&mut self, store: &SectionedStore) {
        log::debug!("[UI] rebuild {} ({} records)", store.kind(), store.len());
        if !self.quiet {
            println!("== {} ==", store.kind());
            print!("{}", render(store));
        }
    }

    fn apply(&mut self, script: &EditScript, store: &SectionedStore) {
        for op in &script.ops {
            log::debug!("[UI] {} {:?}", script.kind, op);
        }
        if self.quiet {
            return;
        }
        for op in &script.ops {
            let line = match op {
                EditOp::InsertSectionBefore { section, before } => {
                    format!("+ section {} (before {})", section.title(), before.title())
                }
                EditOp::InsertSectionAfter { section, after } => {
                    format!("+ section {} (after {})", section.title(), after.title())
                }
                EditOp::AppendSection { section } => format!("+ section {}", section.title()),
                EditOp::DeleteSection { section } => format!("- section {}", section.title()),
                EditOp::InsertRecord { id, section, index } => {
                    format!("+ {} in {} at {}", id, section.title(), index)
                }
                EditOp::DeleteRecord { id, section } => {
                    format!("- {} from {}", id, section.title())
                }
                EditOp::MoveRecord { id, from, to, .. } => format!("~ {} row {} -> {}", id, from, to),
                EditOp::ReloadRecord { id } => match store.get(id) {
                    Some(record) => format!("* {}", record.display_text()),
                    None => format!("* {}", id),
                },
            };
            println!("{}", line);
        }
    }

    fn reselect(&mut self, kind: RecordKind, id: &str) {
        self.selected = Some((kind, id.to_string()));
    }

    fn clear_detail(&mut self, kind: RecordKind, id: &str) {
        if self.detail.as_ref().is_some_and(|(k, d)| *k == kind && d == id) {
            log::debug!("[UI] closing detail for {}", id);
            self.detail = None;
        }
        if self.selected.as_ref().is_some_and(|(k, s)| *k == kind && s == id) {
            self.selected = None;
        }
    }

    fn show_error(&mut self, title: &str, message: &str) {
        eprintln!("{}\n{}", title, message);
    }
}
