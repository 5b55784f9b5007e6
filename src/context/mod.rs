//! Context aspects and the view composer.
//!
//! An aspect is a per-request dimension (workspace, language) that changes
//! which rows of a table are visible. For every table an aspect applies to,
//! the composer builds a view; views nest with the first applicable aspect
//! innermost, and the outermost view replaces the query's FROM table under
//! the same alias.

mod language;
mod workspace;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::schema::TableMeta;
use crate::sql::SelectQuery;

pub use language::LanguageAspect;
pub use workspace::{VersionState, WorkspaceAspect};

/// Alias of the base table inside every view.
pub(crate) const BASE: &str = "base";

/// How translated rows are merged with default-language rows.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum OverlayMode {
    /// Rows of the requested language (or all languages), no merging.
    #[default]
    Off,
    /// Default-language rows, overlaid with a translation where one exists.
    Mixed,
    /// Like `Mixed`, but rows without a translation are dropped.
    On,
    /// Like `On`, plus rows that exist only in the requested language.
    OnWithFloating,
}

impl FromStr for OverlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(OverlayMode::Off),
            "mixed" => Ok(OverlayMode::Mixed),
            "on" => Ok(OverlayMode::On),
            "on_with_floating" | "onwithfloating" | "floating" => Ok(OverlayMode::OnWithFloating),
            other => Err(format!("unknown overlay mode '{other}'")),
        }
    }
}

impl fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OverlayMode::Off => "off",
            OverlayMode::Mixed => "mixed",
            OverlayMode::On => "on",
            OverlayMode::OnWithFloating => "on_with_floating",
        })
    }
}

/// One active aspect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Aspect {
    /// Workspace versioning.
    Workspace(WorkspaceAspect),
    /// Localization.
    Language(LanguageAspect),
}

impl Aspect {
    /// Name the aspect is looked up by.
    pub fn name(&self) -> &'static str {
        match self {
            Aspect::Workspace(_) => WorkspaceAspect::NAME,
            Aspect::Language(_) => LanguageAspect::NAME,
        }
    }

    /// Whether the aspect changes rows of `table`.
    pub fn applies_to(&self, table: &TableMeta) -> bool {
        match self {
            Aspect::Workspace(_) => table.versioning.is_some(),
            Aspect::Language(_) => table.localization.is_some(),
        }
    }

    fn view(
        &self,
        table: &TableMeta,
        columns: &[&str],
        config: &EngineConfig,
        inner: Option<&SelectQuery>,
    ) -> Result<Option<SelectQuery>, CompileError> {
        match self {
            Aspect::Workspace(ws) => ws.view(table, columns),
            Aspect::Language(lang) => lang.view(table, columns, config, inner),
        }
    }
}

/// Aspects active for one request, kept in composition order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AspectContext {
    aspects: Vec<Aspect>,
}

impl AspectContext {
    /// No aspects: every table is read as-is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an aspect. Workspace always composes inside language.
    pub fn with(mut self, aspect: Aspect) -> Self {
        self.aspects.retain(|a| a.name() != aspect.name());
        self.aspects.push(aspect);
        self.aspects.sort_by_key(|a| match a {
            Aspect::Workspace(_) => 0,
            Aspect::Language(_) => 1,
        });
        self
    }

    /// Aspect by name.
    pub fn get(&self, name: &str) -> Option<&Aspect> {
        self.aspects.iter().find(|a| a.name() == name)
    }

    /// Whether any aspect is active.
    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Aspects applying to `table`, innermost first.
    pub fn applicable<'a>(&'a self, table: &'a TableMeta) -> impl Iterator<Item = &'a Aspect> + 'a {
        self.aspects.iter().filter(move |a| a.applies_to(table))
    }
}

/// Columns the outer query reads from a view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ColumnSet {
    /// Unknown; project every column of the table.
    #[default]
    All,
    /// Exactly these, plus the table's system columns.
    Only(BTreeSet<String>),
}

impl ColumnSet {
    /// Column list for `table`, in table declaration order.
    pub fn resolve<'t>(&self, table: &'t TableMeta) -> Vec<&'t str> {
        match self {
            ColumnSet::All => table.columns.iter().map(String::as_str).collect(),
            ColumnSet::Only(wanted) => {
                let system = table.system_columns();
                table
                    .columns
                    .iter()
                    .map(String::as_str)
                    .filter(|c| wanted.contains(*c) || system.contains(c))
                    .collect()
            }
        }
    }
}

/// Rewrites table references into nested aspect views.
pub struct ViewComposer<'a> {
    config: &'a EngineConfig,
    aspects: &'a AspectContext,
}

impl<'a> ViewComposer<'a> {
    /// Composer for one request.
    pub fn new(config: &'a EngineConfig, aspects: &'a AspectContext) -> Self {
        Self { config, aspects }
    }

    /// Builds the nested view for `table`, or `None` when no aspect applies.
    pub fn rewrite(
        &self,
        table: &TableMeta,
        columns: &ColumnSet,
    ) -> Result<Option<SelectQuery>, CompileError> {
        let projected = columns.resolve(table);
        let mut current: Option<SelectQuery> = None;
        let mut layers = 0usize;
        for aspect in self.aspects.applicable(table) {
            let Some(mut view) = aspect.view(table, &projected, self.config, current.as_ref())? else {
                continue;
            };
            if let Some(inner) = current.take() {
                view.replace_from(inner)?;
            }
            current = Some(view);
            layers += 1;
        }
        if layers > 0 {
            debug!(table = table.name.as_str(), layers, "composer.rewrite");
        }
        Ok(current)
    }

    /// Replaces `query`'s FROM table with the composed view. Returns whether
    /// anything changed.
    pub fn apply(
        &self,
        query: &mut SelectQuery,
        table: &TableMeta,
        columns: &ColumnSet,
    ) -> Result<bool, CompileError> {
        match self.rewrite(table, columns)? {
            Some(view) => {
                query.replace_from(view)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
