use super::{OverlayMode, BASE};
use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::schema::TableMeta;
use crate::sql::{JoinKind, Param, SelectQuery, SqlExpr};

const TRANSLATION: &str = "tr";

/// Requested language and overlay mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct LanguageAspect {
    /// Language id; 0 is the default language.
    pub language_id: i64,
    /// Overlay mode.
    pub overlay: OverlayMode,
}

impl LanguageAspect {
    /// Lookup name.
    pub const NAME: &'static str = "language";

    /// Aspect for `language_id` in `overlay` mode.
    pub fn new(language_id: i64, overlay: OverlayMode) -> Self {
        Self {
            language_id,
            overlay,
        }
    }

    /// Language view of `table`. When `inner` is given, the translation leg
    /// reads it instead of the raw table, so it sees the same rows as `base`.
    pub(super) fn view(
        &self,
        table: &TableMeta,
        columns: &[&str],
        config: &EngineConfig,
        inner: Option<&SelectQuery>,
    ) -> Result<Option<SelectQuery>, CompileError> {
        let Some(l) = &table.localization else {
            return Ok(None);
        };
        let all = config.localization.all_languages;
        let base = |c: &str| SqlExpr::column(BASE, c);
        let lang_key = format!("{}.{}", table.name, l.language);
        let mut view = SelectQuery::from_table(&table.name, BASE);

        if self.overlay == OverlayMode::Off || self.language_id == 0 {
            for column in columns {
                view.select_column(column);
            }
            let accepted = view.bind(&lang_key, Param::IntList(vec![self.language_id, all]))?;
            view.and_where(SqlExpr::in_list(base(&l.language), vec![accepted]));
            return Ok(Some(view));
        }

        let lang = view.bind(&lang_key, Param::Int(self.language_id))?;
        let on = SqlExpr::And(vec![
            SqlExpr::eq(
                SqlExpr::column(TRANSLATION, &l.source),
                base(&table.identity),
            ),
            SqlExpr::eq(SqlExpr::column(TRANSLATION, &l.language), lang.clone()),
        ]);
        match inner {
            Some(inner) => {
                view.join_view(JoinKind::Left, inner.clone(), TRANSLATION, on)?;
            }
            None => {
                view.join(JoinKind::Left, &table.name, TRANSLATION, on);
            }
        }

        let translated = SqlExpr::is_not_null(SqlExpr::column(TRANSLATION, &table.identity));
        for column in columns {
            let expr = if *column == table.identity || *column == l.source {
                base(column)
            } else {
                SqlExpr::case(
                    translated.clone(),
                    SqlExpr::column(TRANSLATION, column),
                    base(column),
                )
            };
            view.select(expr, Some(column));
        }

        let mut accepted = vec![0, all];
        if self.overlay == OverlayMode::OnWithFloating {
            accepted.push(self.language_id);
        }
        let accepted = view.bind(&lang_key, Param::IntList(accepted))?;
        view.and_where(SqlExpr::in_list(base(&l.language), vec![accepted]));

        match self.overlay {
            OverlayMode::Off | OverlayMode::Mixed => {}
            OverlayMode::On => {
                view.and_where(SqlExpr::Or(vec![
                    translated,
                    SqlExpr::eq(base(&l.language), SqlExpr::Integer(all)),
                ]));
            }
            OverlayMode::OnWithFloating => {
                view.and_where(SqlExpr::Or(vec![
                    translated,
                    SqlExpr::eq(base(&l.language), SqlExpr::Integer(all)),
                    SqlExpr::And(vec![
                        SqlExpr::eq(base(&l.language), lang),
                        SqlExpr::eq(base(&l.source), SqlExpr::Integer(0)),
                    ]),
                ]));
            }
        }
        Ok(Some(view))
    }
}
