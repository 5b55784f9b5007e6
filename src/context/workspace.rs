use super::BASE;
use crate::error::CompileError;
use crate::schema::TableMeta;
use crate::sql::{CompareOp, JoinKind, Param, SelectQuery, SqlExpr};

const OVERLAY: &str = "ov";
const MOVE_POINTER: &str = "mp";

/// Values of the version state column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i64)]
pub enum VersionState {
    /// Live row, or a plain modification overlay.
    Default = 0,
    /// Row created inside a workspace.
    NewPlaceholder = 1,
    /// Overlay marking the live row deleted in the workspace.
    DeletePlaceholder = 2,
    /// Overlay carrying the new position of a moved row.
    MovePointer = 4,
}

impl VersionState {
    fn sql(self) -> SqlExpr {
        SqlExpr::Integer(self as i64)
    }
}

/// Active workspace; 0 is live.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct WorkspaceAspect {
    /// Workspace id.
    pub workspace_id: i64,
}

impl WorkspaceAspect {
    /// Lookup name.
    pub const NAME: &'static str = "workspace";

    /// Aspect for `workspace_id`.
    pub fn new(workspace_id: i64) -> Self {
        Self { workspace_id }
    }

    /// Live view: only rows that belong to no workspace and shadow nothing.
    ///
    /// Workspace view: live rows and rows created in the workspace; each live
    /// row is overlaid with its workspace version, hidden by a delete
    /// placeholder, and repositioned by a move pointer. The identity stays the
    /// live identity so relations keep pointing at it.
    pub(super) fn view(
        &self,
        table: &TableMeta,
        columns: &[&str],
    ) -> Result<Option<SelectQuery>, CompileError> {
        let Some(v) = &table.versioning else {
            return Ok(None);
        };
        let base = |c: &str| SqlExpr::column(BASE, c);
        let mut view = SelectQuery::from_table(&table.name, BASE);

        if self.workspace_id == 0 {
            for column in columns {
                view.select_column(column);
            }
            view.and_where(SqlExpr::eq(base(&v.workspace), SqlExpr::Integer(0)))
                .and_where(SqlExpr::eq(base(&v.origin), SqlExpr::Integer(0)));
            return Ok(Some(view));
        }

        let ws = view.bind(
            &format!("{}.{}", table.name, v.workspace),
            Param::Int(self.workspace_id),
        )?;
        let leg = |alias: &str, states: Vec<SqlExpr>| {
            SqlExpr::And(vec![
                SqlExpr::eq(SqlExpr::column(alias, &v.origin), base(&table.identity)),
                SqlExpr::eq(SqlExpr::column(alias, &v.workspace), ws.clone()),
                SqlExpr::in_list(SqlExpr::column(alias, &v.state), states),
            ])
        };
        let overlay_on = leg(
            OVERLAY,
            vec![VersionState::Default.sql(), VersionState::DeletePlaceholder.sql()],
        );
        let pointer_on = leg(MOVE_POINTER, vec![VersionState::MovePointer.sql()]);
        view.join(JoinKind::Left, &table.name, OVERLAY, overlay_on)
            .join(JoinKind::Left, &table.name, MOVE_POINTER, pointer_on);

        let has_overlay = SqlExpr::is_not_null(SqlExpr::column(OVERLAY, &table.identity));
        let versioning_columns = [v.origin.as_str(), v.workspace.as_str(), v.state.as_str()];
        for column in columns {
            let expr = if *column == table.identity || versioning_columns.contains(column) {
                base(column)
            } else if v.position.iter().any(|p| p == column) {
                SqlExpr::Coalesce(vec![
                    SqlExpr::column(MOVE_POINTER, column),
                    SqlExpr::column(OVERLAY, column),
                    base(column),
                ])
            } else {
                SqlExpr::case(
                    has_overlay.clone(),
                    SqlExpr::column(OVERLAY, column),
                    base(column),
                )
            };
            view.select(expr, Some(column));
        }

        view.and_where(SqlExpr::eq(base(&v.origin), SqlExpr::Integer(0)))
            .and_where(SqlExpr::Or(vec![
                SqlExpr::eq(base(&v.workspace), SqlExpr::Integer(0)),
                SqlExpr::And(vec![
                    SqlExpr::eq(base(&v.workspace), ws),
                    SqlExpr::eq(base(&v.state), VersionState::NewPlaceholder.sql()),
                ]),
            ]))
            .and_where(SqlExpr::Or(vec![
                SqlExpr::is_null(SqlExpr::column(OVERLAY, &v.state)),
                SqlExpr::compare(
                    CompareOp::Neq,
                    SqlExpr::column(OVERLAY, &v.state),
                    VersionState::DeletePlaceholder.sql(),
                ),
            ]));
        Ok(Some(view))
    }
}
