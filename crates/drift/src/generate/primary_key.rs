//! Primary keys.

use drift_schema::Constraint;

use crate::script::ItemKind;
use crate::Result;

use super::Run;

pub fn generate(run: &mut Run<'_>) -> Result<()> {
    for state in &mut run.tables {
        let found = run
            .actual
            .table_constraints(state.schema(), state.name())
            .find_map(|row| match &row.constraint {
                Constraint::PrimaryKey(pk) => Some((row.name.clone(), pk.clone())),
                _ => None,
            })
            // Dropping a key column takes the key with it.
            .filter(|(_, pk)| !state.touches_skipped(pk.columns.iter().map(String::as_str)));

        let desired = state.desired.primary_key.clone();
        match (found, desired) {
            (None, None) => {}
            (Some((name, _)), None) => state.fragment.drop_primary_key = Some(name),
            (None, Some(pk)) => state.fragment.add_primary_key = Some(pk),
            (Some((name, actual)), Some(pk)) if actual.columns == pk.columns => {
                let to = pk.name_or_default(&state.desired.name);
                if name != to {
                    state.rename_item(ItemKind::Constraint, name, to);
                }
            }
            (Some((name, _)), Some(pk)) => {
                tracing::debug!(table = %state.name(), "primary key columns changed");
                state.fragment.drop_primary_key = Some(name);
                state.fragment.add_primary_key = Some(pk);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::RunConfig;
    use crate::generate::testing::*;
    use drift_schema::{Column, DesiredSchema, PrimaryKey, Table};

    fn account(pk: &[&str]) -> DesiredSchema {
        DesiredSchema::new().table(
            Table::new("account")
                .column(Column::new("tenant", "int8"))
                .column(Column::new("id", "int8"))
                .primary_key(PrimaryKey::new(pk.iter().copied())),
        )
    }

    #[tokio::test]
    async fn test_primary_key_columns_change() {
        let actual = structure_of(&account(&["id"]), &RunConfig::default());
        let script = compose_with(&account(&["tenant", "id"]), &actual, []).await.unwrap();
        insta::assert_snapshot!(lines(&script), @r"
        ~ table public.account
            - PRIMARY KEY account_pkey
            + PRIMARY KEY (tenant, id)
        ");
    }

    #[tokio::test]
    async fn test_primary_key_renamed() {
        let mut actual = structure_of(&account(&["id"]), &RunConfig::default());
        actual.rename_table_item("public", "account", "account_pkey", "pk_account");
        let script = compose_with(&account(&["id"]), &actual, []).await.unwrap();
        insta::assert_snapshot!(lines(&script), @"~ public.account: rename pk_account -> account_pkey");
    }
}
