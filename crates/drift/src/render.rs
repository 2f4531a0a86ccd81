//! Rendering operations as PostgreSQL statements.
//!
//! The verification runner replays exactly this text, and the external
//! migration writer may embed it as-is.

use drift_schema::{
    CheckConstraint, Column, FkAction, FkMatch, ForeignKey, Index, IndexColumn, IndexKey,
    PrimaryKey, ResolvedIdentity,
};
use drift_sql::{Ident, Lit, Qualified};

use crate::script::{
    ChangeScript, ColumnChange, CreateTable, DependentColumn, ItemKind, Op, Placement,
    TableChange, TableConstraint, TypeKind,
};

/// Render a whole script, one statement per line.
pub fn render_script(script: &ChangeScript) -> String {
    let mut out = String::new();
    for op in &script.ops {
        for stmt in render_op(op) {
            out.push_str(&stmt);
            out.push_str(";\n");
        }
    }
    out
}

/// Render one operation as a list of statements (without trailing `;`).
pub fn render_op(op: &Op) -> Vec<String> {
    match op {
        Op::CreateSchema { name } => vec![format!("CREATE SCHEMA {}", Ident(name))],
        Op::DropSchema { name } => vec![format!("DROP SCHEMA {}", Ident(name))],
        Op::RenameSchema { from, to } => {
            vec![format!("ALTER SCHEMA {} RENAME TO {}", Ident(from), Ident(to))]
        }
        Op::CreateExtension {
            name,
            schema,
            version,
        } => {
            let mut sql = format!("CREATE EXTENSION IF NOT EXISTS {}", Ident(name));
            if let Some(schema) = schema {
                sql.push_str(&format!(" SCHEMA {}", Ident(schema)));
            }
            if let Some(version) = version {
                sql.push_str(&format!(" VERSION {}", Lit(version)));
            }
            vec![sql]
        }
        Op::DropExtension { name } => vec![format!("DROP EXTENSION {}", Ident(name))],
        Op::CreateDomain {
            schema,
            name,
            base,
            checks,
        } => vec![create_domain_sql(schema, name, base, checks)],
        Op::DropDomain { schema, name } => {
            vec![format!("DROP DOMAIN {}", Qualified(Some(schema), name))]
        }
        Op::RecreateDomain {
            schema,
            name,
            old_base,
            base,
            checks,
            dependents,
        } => recreate_domain(schema, name, old_base, base, checks, dependents),
        Op::CreateEnum {
            schema,
            name,
            values,
        } => vec![create_enum_sql(schema, name, values)],
        Op::DropEnum { schema, name } => {
            vec![format!("DROP TYPE {}", Qualified(Some(schema), name))]
        }
        Op::AddEnumValues {
            schema,
            name,
            values,
        } => values
            .iter()
            .map(|v| {
                let placement = match &v.placement {
                    Placement::Before(other) => format!(" BEFORE {}", Lit(other)),
                    Placement::After(other) => format!(" AFTER {}", Lit(other)),
                    Placement::End => String::new(),
                };
                format!(
                    "ALTER TYPE {} ADD VALUE {}{}",
                    Qualified(Some(schema), name),
                    Lit(&v.value),
                    placement
                )
            })
            .collect(),
        Op::RemoveEnumValues {
            schema,
            name,
            values,
            dependents,
            ..
        }
        | Op::ReplaceEnumValues {
            schema,
            name,
            values,
            dependents,
        } => recreate_enum(schema, name, values, dependents),
        Op::CreateTable(table) => create_table(table),
        Op::DropTable { schema, name } => {
            vec![format!("DROP TABLE {}", Qualified(Some(schema), name))]
        }
        Op::RenameType {
            kind,
            from_schema,
            from,
            to_schema,
            to,
        } => {
            let keyword = match kind {
                TypeKind::Table => "TABLE",
                TypeKind::Enum => "TYPE",
                TypeKind::Domain => "DOMAIN",
            };
            let mut stmts = Vec::new();
            if from_schema != to_schema {
                stmts.push(format!(
                    "ALTER {keyword} {} SET SCHEMA {}",
                    Qualified(Some(from_schema), from),
                    Ident(to_schema)
                ));
            }
            if from != to {
                stmts.push(format!(
                    "ALTER {keyword} {} RENAME TO {}",
                    Qualified(Some(to_schema), from),
                    Ident(to)
                ));
            }
            stmts
        }
        Op::ChangeTable(change) => change_table(change),
        Op::RenameTableItem {
            kind,
            schema,
            table,
            from,
            to,
        } => match kind {
            ItemKind::Index => vec![format!(
                "ALTER INDEX {} RENAME TO {}",
                Qualified(Some(schema), from),
                Ident(to)
            )],
            ItemKind::Constraint => vec![format!(
                "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
                Qualified(Some(schema), table),
                Ident(from),
                Ident(to)
            )],
        },
    }
}

/// The SQL type of a column, with length/precision modifiers.
pub fn column_type(col: &Column) -> String {
    let mut sql = col.ty.element().to_string();
    let modifiers = match (col.max_chars, col.precision, col.scale, col.datetime_precision) {
        (Some(n), _, _, _) => Some(n.to_string()),
        (None, Some(p), Some(s), _) => Some(format!("{p}, {s}")),
        (None, Some(p), None, _) => Some(p.to_string()),
        (None, None, _, Some(p)) => Some(p.to_string()),
        _ => None,
    };
    if let Some(modifiers) = modifiers {
        sql.push_str(&format!("({modifiers})"));
    }
    for _ in 0..col.ty.array_dims {
        sql.push_str("[]");
    }
    sql
}

fn identity_sql(identity: &ResolvedIdentity) -> String {
    let generated = if identity.always {
        "ALWAYS"
    } else {
        "BY DEFAULT"
    };
    format!(
        "GENERATED {generated} AS IDENTITY (START WITH {} INCREMENT BY {} MINVALUE {} MAXVALUE {} CACHE {}{})",
        identity.start,
        identity.increment,
        identity.min,
        identity.max,
        identity.cache,
        if identity.cycle { " CYCLE" } else { "" }
    )
}

/// A column definition as used by `CREATE TABLE` and `ADD COLUMN`.
pub fn column_definition(col: &Column) -> String {
    let mut sql = format!("{} {}", Ident(&col.name), column_type(col));
    if let Some(collate) = &col.collate {
        sql.push_str(&format!(" COLLATE {}", Ident(collate)));
    }
    if let Some(identity) = &col.identity {
        sql.push(' ');
        sql.push_str(&identity_sql(&identity.resolve(&col.ty)));
    }
    if !col.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        sql.push_str(&format!(" DEFAULT {default}"));
    }
    sql
}

fn index_column_sql(col: &IndexColumn) -> String {
    let mut sql = match &col.key {
        IndexKey::Column(name) => Ident(name).to_string(),
        IndexKey::Expression(expr) => format!("({expr})"),
    };
    if let Some(collate) = &col.collate {
        sql.push_str(&format!(" COLLATE {}", Ident(collate)));
    }
    if let Some(opclass) = &col.opclass {
        sql.push_str(&format!(" {opclass}"));
    }
    sql.push_str(col.order.to_sql());
    sql.push_str(col.nulls.to_sql());
    sql
}

fn tsvector_expr(idx: &Index) -> String {
    let language = match (&idx.language_column, &idx.language) {
        (Some(column), _) => format!("{}::regconfig", Ident(column)),
        (None, Some(language)) => format!("{}::regconfig", Lit(language)),
        (None, None) => format!("{}::regconfig", Lit("english")),
    };
    let document: Vec<String> = idx
        .columns
        .iter()
        .map(|c| match &c.key {
            IndexKey::Column(name) => format!("coalesce({}, '')", Ident(name)),
            IndexKey::Expression(expr) => format!("coalesce({expr}, '')"),
        })
        .collect();
    format!("(to_tsvector({language}, {}))", document.join(" || ' ' || "))
}

fn index_tail(idx: &Index) -> String {
    let mut sql = String::new();
    if !idx.include.is_empty() {
        let cols: Vec<String> = idx.include.iter().map(|c| Ident(c).to_string()).collect();
        sql.push_str(&format!(" INCLUDE ({})", cols.join(", ")));
    }
    if idx.nulls_not_distinct {
        sql.push_str(" NULLS NOT DISTINCT");
    }
    if let Some(with) = &idx.with {
        sql.push_str(&format!(" WITH ({with})"));
    }
    if let Some(tablespace) = &idx.tablespace {
        sql.push_str(&format!(" TABLESPACE {}", Ident(tablespace)));
    }
    sql
}

/// `CREATE INDEX` for a named index.
pub fn create_index_sql(schema: &str, table: &str, idx: &Index) -> String {
    let unique = if idx.unique { "UNIQUE " } else { "" };
    let name = idx.name.as_deref().unwrap_or_default();
    let (using, columns) = if idx.tsvector {
        ("gin", tsvector_expr(idx))
    } else {
        let cols: Vec<String> = idx.columns.iter().map(index_column_sql).collect();
        (idx.using.as_deref().unwrap_or("btree"), cols.join(", "))
    };
    let mut sql = format!(
        "CREATE {unique}INDEX {} ON {} USING {using} ({columns})",
        Ident(name),
        Qualified(Some(schema), table),
    );
    sql.push_str(&index_tail(idx));
    if let Some(where_clause) = &idx.where_clause {
        sql.push_str(&format!(" WHERE {where_clause}"));
    }
    sql
}

/// `CONSTRAINT ... EXCLUDE ...` clause for a named exclusion constraint.
pub fn exclude_sql(idx: &Index) -> String {
    let elements: Vec<String> = idx
        .columns
        .iter()
        .map(|c| {
            format!(
                "{} WITH {}",
                index_column_sql(c),
                c.with.as_deref().unwrap_or("=")
            )
        })
        .collect();
    let mut sql = format!(
        "CONSTRAINT {} EXCLUDE USING {} ({})",
        Ident(idx.name.as_deref().unwrap_or_default()),
        idx.using.as_deref().unwrap_or("gist"),
        elements.join(", ")
    );
    sql.push_str(&index_tail(idx));
    if let Some(where_clause) = &idx.where_clause {
        sql.push_str(&format!(" WHERE ({where_clause})"));
    }
    sql
}

fn idents(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| Ident(n).to_string()).collect();
    quoted.join(", ")
}

pub fn primary_key_sql(pk: &PrimaryKey) -> String {
    format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        Ident(pk.name.as_deref().unwrap_or_default()),
        idents(&pk.columns)
    )
}

pub fn foreign_key_sql(fk: &ForeignKey) -> String {
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        Ident(fk.name.as_deref().unwrap_or_default()),
        idents(&fk.columns),
        Qualified(fk.references_schema.as_deref(), &fk.references_table),
        idents(&fk.references_columns)
    );
    if fk.match_type != FkMatch::Simple {
        sql.push_str(&format!(" MATCH {}", fk.match_type));
    }
    if fk.on_update != FkAction::NoAction {
        sql.push_str(&format!(" ON UPDATE {}", fk.on_update));
    }
    if fk.on_delete != FkAction::NoAction {
        sql.push_str(&format!(" ON DELETE {}", fk.on_delete));
    }
    sql
}

pub fn check_sql(check: &CheckConstraint) -> String {
    format!(
        "CONSTRAINT {} CHECK ({})",
        Ident(check.name.as_deref().unwrap_or_default()),
        check.expr
    )
}

fn create_enum_sql(schema: &str, name: &str, values: &[String]) -> String {
    let values: Vec<String> = values.iter().map(|v| Lit(v).to_string()).collect();
    format!(
        "CREATE TYPE {} AS ENUM ({})",
        Qualified(Some(schema), name),
        values.join(", ")
    )
}

fn create_domain_sql(schema: &str, name: &str, base: &Column, checks: &[CheckConstraint]) -> String {
    let mut sql = format!(
        "CREATE DOMAIN {} AS {}",
        Qualified(Some(schema), name),
        column_type(base)
    );
    if let Some(collate) = &base.collate {
        sql.push_str(&format!(" COLLATE {}", Ident(collate)));
    }
    if let Some(default) = &base.default {
        sql.push_str(&format!(" DEFAULT {default}"));
    }
    if !base.nullable {
        sql.push_str(" NOT NULL");
    }
    for check in checks {
        sql.push(' ');
        sql.push_str(&check_sql(check));
    }
    sql
}

/// Park dependent columns on the old base type, swap the domain, then move
/// them back and restore their defaults.
fn recreate_domain(
    schema: &str,
    name: &str,
    old_base: &Column,
    base: &Column,
    checks: &[CheckConstraint],
    dependents: &[DependentColumn],
) -> Vec<String> {
    let ty = Qualified(Some(schema), name).to_string();
    let parked = column_type(old_base);
    let mut stmts = Vec::new();
    for dep in dependents {
        let table = Qualified(Some(&dep.schema), &dep.table);
        let column = Ident(&dep.column);
        let dims = "[]".repeat(dep.array_dims as usize);
        if dep.default.is_some() {
            stmts.push(format!("ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT"));
        }
        stmts.push(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {parked}{dims} USING {column}::{parked}{dims}"
        ));
    }
    stmts.push(format!("DROP DOMAIN {ty}"));
    stmts.push(create_domain_sql(schema, name, base, checks));
    for dep in dependents {
        let table = Qualified(Some(&dep.schema), &dep.table);
        let column = Ident(&dep.column);
        let dims = "[]".repeat(dep.array_dims as usize);
        stmts.push(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {ty}{dims} USING {column}::{ty}{dims}"
        ));
        if let Some(default) = &dep.default {
            stmts.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default}"
            ));
        }
    }
    stmts
}

fn recreate_enum(
    schema: &str,
    name: &str,
    values: &[String],
    dependents: &[DependentColumn],
) -> Vec<String> {
    let old = format!("{name}_old");
    let ty = Qualified(Some(schema), name).to_string();
    let mut stmts = vec![
        format!("ALTER TYPE {ty} RENAME TO {}", Ident(&old)),
        create_enum_sql(schema, name, values),
    ];
    for dep in dependents {
        let table = Qualified(Some(&dep.schema), &dep.table);
        let column = Ident(&dep.column);
        let dims = "[]".repeat(dep.array_dims as usize);
        if dep.default.is_some() {
            stmts.push(format!("ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT"));
        }
        stmts.push(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {ty}{dims} USING {column}::text{dims}::{ty}{dims}"
        ));
        if let Some(default) = &dep.default {
            stmts.push(format!(
                "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default}"
            ));
        }
    }
    stmts.push(format!("DROP TYPE {}", Qualified(Some(schema), &old)));
    stmts
}

fn create_table(t: &CreateTable) -> Vec<String> {
    let qualified = Qualified(Some(&t.schema), &t.name).to_string();

    let mut lines: Vec<String> = t.columns.iter().map(column_definition).collect();
    lines.extend(t.primary_key.iter().map(primary_key_sql));
    lines.extend(t.foreign_keys.iter().map(foreign_key_sql));
    lines.extend(t.checks.iter().map(check_sql));
    lines.extend(t.excludes.iter().map(exclude_sql));

    let mut stmts = vec![format!(
        "CREATE TABLE {qualified} (\n    {}\n)",
        lines.join(",\n    ")
    )];
    stmts.extend(
        t.indexes
            .iter()
            .map(|idx| create_index_sql(&t.schema, &t.name, idx)),
    );
    if let Some(comment) = &t.comment {
        stmts.push(format!("COMMENT ON TABLE {qualified} IS {}", Lit(comment)));
    }
    for col in &t.columns {
        if let Some(comment) = &col.comment {
            stmts.push(format!(
                "COMMENT ON COLUMN {qualified}.{} IS {}",
                Ident(&col.name),
                Lit(comment)
            ));
        }
    }
    stmts
}

fn comment_value(comment: &Option<String>) -> String {
    match comment {
        Some(c) => Lit(c).to_string(),
        None => "NULL".to_string(),
    }
}

fn type_differs(from: &Column, to: &Column) -> bool {
    from.ty != to.ty
        || from.max_chars != to.max_chars
        || from.precision != to.precision
        || from.scale != to.scale
        || from.datetime_precision != to.datetime_precision
        || from.collate != to.collate
}

fn change_column(table: &str, from: &Column, to: &Column, using: Option<&str>) -> Vec<String> {
    let alter = format!("ALTER TABLE {table} ALTER COLUMN {}", Ident(&to.name));
    let mut stmts = Vec::new();

    let retype = type_differs(from, to) || using.is_some();
    let mut default_dropped = false;
    if retype {
        if from.default.is_some() {
            stmts.push(format!("{alter} DROP DEFAULT"));
            default_dropped = true;
        }
        let mut sql = format!("{alter} TYPE {}", column_type(to));
        if let Some(collate) = &to.collate {
            sql.push_str(&format!(" COLLATE {}", Ident(collate)));
        }
        if let Some(using) = using {
            sql.push_str(&format!(" USING {using}"));
        }
        stmts.push(sql);
    }

    let from_identity = from.identity.as_ref().map(|i| i.resolve(&from.ty));
    let to_identity = to.identity.as_ref().map(|i| i.resolve(&to.ty));
    match (from_identity, to_identity) {
        (Some(_), None) => stmts.push(format!("{alter} DROP IDENTITY")),
        (None, Some(identity)) => {
            stmts.push(format!("{alter} ADD {}", identity_sql(&identity)));
        }
        (Some(a), Some(b)) if a != b => {
            let generated = if b.always { "ALWAYS" } else { "BY DEFAULT" };
            stmts.push(format!(
                "{alter} SET GENERATED {generated} SET START WITH {} SET INCREMENT BY {} SET MINVALUE {} SET MAXVALUE {} SET CACHE {} SET {}",
                b.start,
                b.increment,
                b.min,
                b.max,
                b.cache,
                if b.cycle { "CYCLE" } else { "NO CYCLE" }
            ));
        }
        _ => {}
    }

    if from.nullable != to.nullable {
        let action = if to.nullable { "DROP" } else { "SET" };
        stmts.push(format!("{alter} {action} NOT NULL"));
    }

    if from.default != to.default || default_dropped {
        match &to.default {
            Some(default) => stmts.push(format!("{alter} SET DEFAULT {default}")),
            None if !default_dropped => stmts.push(format!("{alter} DROP DEFAULT")),
            None => {}
        }
    }

    if from.comment != to.comment {
        stmts.push(format!(
            "COMMENT ON COLUMN {table}.{} IS {}",
            Ident(&to.name),
            comment_value(&to.comment)
        ));
    }
    stmts
}

fn change_table(change: &TableChange) -> Vec<String> {
    let table = Qualified(Some(&change.schema), &change.name).to_string();
    let alter = format!("ALTER TABLE {table}");
    let mut stmts = Vec::new();

    for name in change.drop_constraints.iter().chain(&change.drop_excludes) {
        stmts.push(format!("{alter} DROP CONSTRAINT {}", Ident(name)));
    }
    for name in &change.drop_indexes {
        stmts.push(format!(
            "DROP INDEX {}",
            Qualified(Some(&change.schema), name)
        ));
    }
    if let Some(name) = &change.drop_primary_key {
        stmts.push(format!("{alter} DROP CONSTRAINT {}", Ident(name)));
    }

    for column in &change.columns {
        match column {
            ColumnChange::Rename { from, to } => stmts.push(format!(
                "{alter} RENAME COLUMN {} TO {}",
                Ident(from),
                Ident(to)
            )),
            ColumnChange::Drop(name) => {
                stmts.push(format!("{alter} DROP COLUMN {}", Ident(name)));
            }
            ColumnChange::Add(col) => {
                stmts.push(format!("{alter} ADD COLUMN {}", column_definition(col)));
                if let Some(comment) = &col.comment {
                    stmts.push(format!(
                        "COMMENT ON COLUMN {table}.{} IS {}",
                        Ident(&col.name),
                        Lit(comment)
                    ));
                }
            }
            ColumnChange::Change { from, to, using } => {
                stmts.extend(change_column(&table, from, to, using.as_deref()));
            }
            ColumnChange::Recreate { from, to } => {
                stmts.push(format!("{alter} DROP COLUMN {}", Ident(&from.name)));
                stmts.push(format!("{alter} ADD COLUMN {}", column_definition(to)));
                if let Some(comment) = &to.comment {
                    stmts.push(format!(
                        "COMMENT ON COLUMN {table}.{} IS {}",
                        Ident(&to.name),
                        Lit(comment)
                    ));
                }
            }
        }
    }

    if let Some(pk) = &change.add_primary_key {
        stmts.push(format!("{alter} ADD {}", primary_key_sql(pk)));
    }
    for idx in &change.add_indexes {
        stmts.push(create_index_sql(&change.schema, &change.name, idx));
    }
    for idx in &change.add_excludes {
        stmts.push(format!("{alter} ADD {}", exclude_sql(idx)));
    }
    for constraint in &change.add_constraints {
        let clause = match constraint {
            TableConstraint::ForeignKey(fk) => foreign_key_sql(fk),
            TableConstraint::Check(check) => check_sql(check),
        };
        stmts.push(format!("{alter} ADD {clause}"));
    }
    if let Some(comment) = &change.comment {
        stmts.push(format!(
            "COMMENT ON TABLE {table} IS {}",
            comment_value(comment)
        ));
    }
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::EnumValue;
    use drift_schema::{Identity, TypeRef};

    fn users_table() -> CreateTable {
        CreateTable {
            schema: "public".to_string(),
            name: "user".to_string(),
            comment: Some("people".to_string()),
            columns: vec![
                Column::new("id", "int8").identity(Identity {
                    always: true,
                    ..Identity::default()
                }),
                Column::new("email", "varchar").max_chars(255),
                Column::new("tags", TypeRef::builtin("text").array())
                    .nullable()
                    .default_sql("'{}'"),
            ],
            primary_key: Some(PrimaryKey {
                name: Some("user_pkey".to_string()),
                columns: vec!["id".to_string()],
            }),
            indexes: vec![
                Index::on([IndexColumn::new("email")])
                    .unique()
                    .named("uq_user_email"),
            ],
            excludes: vec![],
            foreign_keys: vec![],
            checks: vec![CheckConstraint::new("length(email) > 3").named("ck_user_email")],
        }
    }

    #[test]
    fn test_create_table() {
        let sql = render_script(&ChangeScript {
            ops: vec![Op::CreateTable(users_table())],
        });
        insta::assert_snapshot!(sql.trim_end(), @r#"
        CREATE TABLE "public"."user" (
            "id" int8 GENERATED ALWAYS AS IDENTITY (START WITH 1 INCREMENT BY 1 MINVALUE 1 MAXVALUE 9223372036854775807 CACHE 1) NOT NULL,
            "email" varchar(255) NOT NULL,
            "tags" text[] DEFAULT '{}',
            CONSTRAINT "user_pkey" PRIMARY KEY ("id"),
            CONSTRAINT "ck_user_email" CHECK (length(email) > 3)
        );
        CREATE UNIQUE INDEX "uq_user_email" ON "public"."user" USING btree ("email");
        COMMENT ON TABLE "public"."user" IS 'people';
        "#);
    }

    #[test]
    fn test_change_table() {
        let mut change = TableChange::new("public", "post");
        change.columns.push(ColumnChange::Rename {
            from: "body".to_string(),
            to: "content".to_string(),
        });
        change.columns.push(ColumnChange::Change {
            from: Column::new("status", "text").default_sql("'draft'"),
            to: Column::new("status", TypeRef::user(Some("public"), "post_status"))
                .default_sql("'draft'::post_status"),
            using: Some("\"status\"::text::\"public\".\"post_status\"".to_string()),
        });
        change.drop_indexes.push("idx_post_body".to_string());
        change.add_constraints.push(TableConstraint::ForeignKey(
            ForeignKey::new(["author_id"], "user", ["id"])
                .named("post_author_id_fkey")
                .on_delete(FkAction::Cascade),
        ));

        let sql = render_op(&Op::ChangeTable(change)).join(";\n");
        insta::assert_snapshot!(sql, @r#"
        DROP INDEX "public"."idx_post_body";
        ALTER TABLE "public"."post" RENAME COLUMN "body" TO "content";
        ALTER TABLE "public"."post" ALTER COLUMN "status" DROP DEFAULT;
        ALTER TABLE "public"."post" ALTER COLUMN "status" TYPE "public"."post_status" USING "status"::text::"public"."post_status";
        ALTER TABLE "public"."post" ALTER COLUMN "status" SET DEFAULT 'draft'::post_status;
        ALTER TABLE "public"."post" ADD CONSTRAINT "post_author_id_fkey" FOREIGN KEY ("author_id") REFERENCES "user" ("id") ON DELETE CASCADE
        "#);
    }

    #[test]
    fn test_enum_ops() {
        let add = Op::AddEnumValues {
            schema: "public".to_string(),
            name: "mood".to_string(),
            values: vec![
                EnumValue {
                    value: "meh".to_string(),
                    placement: Placement::After("sad".to_string()),
                },
                EnumValue {
                    value: "ecstatic".to_string(),
                    placement: Placement::Before("happy".to_string()),
                },
            ],
        };
        let replace = Op::ReplaceEnumValues {
            schema: "public".to_string(),
            name: "mood".to_string(),
            values: vec!["sad".to_string(), "calm".to_string()],
            dependents: vec![DependentColumn {
                schema: "public".to_string(),
                table: "person".to_string(),
                column: "moods".to_string(),
                array_dims: 1,
                default: None,
            }],
        };

        let sql = [render_op(&add), render_op(&replace)].concat().join(";\n");
        insta::assert_snapshot!(sql, @r#"
        ALTER TYPE "public"."mood" ADD VALUE 'meh' AFTER 'sad';
        ALTER TYPE "public"."mood" ADD VALUE 'ecstatic' BEFORE 'happy';
        ALTER TYPE "public"."mood" RENAME TO "mood_old";
        CREATE TYPE "public"."mood" AS ENUM ('sad', 'calm');
        ALTER TABLE "public"."person" ALTER COLUMN "moods" TYPE "public"."mood"[] USING "moods"::text[]::"public"."mood"[];
        DROP TYPE "public"."mood_old"
        "#);
    }

    #[test]
    fn test_rename_type_across_schemas() {
        let op = Op::RenameType {
            kind: TypeKind::Table,
            from_schema: "public".to_string(),
            from: "posts".to_string(),
            to_schema: "blog".to_string(),
            to: "post".to_string(),
        };
        assert_eq!(
            render_op(&op),
            vec![
                "ALTER TABLE \"public\".\"posts\" SET SCHEMA \"blog\"",
                "ALTER TABLE \"blog\".\"posts\" RENAME TO \"post\"",
            ]
        );
    }

    #[test]
    fn test_exclusion_and_tsvector() {
        let mut excl = Index::on([
            IndexColumn::excluding("room_id", "="),
            IndexColumn::excluding("during", "&&"),
        ])
        .named("excl_booking_room_id_during");
        excl.where_clause = Some("NOT cancelled".to_string());
        assert_eq!(
            exclude_sql(&excl),
            "CONSTRAINT \"excl_booking_room_id_during\" EXCLUDE USING gist (\"room_id\" WITH =, \"during\" WITH &&) WHERE (NOT cancelled)"
        );

        let mut search = Index::on([IndexColumn::new("title"), IndexColumn::new("body")])
            .named("idx_post_search");
        search.tsvector = true;
        search.language = Some("simple".to_string());
        assert_eq!(
            create_index_sql("public", "post", &search),
            "CREATE INDEX \"idx_post_search\" ON \"public\".\"post\" USING gin ((to_tsvector('simple'::regconfig, coalesce(\"title\", '') || ' ' || coalesce(\"body\", ''))))"
        );
    }
}
