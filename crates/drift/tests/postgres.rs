//! Integration tests against a real PostgreSQL.
//!
//! Run with: cargo test -p drift --features test-postgres --test postgres
//!
//! Note: Requires Docker to be running.

#![cfg(feature = "test-postgres")]

use drift::casts::TypeCastIndex;
use drift::oracle::{Comparison, ComparisonBatch};
use drift::{
    ActualStructure, Answer, Connection, ConnectionExt, DesiredSchema, Disambiguate, Error, Introspect,
    NonInteractive, Op, PgCastCatalog, PgOracle, RunConfig, Scripted, SemanticComparer, Services,
};
use drift_schema::{
    Column, Constraint, DbConstraint, DbDomain, DbEnum, DbTable, Domain, Enum, Index, IndexColumn,
    PrimaryKey, Table, TableIndex, TypeRef,
};
use drift_sql::{ProbeSource, SourceColumn};
use futures::future::BoxFuture;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio_postgres::{Client, NoTls};

/// Start a container and return a connected client.
async fn setup_postgres() -> (ContainerAsync<Postgres>, Client) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let container = Postgres::default()
        .start()
        .await
        .expect("failed to start postgres container");
    let host = container.get_host().await.expect("container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("postgres port not available");

    let conn_str = format!("host={host} port={port} user=postgres password=postgres dbname=postgres");
    let (client, connection) = tokio_postgres::connect(&conn_str, NoTls)
        .await
        .expect("failed to connect to postgres");
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {}", e);
        }
    });

    (container, client)
}

/// Reads just enough of the catalog for these tests: schemas, enums, domains,
/// table columns with their defaults, primary keys and plain indexes.
struct CatalogIntrospector;

impl CatalogIntrospector {
    async fn read(&self, conn: &dyn Connection) -> drift::Result<ActualStructure> {
        let conn = conn.traced();
        let mut actual = ActualStructure::new();

        for row in conn
            .query(
                "SELECT nspname::text FROM pg_namespace \
                 WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema' \
                 ORDER BY nspname",
                &[],
            )
            .await?
        {
            actual.schemas.push(row.get(0));
        }

        for row in conn
            .query(
                "SELECT n.nspname::text, t.typname::text, \
                        array_agg(e.enumlabel::text ORDER BY e.enumsortorder) \
                 FROM pg_enum e \
                 JOIN pg_type t ON t.oid = e.enumtypid \
                 JOIN pg_namespace n ON n.oid = t.typnamespace \
                 GROUP BY 1, 2 ORDER BY 1, 2",
                &[],
            )
            .await?
        {
            let values: Vec<String> = row.get(2);
            actual.enums.push(DbEnum::new(row.get::<_, String>(0), row.get::<_, String>(1), values));
        }

        for row in conn
            .query(
                "SELECT n.nspname::text, t.typname::text, b.typname::text, t.typnotnull, t.typdefault \
                 FROM pg_type t \
                 JOIN pg_namespace n ON n.oid = t.typnamespace \
                 JOIN pg_type b ON b.oid = t.typbasetype \
                 WHERE t.typtype = 'd' AND n.nspname = 'public' \
                 ORDER BY 1, 2",
                &[],
            )
            .await?
        {
            let name: String = row.get(1);
            let mut base = Column::new(name.clone(), TypeRef::from(row.get::<_, String>(2).as_str()));
            base.nullable = !row.get::<_, bool>(3);
            base.default = row.get(4);
            actual.domains.push(DbDomain {
                schema: row.get(0),
                name,
                base,
                checks: Vec::new(),
            });
        }

        for row in conn
            .query(
                "SELECT table_schema::text, table_name::text, column_name::text, \
                        data_type::text, udt_schema::text, udt_name::text, is_nullable::text, \
                        domain_schema::text, domain_name::text, column_default::text \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' \
                 ORDER BY table_schema, table_name, ordinal_position",
                &[],
            )
            .await?
        {
            let (schema, table): (String, String) = (row.get(0), row.get(1));
            let data_type: String = row.get(3);
            let domain: Option<String> = row.get(8);
            let ty = if let Some(domain) = domain {
                TypeRef::user(row.get::<_, Option<String>>(7).as_deref(), domain)
            } else if data_type == "USER-DEFINED" {
                TypeRef::user(Some(row.get::<_, String>(4).as_str()), row.get::<_, String>(5))
            } else {
                TypeRef::from(row.get::<_, String>(5).as_str())
            };
            let mut column = Column::new(row.get::<_, String>(2), ty);
            column.nullable = row.get::<_, String>(6) == "YES";
            column.default = row.get(9);

            match actual
                .tables
                .iter_mut()
                .find(|t| t.schema == schema && t.name == table)
            {
                Some(t) => t.columns.push(column),
                None => actual.tables.push(DbTable::new(schema, table).column(column)),
            }
        }

        for row in conn
            .query(
                "SELECT n.nspname::text, c.relname::text, k.conname::text, \
                        array_agg(a.attname::text ORDER BY u.ord) \
                 FROM pg_constraint k \
                 JOIN pg_class c ON c.oid = k.conrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 CROSS JOIN LATERAL unnest(k.conkey) WITH ORDINALITY AS u(attnum, ord) \
                 JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = u.attnum \
                 WHERE k.contype = 'p' AND n.nspname = 'public' \
                 GROUP BY 1, 2, 3",
                &[],
            )
            .await?
        {
            let columns: Vec<String> = row.get(3);
            actual.constraints.push(DbConstraint {
                schema: row.get(0),
                table: row.get(1),
                name: row.get(2),
                constraint: Constraint::PrimaryKey(PrimaryKey::new(columns)),
            });
        }

        for row in conn
            .query(
                "SELECT n.nspname::text, t.relname::text, i.relname::text, x.indisunique, \
                        ARRAY(SELECT pg_get_indexdef(x.indexrelid, k, true) \
                              FROM generate_series(1, x.indnkeyatts::int) AS k ORDER BY k), \
                        pg_get_expr(x.indpred, x.indrelid, true) \
                 FROM pg_index x \
                 JOIN pg_class i ON i.oid = x.indexrelid \
                 JOIN pg_class t ON t.oid = x.indrelid \
                 JOIN pg_namespace n ON n.oid = t.relnamespace \
                 WHERE n.nspname = 'public' AND NOT x.indisprimary \
                 ORDER BY 1, 2, 3",
                &[],
            )
            .await?
        {
            let keys: Vec<String> = row.get(4);
            let mut index = Index::on(keys.iter().map(|k| IndexColumn::parse(k))).named(row.get::<_, String>(2));
            if row.get::<_, bool>(3) {
                index = index.unique();
            }
            if let Some(predicate) = row.get::<_, Option<String>>(5) {
                index = index.filter(predicate);
            }
            actual.indexes.push(TableIndex {
                schema: row.get(0),
                table: row.get(1),
                index,
            });
        }

        Ok(actual)
    }
}

impl Introspect for CatalogIntrospector {
    fn introspect<'a>(
        &'a self,
        conn: &'a dyn Connection,
        _: &'a RunConfig,
    ) -> BoxFuture<'a, drift::Result<ActualStructure>> {
        Box::pin(self.read(conn))
    }
}

fn journal() -> DesiredSchema {
    DesiredSchema::new()
        .enum_type(Enum::new("mood", ["happy", "sad"]))
        .table(
            Table::new("entry")
                .column(Column::new("id", "int8").primary_key())
                .column(Column::new("title", "text"))
                .column(Column::new("mood", TypeRef::user(None, "mood")).nullable()),
        )
}

async fn compose_live(client: &Client, desired: &DesiredSchema) -> drift::Result<drift::ChangeScript> {
    compose_answering(client, desired, &mut NonInteractive).await
}

async fn compose_answering(
    client: &Client,
    desired: &DesiredSchema,
    chooser: &mut dyn Disambiguate,
) -> drift::Result<drift::ChangeScript> {
    let actual = CatalogIntrospector.read(client).await?;
    let oracle = PgOracle::new(client);
    let casts = PgCastCatalog::new(client);
    let services = Services {
        oracle: &oracle,
        casts: &casts,
        chooser,
    };
    drift::compose(desired, &[actual], &RunConfig::default(), services).await
}

#[tokio::test]
async fn test_oracle_normalizes_through_postgres() {
    let (_container, client) = setup_postgres().await;
    let oracle = PgOracle::new(&client);

    let batch = ComparisonBatch {
        source: ProbeSource {
            alias: "item".to_string(),
            columns: vec![SourceColumn::new("qty", "int4"), SourceColumn::new("label", "text")],
        },
        comparisons: vec![
            Comparison {
                actual: vec!["(qty + 1)".to_string()],
                candidates: vec![vec!["qty - 1".to_string()], vec!["qty+1".to_string()]],
            },
            Comparison {
                actual: vec!["label = 'x'::text".to_string()],
                candidates: vec![vec!["label = 'x'".to_string()]],
            },
            Comparison {
                actual: vec!["qty > 0".to_string()],
                candidates: vec![vec!["qty >= 0".to_string()]],
            },
        ],
    };
    let answers = oracle.compare(&batch).await.unwrap();
    assert_eq!(answers, vec![Some(1), Some(0), None]);
}

#[tokio::test]
async fn test_rejected_comparison_counts_as_different() {
    let (_container, client) = setup_postgres().await;
    let oracle = PgOracle::new(&client);

    let batch = ComparisonBatch {
        source: ProbeSource {
            alias: "item".to_string(),
            columns: vec![SourceColumn::new("qty", "int4")],
        },
        comparisons: vec![Comparison {
            actual: vec!["no_such_column".to_string()],
            candidates: vec![vec!["no_such_column".to_string()]],
        }],
    };
    assert_eq!(oracle.compare(&batch).await.unwrap(), vec![None]);
}

#[tokio::test]
async fn test_cast_index_reads_implicit_casts() {
    let (_container, client) = setup_postgres().await;
    let catalog = PgCastCatalog::new(&client);
    let casts = TypeCastIndex::new(&catalog);

    assert!(casts.can_cast("int4", "int8").await.unwrap());
    assert!(casts.can_cast("int2", "numeric").await.unwrap());
    assert!(!casts.can_cast("int8", "int4").await.unwrap());
    assert!(!casts.can_cast("text", "int4").await.unwrap());
}

#[tokio::test]
async fn test_verify_accepts_a_converging_script() {
    let (_container, client) = setup_postgres().await;
    let desired = journal();

    let script = compose_live(&client, &desired).await.unwrap();
    insta::assert_snapshot!(script.to_string().trim_end(), @r#"
    + enum public.mood (happy, sad)
    + table public.entry
        + id: int8
        + title: text
        + mood: "public"."mood" (nullable)
    "#);

    drift::verify(&client, &desired, &script, &RunConfig::default(), &CatalogIntrospector)
        .await
        .unwrap();

    // Nothing was left behind.
    let after = CatalogIntrospector.read(&client).await.unwrap();
    assert!(after.tables.is_empty());
    assert!(after.enums.is_empty());
}

#[tokio::test]
async fn test_verify_reports_what_is_missing() {
    let (_container, client) = setup_postgres().await;
    let desired = journal();

    let mut script = compose_live(&client, &desired).await.unwrap();
    script.ops.truncate(1);

    let err = drift::verify(&client, &desired, &script, &RunConfig::default(), &CatalogIntrospector)
        .await
        .unwrap_err();
    let Error::Verification { script, residual } = err else {
        panic!("expected a verification failure, got {err}");
    };
    assert!(script.contains("CREATE TYPE"));
    assert_eq!(residual.len(), 1);
    assert_eq!(residual[0].to_string().lines().next(), Some("+ table public.entry"));
}

#[tokio::test]
async fn test_applied_script_converges() {
    let (_container, client) = setup_postgres().await;
    let desired = journal();

    let script = compose_live(&client, &desired).await.unwrap();
    client
        .batch_execute(&drift::render_script(&script))
        .await
        .unwrap();

    let again = compose_live(&client, &desired).await.unwrap();
    assert!(again.is_empty(), "unexpected ops:\n{again}");
}

#[tokio::test]
async fn test_changed_domain_keeps_the_columns_using_it() {
    let (_container, client) = setup_postgres().await;
    client
        .batch_execute(
            "CREATE DOMAIN positive AS int8; \
             CREATE TABLE item (id int8 PRIMARY KEY, qty positive DEFAULT 1);",
        )
        .await
        .unwrap();

    let desired = DesiredSchema::new()
        .domain(Domain::new("positive", Column::new("positive", "int4")))
        .table(
            Table::new("item")
                .column(Column::new("id", "int8").primary_key())
                .column(Column::new("qty", TypeRef::user(None, "positive")).nullable().default_sql("1")),
        );

    let script = compose_live(&client, &desired).await.unwrap();
    insta::assert_snapshot!(script.to_string().trim_end(), @"~ domain public.positive = int4 (1 column(s) carried over)");

    client
        .batch_execute(&drift::render_script(&script))
        .await
        .unwrap();

    let again = compose_live(&client, &desired).await.unwrap();
    assert!(again.is_empty(), "unexpected ops:\n{again}");
}

#[tokio::test]
async fn test_renamed_enum_default_leaves_equal_indexes_alone() {
    let (_container, client) = setup_postgres().await;
    client
        .batch_execute(
            "CREATE TYPE old_mood AS ENUM ('happy', 'sad'); \
             CREATE TABLE entry ( \
                 id int8 PRIMARY KEY, \
                 title text NOT NULL, \
                 mood old_mood NOT NULL DEFAULT 'happy'); \
             CREATE INDEX entry_titled ON entry (title) WHERE title <> '';",
        )
        .await
        .unwrap();

    let desired = DesiredSchema::new()
        .enum_type(Enum::new("mood", ["happy", "sad"]))
        .table(
            Table::new("entry")
                .column(Column::new("id", "int8").primary_key())
                .column(Column::new("title", "text"))
                .column(Column::new("mood", TypeRef::user(None, "mood")).default_sql("'happy'"))
                .index(Index::on([IndexColumn::new("title")]).named("entry_titled").filter("title <> ''")),
        );

    let mut chooser = Scripted::new([Answer::RenameFrom("old_mood".to_string())]);
    let script = compose_answering(&client, &desired, &mut chooser).await.unwrap();
    assert!(chooser.is_exhausted());
    assert!(matches!(script.ops.first(), Some(Op::RenameType { .. })), "{script}");
    assert!(!script.to_string().contains("entry_titled"), "index was rebuilt:\n{script}");

    client
        .batch_execute(&drift::render_script(&script))
        .await
        .unwrap();

    let again = compose_live(&client, &desired).await.unwrap();
    assert!(again.is_empty(), "unexpected ops:\n{again}");
}
