use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};

/// Схема БД. Таблицы создаются идемпотентно при каждом старте.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS a001_tenant (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        external_id TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS a002_customer (
        id TEXT PRIMARY KEY NOT NULL,
        tenant_id TEXT NOT NULL,
        nit TEXT NOT NULL,
        name TEXT NOT NULL,
        city TEXT,
        vendor TEXT,
        segment TEXT,
        from_directory INTEGER NOT NULL DEFAULT 0,
        created_at TEXT,
        updated_at TEXT
    );
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_a002_customer_tenant_nit ON a002_customer (tenant_id, nit);",
    r#"
    CREATE TABLE IF NOT EXISTS a003_invoice (
        id TEXT PRIMARY KEY NOT NULL,
        tenant_id TEXT NOT NULL,
        customer_id TEXT NOT NULL,
        invoice_number TEXT NOT NULL,
        issued_at TEXT NOT NULL,
        total REAL NOT NULL DEFAULT 0,
        margin REAL NOT NULL DEFAULT 0,
        units REAL NOT NULL DEFAULT 0,
        sale_sign INTEGER NOT NULL DEFAULT 1,
        signed_total REAL NOT NULL DEFAULT 0,
        signed_margin REAL NOT NULL DEFAULT 0,
        signed_units REAL NOT NULL DEFAULT 0,
        vendor TEXT,
        city TEXT,
        document_type TEXT,
        created_at TEXT,
        updated_at TEXT
    );
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_a003_invoice_natural_key ON a003_invoice (tenant_id, customer_id, invoice_number);",
    "CREATE INDEX IF NOT EXISTS idx_a003_invoice_issued_at ON a003_invoice (tenant_id, issued_at);",
    r#"
    CREATE TABLE IF NOT EXISTS a003_invoice_item (
        id TEXT PRIMARY KEY NOT NULL,
        invoice_id TEXT NOT NULL,
        line_no INTEGER NOT NULL,
        reference TEXT,
        product_name TEXT NOT NULL,
        brand TEXT,
        category TEXT,
        class_code TEXT,
        class_name TEXT,
        quantity REAL NOT NULL DEFAULT 0,
        unit_price REAL NOT NULL DEFAULT 0,
        total REAL NOT NULL DEFAULT 0,
        margin REAL NOT NULL DEFAULT 0
    );
    "#,
    "CREATE INDEX IF NOT EXISTS idx_a003_invoice_item_invoice ON a003_invoice_item (invoice_id);",
    r#"
    CREATE TABLE IF NOT EXISTS a004_payment (
        id TEXT PRIMARY KEY NOT NULL,
        tenant_id TEXT NOT NULL,
        customer_id TEXT NOT NULL,
        invoice_id TEXT,
        paid_at TEXT NOT NULL,
        amount REAL NOT NULL,
        created_at TEXT,
        updated_at TEXT
    );
    "#,
    // NULL invoice_id не участвует в уникальности, поэтому COALESCE
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_a004_payment_dedup ON a004_payment (tenant_id, customer_id, COALESCE(invoice_id, ''), paid_at, amount);",
    r#"
    CREATE TABLE IF NOT EXISTS a005_credit (
        customer_id TEXT PRIMARY KEY NOT NULL,
        tenant_id TEXT NOT NULL,
        balance REAL NOT NULL DEFAULT 0,
        overdue REAL NOT NULL DEFAULT 0,
        dso_days INTEGER NOT NULL DEFAULT 0,
        credit_limit REAL,
        updated_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS p901_inventory_directory (
        tenant_id TEXT NOT NULL,
        reference TEXT NOT NULL,
        brand_code TEXT,
        brand TEXT,
        class_code TEXT,
        class_name TEXT,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (tenant_id, reference)
    );
    "#,
];

/// Открыть файл БД (создаётся при отсутствии) и подготовить схему
pub async fn initialize_database(db_path: Option<&str>) -> anyhow::Result<DatabaseConnection> {
    let db_file = db_path.unwrap_or("target/db/app.db");
    if let Some(parent) = std::path::Path::new(db_file).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let absolute_path = if std::path::Path::new(db_file).is_absolute() {
        std::path::PathBuf::from(db_file)
    } else {
        std::env::current_dir()?.join(db_file)
    };
    // Normalize path separators and ensure proper URL form on Windows
    let normalized = absolute_path.to_string_lossy().replace('\\', "/");
    let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
    let prefix = if needs_leading_slash { "/" } else { "" };
    let db_url = format!("sqlite://{}{}?mode=rwc", prefix, normalized);

    let mut options = ConnectOptions::new(db_url);
    options.sqlx_logging(false);
    let conn = Database::connect(options).await?;
    ensure_schema(&conn).await?;
    tracing::info!("Database ready: {}", absolute_path.display());
    Ok(conn)
}

/// In-memory БД на одном соединении (каждое соединение sqlite::memory: это отдельная БД)
#[cfg(test)]
pub async fn connect_in_memory() -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let conn = Database::connect(options).await?;
    ensure_schema(&conn).await?;
    Ok(conn)
}

pub async fn ensure_schema(conn: &DatabaseConnection) -> anyhow::Result<()> {
    for sql in SCHEMA {
        conn.execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_string()))
            .await?;
    }

    // Базы, созданные до появления флага справочника
    if !has_column(conn, "a002_customer", "from_directory").await? {
        tracing::info!("Adding from_directory column to a002_customer");
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "ALTER TABLE a002_customer ADD COLUMN from_directory INTEGER NOT NULL DEFAULT 0;".to_string(),
        ))
        .await?;
    }
    Ok(())
}

async fn has_column(conn: &DatabaseConnection, table: &str, column: &str) -> anyhow::Result<bool> {
    let pragma = format!("PRAGMA table_info('{}');", table);
    let cols = conn
        .query_all(Statement::from_string(DatabaseBackend::Sqlite, pragma))
        .await?;
    for row in cols {
        let name: String = row.try_get("", "name").unwrap_or_default();
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
