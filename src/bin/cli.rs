use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use projex::authz::{Action, ActionSet, PermissionMatrix, ResourceKind};
use projex::docs::build_openapi;
use projex::jwt::JwtConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "projex administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the role/resource permission matrix
    Permissions,
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Issue a bearer token for a user id (development only)
    MintToken { user_id: Uuid },
    /// Write the OpenAPI document to a file, or stdout
    Openapi {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Permissions => {
            print!("{}", render_matrix(&PermissionMatrix::standard()));
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MintToken { user_id } => {
            let jwt = JwtConfig::from_env()?;
            println!("{}", jwt.encode(user_id)?);
        }
        Commands::Openapi { out } => {
            let port = std::env::var("APP_PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(8000);
            let doc = serde_json::to_string_pretty(&build_openapi(port)?)?;
            match out {
                Some(path) => {
                    fs::write(&path, doc).with_context(|| format!("failed to write {}", path.display()))?;
                    println!("wrote {}", path.display());
                }
                None => println!("{doc}"),
            }
        }
    }

    Ok(())
}

/// One row per role, one column per resource kind; cells read like `RCU-`.
fn render_matrix(matrix: &PermissionMatrix) -> String {
    let mut out = format!("{:<16}", "role");
    for kind in ResourceKind::ALL {
        out.push_str(&format!(" {:<14}", kind.as_str()));
    }

    let mut current = None;
    for (role, _, actions) in matrix.rows() {
        if current != Some(role) {
            out.push('\n');
            out.push_str(&format!("{:<16}", role.as_str()));
            current = Some(role);
        }
        out.push_str(&format!(" {:<14}", cell(actions)));
    }
    out.push('\n');
    out
}

fn cell(actions: ActionSet) -> String {
    Action::ALL
        .into_iter()
        .map(|action| {
            if actions.contains(action) {
                match action {
                    Action::Read => 'R',
                    Action::Create => 'C',
                    Action::Update => 'U',
                    Action::Delete => 'D',
                }
            } else {
                '-'
            }
        })
        .collect()
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate's own folder
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
