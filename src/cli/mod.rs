use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use shardmeta::config::{ConfigurationPropertyKey, DataSourceConfiguration, DatabaseConfiguration};
use shardmeta::distsql::{
    CreateShardingBroadcastTableRulesStatement, DropShardingBroadcastTableRulesStatement,
    RuleDefinitionStatement,
};
use shardmeta::instance::{InstanceContext, ModeConfiguration};
use shardmeta::mode::{BootstrapOptions, ContextManager};
use shardmeta::persist::{
    FilePersistRepository, MetadataPersistFacade, MetadataPersistService, MetadataPersistWriter,
};
use shardmeta::rules::{SqlParserRuleConfiguration, TransactionRuleConfiguration};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const CLI_PROXY_IP: &str = "127.0.0.1";
const CLI_PROXY_PORT: u16 = 3307;

#[derive(Parser)]
#[command(name = "shardmeta")]
#[command(about = "Inspect and govern sharding proxy metadata kept in a file repository")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Role {
    Proxy,
    Embedded,
}

#[derive(Subcommand)]
enum Command {
    /// List every configuration property with its type and default.
    Props,
    /// Persist the default global rules into a repository.
    Init {
        #[arg(long)]
        repository: PathBuf,
        /// Replace global rules that are already persisted.
        #[arg(long)]
        force: bool,
    },
    /// Register a logical database and its data sources (`name=url`).
    RegisterDatabase {
        #[arg(long)]
        repository: PathBuf,
        #[arg(long)]
        database: String,
        #[arg(long = "data-source", value_parser = parse_data_source)]
        data_sources: Vec<(String, String)>,
    },
    /// Assemble a snapshot and print its topology summary.
    Assemble {
        #[arg(long)]
        repository: PathBuf,
        #[arg(long, value_enum, default_value_t = Role::Proxy)]
        role: Role,
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    CreateBroadcastTables {
        #[arg(long)]
        repository: PathBuf,
        #[arg(long)]
        database: String,
        #[arg(required = true)]
        tables: Vec<String>,
    },
    DropBroadcastTables {
        #[arg(long)]
        repository: PathBuf,
        #[arg(long)]
        database: String,
    },
}

#[derive(Serialize)]
struct PropertyRow {
    key: &'static str,
    #[serde(rename = "type")]
    property_type: String,
    default: &'static str,
}

fn parse_data_source(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, url) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `name=url`, got `{}`", raw))?;
    if name.trim().is_empty() || url.trim().is_empty() {
        return Err(format!("expected `name=url`, got `{}`", raw));
    }
    Ok((name.trim().to_string(), url.trim().to_string()))
}

fn open_service(repository: &Path) -> Arc<MetadataPersistService> {
    Arc::new(MetadataPersistService::new(Arc::new(FilePersistRepository::new(repository))))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Props => list_props(),
            Command::Init { repository, force } => init(&repository, force).await,
            Command::RegisterDatabase {
                repository,
                database,
                data_sources,
            } => register_database(&repository, &database, data_sources).await,
            Command::Assemble {
                repository,
                role,
                deadline_ms,
            } => assemble(&repository, role, deadline_ms.map(Duration::from_millis)).await,
            Command::CreateBroadcastTables {
                repository,
                database,
                tables,
            } => {
                let statement = CreateShardingBroadcastTableRulesStatement::new(&tables);
                govern(&repository, &database, &statement).await
            }
            Command::DropBroadcastTables {
                repository,
                database,
            } => govern(&repository, &database, &DropShardingBroadcastTableRulesStatement).await,
        }
    }
}

fn list_props() -> Result<()> {
    let rows: Vec<PropertyRow> = ConfigurationPropertyKey::ALL
        .iter()
        .map(|key| PropertyRow {
            key: key.key(),
            property_type: format!("{:?}", key.property_type()).to_lowercase(),
            default: key.default_value(),
        })
        .collect();
    print_json(&rows)
}

async fn init(repository: &Path, force: bool) -> Result<()> {
    let service = open_service(repository);
    let existing = service
        .load_global_rule_configurations()
        .await
        .with_context(|| format!("failed to read {}", repository.display()))?;
    if !existing.is_empty() && !force {
        return Err(anyhow!(
            "{} already holds {} global rule(s); pass --force to replace them",
            repository.display(),
            existing.len()
        ));
    }
    service
        .persist_global_rule_configurations(&[
            Box::new(SqlParserRuleConfiguration::default()),
            Box::new(TransactionRuleConfiguration::default()),
        ])
        .await
        .with_context(|| format!("failed to write {}", repository.display()))?;
    println!("Initialized {}", repository.display());
    Ok(())
}

async fn register_database(
    repository: &Path,
    database: &str,
    data_sources: Vec<(String, String)>,
) -> Result<()> {
    let service = open_service(repository);
    let config = data_sources
        .into_iter()
        .fold(DatabaseConfiguration::new(), |config, (name, url)| {
            config.with_data_source(&name, DataSourceConfiguration::new(&url))
        });
    service
        .persist_data_sources(database, &config.data_sources)
        .await
        .with_context(|| format!("failed to register database '{}'", database))?;
    println!(
        "Registered database '{}' with {} data source(s)",
        database,
        config.data_sources.len()
    );
    Ok(())
}

/// Embedded nodes assemble only what they are handed, so the CLI hands them
/// every database found in the repository.
async fn local_configurations(
    service: &MetadataPersistService,
    role: Role,
) -> Result<BTreeMap<String, DatabaseConfiguration>> {
    let mut configurations = BTreeMap::new();
    if let Role::Embedded = role {
        for name in service.load_all_database_names().await? {
            let data_sources = service.load_data_sources(&name).await?;
            configurations.insert(
                name,
                DatabaseConfiguration {
                    data_sources,
                    rule_configurations: Vec::new(),
                },
            );
        }
    }
    Ok(configurations)
}

fn instance_for(role: Role) -> InstanceContext {
    let mode = ModeConfiguration::standalone("file");
    match role {
        Role::Proxy => InstanceContext::proxy(CLI_PROXY_IP, CLI_PROXY_PORT, mode),
        Role::Embedded => InstanceContext::embedded(env!("CARGO_PKG_VERSION"), mode),
    }
}

async fn bootstrap(repository: &Path, role: Role, deadline: Option<Duration>) -> Result<ContextManager> {
    let service = open_service(repository);
    let local = local_configurations(&service, role).await?;
    let options = BootstrapOptions {
        deadline,
        ..BootstrapOptions::default()
    };
    ContextManager::bootstrap(service, instance_for(role), local, options)
        .await
        .with_context(|| format!("failed to assemble metadata from {}", repository.display()))
}

async fn assemble(repository: &Path, role: Role, deadline: Option<Duration>) -> Result<()> {
    let manager = bootstrap(repository, role, deadline).await?;
    print_json(&manager.snapshot().summary())
}

async fn govern(repository: &Path, database: &str, statement: &dyn RuleDefinitionStatement) -> Result<()> {
    let manager = bootstrap(repository, Role::Proxy, None).await?;
    let outcome = manager
        .execute_rule_definition(database, statement)
        .await
        .with_context(|| format!("`{}` failed on database '{}'", statement.statement_kind(), database))?;
    print_json(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_source() {
        assert_eq!(
            parse_data_source("ds_0=mysql://127.0.0.1:3306/ds_0").unwrap(),
            ("ds_0".to_string(), "mysql://127.0.0.1:3306/ds_0".to_string())
        );
        assert!(parse_data_source("ds_0").is_err());
        assert!(parse_data_source("=mysql://h/db").is_err());
    }

    #[test]
    fn test_cli_parses_governance_commands() {
        let cli = Cli::try_parse_from([
            "shardmeta",
            "create-broadcast-tables",
            "--repository",
            "meta.json",
            "--database",
            "sharding_db",
            "t_dict",
            "t_region",
        ])
        .unwrap();
        match cli.command {
            Command::CreateBroadcastTables { database, tables, .. } => {
                assert_eq!(database, "sharding_db");
                assert_eq!(tables, vec!["t_dict", "t_region"]);
            }
            _ => panic!("unexpected command"),
        }

        assert!(Cli::try_parse_from(["shardmeta", "create-broadcast-tables", "--repository", "m", "--database", "d"]).is_err());
    }

    #[test]
    fn test_assemble_role_defaults_to_proxy() {
        let cli = Cli::try_parse_from(["shardmeta", "assemble", "--repository", "meta.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Assemble {
                role: Role::Proxy,
                deadline_ms: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_init_register_and_assemble_against_file_repository() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");

        init(&path, false).await.unwrap();
        assert!(init(&path, false).await.is_err());
        register_database(
            &path,
            "sharding_db",
            vec![("ds_0".to_string(), "mysql://127.0.0.1:3306/ds_0".to_string())],
        )
        .await
        .unwrap();

        for role in [Role::Proxy, Role::Embedded] {
            let manager = bootstrap(&path, role, Some(Duration::from_secs(5))).await.unwrap();
            let summary = manager.snapshot().summary();
            assert_eq!(summary.databases["sharding_db"].data_sources, vec!["ds_0".to_string()]);
        }
    }
}
