use std::error::Error;

use clap::{Args, Parser, Subcommand};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use ledger_core::{CreateAccountCmd, Currency, Ledger, Money};

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub is_admin: bool,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

#[derive(Parser, Debug)]
#[command(name = "saldo_admin")]
#[command(about = "Admin utilities for the ledger (bootstrap users/accounts, repair balances)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./saldo.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Account(Account),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    /// Grant the administrator flag (read and rebuild access everywhere).
    #[arg(long)]
    admin: bool,
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Create(AccountCreateArgs),
    RebuildBalance(RebuildBalanceArgs),
}

#[derive(Args, Debug)]
struct AccountCreateArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "EUR")]
    currency: String,
    /// Opening balance, e.g. "100.00" or "-12,50".
    #[arg(long, default_value = "0")]
    opening_balance: String,
}

#[derive(Args, Debug)]
struct RebuildBalanceArgs {
    #[arg(long)]
    account_id: Uuid,
    /// Actor to run the rebuild as (owner of the account or an admin).
    #[arg(long)]
    user: String,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "saldo_admin=info,ledger_core=info".to_string()),
        )
        .init();

    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            if users::Entity::find_by_id(args.username.clone())
                .one(&db)
                .await?
                .is_some()
            {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                is_admin: Set(args.admin),
            };
            users::Entity::insert(user).exec(&db).await?;

            println!("created user: {}", args.username);
        }
        Command::Account(Account {
            command: AccountCommand::Create(args),
        }) => {
            let currency = match Currency::try_from(args.currency.as_str()) {
                Ok(v) => v,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };
            let opening_balance: Money = match args.opening_balance.parse() {
                Ok(v) => v,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };

            let ledger = Ledger::builder().database(db.clone()).build()?;
            let account_id = ledger
                .create_account(
                    CreateAccountCmd::new(&args.name, &args.owner, currency)
                        .opening_balance(opening_balance),
                )
                .await?;
            println!("created account: {} ({account_id})", args.name);
        }
        Command::Account(Account {
            command: AccountCommand::RebuildBalance(args),
        }) => {
            let ledger = Ledger::builder().database(db.clone()).build()?;
            let balance = ledger.rebuild_balance(args.account_id, &args.user).await?;
            println!("rebuilt balance for {}: {balance}", args.account_id);
        }
    }

    Ok(())
}
