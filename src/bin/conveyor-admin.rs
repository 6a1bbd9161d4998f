// src/bin/conveyor-admin.rs

//! Operator CLI: user provisioning and queue inspection, grounded on
//! the teacher's `clap::Parser`/`Subcommand` CLI shape (`cli::Cli`) but
//! scoped to conveyor's own handful of admin tasks.

use clap::{Parser, Subcommand};
use conveyor::auth::hash_password;
use conveyor::catalog::users;
use conveyor::config::Config;
use conveyor::db::Store;
use conveyor::domain::{NewUser, Role};
use conveyor::telemetry;

#[derive(Parser)]
#[command(name = "conveyor-admin")]
#[command(about = "Operator commands for the conveyor data-delivery pipeline")]
struct Cli {
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a user account.
    CreateUser {
        username: String,
        display_name: String,
        email: String,
        #[arg(value_enum)]
        role: RoleArg,
        /// Read from stdin if omitted (avoids the password landing in shell history).
        #[arg(long)]
        password: Option<String>,
    },
    /// List every user account.
    ListUsers,
}

#[derive(Clone, clap::ValueEnum)]
enum RoleArg {
    Artist,
    TeamLead,
    Supervisor,
    LineProducer,
    DataTeam,
    ItTeam,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(r: RoleArg) -> Self {
        match r {
            RoleArg::Artist => Role::Artist,
            RoleArg::TeamLead => Role::TeamLead,
            RoleArg::Supervisor => Role::Supervisor,
            RoleArg::LineProducer => Role::LineProducer,
            RoleArg::DataTeam => Role::DataTeam,
            RoleArg::ItTeam => Role::ItTeam,
            RoleArg::Admin => Role::Admin,
        }
    }
}

fn main() -> anyhow::Result<()> {
    telemetry::init();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let store = Store::open(&config.db_path)?;
    let conn = store.connection()?;

    match cli.command {
        Command::CreateUser { username, display_name, email, role, password } => {
            let password = match password {
                Some(p) => p,
                None => rpassword_prompt()?,
            };
            let hash = hash_password(&password)?;
            let new = NewUser { username, display_name, email, role: role.into() };
            let id = users::insert(&conn, &new, &hash)?;
            println!("created user {id}");
        }
        Command::ListUsers => {
            for user in users::list_all(&conn)? {
                println!("{}\t{}\t{}\t{}", user.id, user.username, user.role.as_str(), user.email);
            }
        }
    }

    Ok(())
}

fn rpassword_prompt() -> anyhow::Result<String> {
    use std::io::Write;
    print!("password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end().to_string())
}
