use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use yatube_backend::config::Config;
use yatube_backend::helper::form_helpers::{is_valid_slug, validate_signup};
use yatube_backend::models::db_operations::{groups_db_operations, users_db_operations};
use yatube_backend::setup::db_setup;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum GroupAction {
    Create {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List,
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_database(&config),
        Commands::User { action } => match action {
            UserAction::Create { username, password } => create_user(&config, username, password),
            UserAction::List => list_users(&config),
            UserAction::ChangePassword { username, new_password } => {
                change_password(&config, username, new_password)
            }
        },
        Commands::Group { action } => match action {
            GroupAction::Create { slug, title, description } => create_group(&config, slug, title, description),
            GroupAction::List => list_groups(&config),
        },
    }
}

fn setup_database(config: &Config) {
    let db_path = config.db_path();
    println!("\nSetting up database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create database file.");
    match db_setup::setup_database(&mut conn) {
        Ok(_) => println!("✅ Database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn open_database(config: &Config) -> Option<Connection> {
    let db_path = config.db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return None;
    }
    match Connection::open(&db_path) {
        Ok(conn) => {
            if let Err(e) = conn.execute_batch("PRAGMA foreign_keys = ON;") {
                eprintln!("❌ Error enabling foreign keys: {}", e);
                return None;
            }
            Some(conn)
        }
        Err(e) => {
            eprintln!("❌ Error opening database: {}", e);
            None
        }
    }
}

fn create_user(config: &Config, username: &str, password: &str) {
    if let Err(errors) = validate_signup(username, password, password) {
        for error in errors {
            eprintln!("❌ {}: {}", error.field, error.message);
        }
        return;
    }
    let Some(conn) = open_database(config) else { return };
    match users_db_operations::create_user(&conn, username, password) {
        Ok(id) => println!("✅ User '{}' created with id {}.", username, id),
        Err(e) => eprintln!("❌ Error creating user: {}. It might be because the username already exists.", e),
    }
}

fn list_users(config: &Config) {
    let Some(conn) = open_database(config) else { return };
    match users_db_operations::read_all_users(&conn) {
        Ok(users) => {
            println!("Listing Users:");
            for user in users {
                println!("- {} (id {}, joined {})", user.username, user.id, user.joined_at.format("%Y-%m-%d"));
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn change_password(config: &Config, username: &str, new_password: &str) {
    let Some(conn) = open_database(config) else { return };
    match users_db_operations::update_password(&conn, username, new_password) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", username),
        Ok(_) => println!("✅ Password for user '{}' changed successfully.", username),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}

fn create_group(config: &Config, slug: &str, title: &str, description: &str) {
    if !is_valid_slug(slug) {
        eprintln!("❌ Error: The slug may only contain letters, numbers, underscores and hyphens.");
        return;
    }
    if title.trim().is_empty() {
        eprintln!("❌ Error: The group title cannot be empty.");
        return;
    }
    let Some(conn) = open_database(config) else { return };
    match groups_db_operations::create_group(&conn, title.trim(), slug, description.trim()) {
        Ok(id) => println!("✅ Group '{}' created at /group/{}/ (id {}).", title.trim(), slug, id),
        Err(e) => eprintln!("❌ Error creating group: {}. The slug might already be taken.", e),
    }
}

fn list_groups(config: &Config) {
    let Some(conn) = open_database(config) else { return };
    match groups_db_operations::read_all_groups(&conn) {
        Ok(groups) => {
            println!("Listing Groups:");
            for group in groups {
                println!("- {} [{}] (id {})", group.title, group.slug, group.id);
            }
        }
        Err(e) => eprintln!("❌ Error fetching groups: {}", e),
    }
}
