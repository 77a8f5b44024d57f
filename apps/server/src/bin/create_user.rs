//! CLI tool to create a user account directly in the database.
//!
//! Usage:
//!   cargo run --bin create-user -- --username somchai --password <secret> --role ADMIN
//!   cargo run --bin create-user -- --username plaza --password <secret> --role CLIENT --client-id <uuid>
//!
//! Options:
//!   --username       Login name (required, 3-100 characters)
//!   --password       Password (required, at least 8 characters)
//!   --role           ADMIN, TECHNICIAN or CLIENT (default: TECHNICIAN)
//!   --display-name   Name shown in the app (default: the username)
//!   --client-id      Client the account belongs to (required for CLIENT)
//!   --chat-user-id   Messaging recipient id for notifications

use std::env;

use uuid::Uuid;

use acs_lib::auth::password;
use acs_lib::config::Config;
use acs_lib::db::{DbPool, NewUser};
use acs_lib::models::UserRole;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let username = required_arg(&args, "--username");
    let password_raw = required_arg(&args, "--password");
    let display_name = parse_arg(&args, "--display-name").unwrap_or_else(|| username.clone());
    let chat_user_id = parse_arg(&args, "--chat-user-id");

    let role_raw = parse_arg(&args, "--role").unwrap_or_else(|| "TECHNICIAN".to_string());
    let Some(role) = UserRole::parse(&role_raw) else {
        eprintln!("Error: unknown role '{}' (use ADMIN, TECHNICIAN or CLIENT)", role_raw);
        std::process::exit(1);
    };

    let client_id = match (role, parse_arg(&args, "--client-id")) {
        (UserRole::Client, Some(raw)) => match Uuid::parse_str(&raw) {
            Ok(id) => Some(id),
            Err(e) => {
                eprintln!("Error: invalid --client-id: {}", e);
                std::process::exit(1);
            }
        },
        (UserRole::Client, None) => {
            eprintln!("Error: --client-id is required for CLIENT users");
            std::process::exit(1);
        }
        (_, _) => None,
    };

    if username.trim().len() < 3 || username.trim().len() > 100 {
        eprintln!("Error: --username must be 3-100 characters");
        std::process::exit(1);
    }
    if password_raw.len() < 8 {
        eprintln!("Error: --password must be at least 8 characters");
        std::process::exit(1);
    }

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match DbPool::new(&config).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };

    let password_hash = match password::hash_password(&password_raw) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    };

    let new_user = NewUser {
        username: username.trim(),
        display_name: display_name.trim(),
        password_hash,
        role,
        client_id,
        chat_user_id,
    };

    match pool.insert_user(new_user).await {
        Ok(user) => {
            println!();
            println!("User created");
            println!("  ID:       {}", user.id);
            println!("  Username: {}", user.username);
            println!("  Role:     {}", user.role);
            if let Some(client_id) = user.client_id {
                println!("  Client:   {}", client_id);
            }
            println!();
        }
        Err(e) => {
            eprintln!("Error creating user: {}", e);
            std::process::exit(1);
        }
    }
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn required_arg(args: &[String], flag: &str) -> String {
    match parse_arg(args, flag) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} is required", flag);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Create a user account");
    println!();
    println!("Usage:");
    println!("  create-user --username <name> --password <secret> [--role ROLE]");
    println!("              [--display-name NAME] [--client-id UUID] [--chat-user-id ID]");
    println!();
    println!("Roles: ADMIN, TECHNICIAN, CLIENT (CLIENT requires --client-id)");
}
