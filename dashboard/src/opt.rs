use clap::{Parser, Subcommand};
use clio::Input;

#[derive(Debug, Parser)]
#[command(name = "dashboard", about = "Account and security analytics dashboard client")]
pub struct Opt {
    /// Config file path
    #[arg(short, long, value_parser, default_value = "config.toml")]
    pub config: Input,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authenticates and stores the session
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Creates a new account, without logging in
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Drops the stored session
    Logout,
    /// Shows where every route would lead with the stored session
    Status,
    /// Shows the logged in user profile
    Profile,
    /// Changes the logged in user password
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    /// Lists all accounts (admin only)
    Users,
    /// Creates another admin account (admin only)
    CreateAdmin {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Opens the admin area and follows the security analytics until interrupted
    Watch,
}
