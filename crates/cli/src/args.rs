//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Multi-tenant catalog administration: businesses, collections, items, users
#[derive(Parser, Debug)]
#[command(name = "shelfwise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true, env = "SHELFWISE_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Database url (overrides `database.url`)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Act as this user: listings are limited to what its role and
    /// memberships allow, business updates require membership
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    pub acting_user: Option<i64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create missing tables
    Migrate,

    /// Manage businesses and memberships
    Business {
        #[command(subcommand)]
        command: BusinessCommands,
    },

    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },

    /// Manage items
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum BusinessCommands {
    /// Create a business
    Create {
        name: String,
        #[arg(long)]
        logo: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Register the business for this user (creates the membership too)
        #[arg(long, value_name = "USER_ID")]
        owner: Option<i64>,
    },
    /// Show a business with its member count
    Show { id: i64 },
    /// Update a business
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_logo")]
        logo: Option<String>,
        #[arg(long)]
        clear_logo: bool,
        #[arg(long, conflicts_with = "clear_address")]
        address: Option<String>,
        #[arg(long)]
        clear_address: bool,
    },
    /// Delete a business with its collections, items and memberships
    Delete { id: i64 },
    /// List visible businesses
    List,
    /// Add a user to a business
    Join { user_id: i64, business_id: i64 },
    /// Remove a user from a business
    Leave { user_id: i64, business_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum CollectionCommands {
    /// Create a collection
    Create {
        business_id: i64,
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Parent collection id, or a predefined category key (e.g. `shoes`)
        #[arg(long, value_name = "ID|KEY")]
        parent: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Show a collection with its business and parent
    Show { id: i64 },
    /// Update a collection
    Update {
        id: i64,
        #[arg(long, value_name = "BUSINESS_ID")]
        business: Option<i64>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long, value_name = "ID", conflicts_with = "clear_parent")]
        parent: Option<i64>,
        #[arg(long)]
        clear_parent: bool,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete a collection and its items
    Delete { id: i64 },
    /// List visible collections
    List {
        /// Print as a parent/child tree
        #[arg(long)]
        tree: bool,
    },
    /// Active collections of one business
    Active { business_id: i64 },
    /// Predefined parent categories
    Parents,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    /// Create an item
    Create {
        business_id: i64,
        collection_id: i64,
        title: String,
        #[arg(long)]
        introduction: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Stored image path
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    /// Show an item with its business and collection names
    Show { id: i64 },
    /// Update an item
    Update {
        id: i64,
        #[arg(long, value_name = "BUSINESS_ID")]
        business: Option<i64>,
        #[arg(long, value_name = "COLLECTION_ID")]
        collection: Option<i64>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_introduction")]
        introduction: Option<String>,
        #[arg(long)]
        clear_introduction: bool,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long, conflicts_with = "clear_image")]
        image: Option<String>,
        #[arg(long)]
        clear_image: bool,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete an item (prints it, including its image path)
    Delete { id: i64 },
    /// List visible items
    List,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a user
    Create {
        name: String,
        email: String,
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Show a user with its memberships
    Show { id: i64 },
    /// List users
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_collection_create_with_predefined_parent() {
        let cli = Cli::try_parse_from([
            "shelfwise", "--as", "3", "collection", "create", "1", "Boots", "--parent", "shoes",
        ])
        .unwrap();
        assert_eq!(cli.acting_user, Some(3));
        match cli.command {
            Commands::Collection {
                command: CollectionCommands::Create { parent, name, .. },
            } => {
                assert_eq!(parent.as_deref(), Some("shoes"));
                assert_eq!(name, "Boots");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn conflicting_parent_flags_are_rejected() {
        let err = Cli::try_parse_from([
            "shelfwise", "collection", "update", "4", "--parent", "2", "--clear-parent",
        ]);
        assert!(err.is_err());
    }
}
