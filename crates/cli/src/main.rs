use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use edr_core::{
    BackupSelection, Document, Repository, RepositoryConfig, Role, RolesEncoding, User,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "edr")]
#[command(about = "Electronic document repository CLI")]
struct Cli {
    /// Repository root directory
    #[arg(long, default_value = "repositories/main")]
    repo: PathBuf,

    /// Repository name
    #[arg(long, default_value = "main")]
    name: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialise a repository (or open an existing one)
    Init {
        /// Roles file encoding: txt, json or xml
        #[arg(long, default_value = "txt")]
        roles: String,
    },
    /// Add a user
    AddUser {
        first_name: String,
        family_name: String,
        /// Birth date (YYYY-MM-DD)
        birth: String,
        email: String,
        password: String,
    },
    /// List all users
    ListUsers,
    /// Assign a role to a user
    AddRole {
        user_id: u64,
        /// admin, manager, author, reviewer or visitor
        role: String,
    },
    /// Add a document from staged files
    AddDocument {
        title: String,
        description: String,
        /// Author user ids (comma-separated)
        authors: String,
        /// Staged file paths (comma-separated); moved into the repository
        files: String,
        /// Short format tag, e.g. txt or pdf
        doc_format: String,
    },
    /// List all documents
    ListDocuments,
    /// Export accepted public documents to a directory
    Export {
        /// Document ids (comma-separated)
        ids: String,
        destination: PathBuf,
    },
    /// Import document directories from another location
    Import { source: PathBuf },
    /// Create a zip backup
    Backup {
        name: String,
        destination: PathBuf,
        /// Subdirectories to leave out (comma-separated logical names)
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Restore from a zip backup (replaces the live repository)
    Restore {
        name: String,
        source: PathBuf,
        /// Subdirectories to leave out (comma-separated logical names)
        #[arg(long)]
        exclude: Option<String>,
    },
    /// Report whether a backup is due
    BackupNeeded,
}

fn parse_ids(raw: &str) -> Result<Vec<u64>, Box<dyn std::error::Error>> {
    raw.split(',')
        .map(|part| part.trim().parse::<u64>().map_err(Into::into))
        .collect()
}

fn parse_selection(exclude: Option<&str>) -> BackupSelection {
    let mut selection = BackupSelection::all();
    let Some(exclude) = exclude else {
        return selection;
    };
    for name in exclude.split(',') {
        match name.trim() {
            "documents" => selection.documents = false,
            "users" => selection.users = false,
            "projects" => selection.projects = false,
            "reports" => selection.reports = false,
            "logs" => selection.logs = false,
            other => eprintln!("Unknown subdirectory {other:?} ignored"),
        }
    }
    selection
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'edr --help' for commands");
        return Ok(());
    };

    if let Commands::Init { roles } = &command {
        let encoding = match roles.as_str() {
            "txt" => RolesEncoding::Txt,
            "json" => RolesEncoding::Json,
            "xml" => RolesEncoding::Xml,
            other => {
                eprintln!("Unknown roles encoding {other:?}, expected txt, json or xml");
                return Ok(());
            }
        };
        let config = RepositoryConfig::new(&cli.name, &cli.repo).with_roles_encoding(encoding);
        let repository = Repository::open(config)?;
        println!(
            "Repository {:?} ready at {}",
            repository.name(),
            repository.location().display()
        );
        return Ok(());
    }

    let repository = Repository::open(RepositoryConfig::new(&cli.name, &cli.repo))?;

    match command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::AddUser {
            first_name,
            family_name,
            birth,
            email,
            password,
        } => {
            let birth = NaiveDate::parse_from_str(&birth, "%Y-%m-%d")?;
            let user = User::new(first_name, family_name, birth, email, password)?;
            let id = repository.users()?.add(&user)?;
            println!("Added user {id}: {user}");
        }
        Commands::ListUsers => {
            let users = repository.users()?;
            let ids = users.list_ids()?;
            if ids.is_empty() {
                println!("No users found.");
            } else {
                for id in ids {
                    println!("ID: {}, {}", id, users.find_by_id(id)?);
                }
            }
        }
        Commands::AddRole { user_id, role } => {
            let role: Role = role.parse()?;
            repository.users()?.add_role(user_id, role)?;
            println!("Assigned role {role} to user {user_id}");
        }
        Commands::AddDocument {
            title,
            description,
            authors,
            files,
            doc_format,
        } => {
            let authors = parse_ids(&authors)?;
            let files: Vec<String> = files
                .split(',')
                .map(|file| file.trim().to_string())
                .collect();
            let document = Document::new(title, description, authors, files, doc_format);
            let id = repository.documents()?.add(&document)?;
            println!("Added document {id}");
        }
        Commands::ListDocuments => {
            let documents = repository.documents()?;
            let all = documents.load_all()?;
            if all.is_empty() {
                println!("No documents found.");
            } else {
                for (id, document) in all {
                    println!(
                        "ID: {}, Title: {}, State: {}, Public: {}",
                        id,
                        document.title(),
                        document.state(),
                        document.is_public()
                    );
                }
            }
        }
        Commands::Export { ids, destination } => {
            let ids = parse_ids(&ids)?;
            repository.export_documents(&ids, &destination)?;
            println!("Exported {} document(s) to {}", ids.len(), destination.display());
        }
        Commands::Import { source } => {
            let imported = repository.import_documents(&source)?;
            println!("Imported {} document(s)", imported.len());
        }
        Commands::Backup {
            name,
            destination,
            exclude,
        } => {
            let selection = parse_selection(exclude.as_deref());
            let archive = repository.create_backup(&name, &destination, &selection)?;
            println!("Created backup {}", archive.display());
        }
        Commands::Restore {
            name,
            source,
            exclude,
        } => {
            let selection = parse_selection(exclude.as_deref());
            let skipped = repository.restore(&name, &source, &selection)?;
            if skipped.is_empty() {
                println!("Restored repository from {name:?}");
            } else {
                println!(
                    "Restored repository from {name:?}, skipped: {}",
                    skipped.join(", ")
                );
            }
        }
        Commands::BackupNeeded => {
            if repository.is_backup_needed()? {
                println!("A backup is due.");
            } else {
                println!("No backup needed yet.");
            }
        }
    }

    Ok(())
}
