use clap::{Parser, Subcommand};
use shelfmark_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shelfmark")]
#[command(about = "Library catalog and circulation system", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a book to the catalog
    AddBook {
        title: String,
        author: String,
        isbn: String,
        year: i32,

        /// Shelf location - registers a physical copy
        #[arg(long, conflicts_with_all = ["download_link", "file_size_mb"])]
        shelf: Option<String>,

        /// Download link - registers a digital copy
        #[arg(long, requires = "file_size_mb")]
        download_link: Option<String>,

        /// File size in MB for a digital copy
        #[arg(long, requires = "download_link")]
        file_size_mb: Option<f64>,
    },

    /// Remove a book from the catalog by ISBN
    RemoveBook { isbn: String },

    /// Register a member
    Register { member_id: String, name: String },

    /// Check a copy out to a member
    Borrow { member_id: String, isbn: String },

    /// Check a copy back in from a member
    Return { member_id: String, isbn: String },

    /// List available physical copies
    Available,

    /// Show recent loan history
    History {
        /// History window in days (defaults to the configured window)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Archive closed loans to CSV
    Rollup,
}

/// File layout under the data directory
struct Paths {
    library: PathBuf,
    ledger: PathBuf,
    csv: PathBuf,
}

impl Paths {
    fn new(data_dir: &std::path::Path) -> Self {
        Self {
            library: data_dir.join("library.json"),
            ledger: data_dir.join("ledger").join("loans.jsonl"),
            csv: data_dir.join("loans.csv"),
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    shelfmark_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;
    let paths = Paths::new(&data_dir);

    match cli.command {
        Commands::AddBook {
            title,
            author,
            isbn,
            year,
            shelf,
            download_link,
            file_size_mb,
        } => cmd_add_book(
            &paths,
            title,
            author,
            isbn,
            year,
            shelf,
            download_link,
            file_size_mb,
        ),
        Commands::RemoveBook { isbn } => cmd_remove_book(&paths, &isbn),
        Commands::Register { member_id, name } => cmd_register(&paths, member_id, name),
        Commands::Borrow { member_id, isbn } => cmd_borrow(&paths, &member_id, &isbn),
        Commands::Return { member_id, isbn } => cmd_return(&paths, &member_id, &isbn),
        Commands::Available => cmd_available(&paths),
        Commands::History { days } => cmd_history(&paths, days, &config),
        Commands::Rollup => cmd_rollup(&paths),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_add_book(
    paths: &Paths,
    title: String,
    author: String,
    isbn: String,
    year: i32,
    shelf: Option<String>,
    download_link: Option<String>,
    file_size_mb: Option<f64>,
) -> Result<()> {
    let record = BookRecord::new(title, author, isbn.clone(), year);

    let entry = match (shelf, download_link, file_size_mb) {
        (Some(shelf), None, None) => BookEntry::Physical(PhysicalCopy::new(record, shelf)),
        (None, Some(link), Some(size)) => {
            BookEntry::Digital(DigitalCopy::new(record, size, link))
        }
        _ => {
            eprintln!("Specify either --shelf or --download-link with --file-size-mb");
            return Err(Error::Config("invalid add-book arguments".into()));
        }
    };

    Library::update(&paths.library, |library| {
        if library.book(&isbn).is_some() {
            eprintln!("Warning: ISBN {} is already in the catalog", isbn);
        }
        library.add_book(entry);
        Ok(())
    })?;

    println!("✓ Added {} to the catalog", isbn);
    Ok(())
}

fn cmd_remove_book(paths: &Paths, isbn: &str) -> Result<()> {
    let mut removed = false;
    Library::update(&paths.library, |library| {
        removed = library.remove_book(isbn);
        Ok(())
    })?;

    if removed {
        println!("✓ Removed {} from the catalog", isbn);
    } else {
        println!("✗ No book with ISBN {} in the catalog", isbn);
    }
    Ok(())
}

fn cmd_register(paths: &Paths, member_id: String, name: String) -> Result<()> {
    let id = member_id.clone();
    Library::update(&paths.library, |library| {
        if library.member(&id).is_some() {
            eprintln!("Warning: member id {} is already registered", id);
        }
        library.register_member(Member::new(id.clone(), name));
        Ok(())
    })?;

    println!("✓ Registered member {}", member_id);
    Ok(())
}

fn cmd_borrow(paths: &Paths, member_id: &str, isbn: &str) -> Result<()> {
    let mut library = Library::load(&paths.library)?;
    report_validation(&library);

    let mut ledger = JsonlLedger::new(&paths.ledger);
    let ok = check_out(&mut library, &mut ledger, member_id, isbn, chrono::Utc::now())?;

    if ok {
        library.save(&paths.library)?;
        println!("✓ {} checked out to {}", isbn, member_id);
    } else {
        println!("✗ Cannot check out {} to {}", isbn, member_id);
    }
    Ok(())
}

fn cmd_return(paths: &Paths, member_id: &str, isbn: &str) -> Result<()> {
    let mut library = Library::load(&paths.library)?;
    report_validation(&library);

    let mut ledger = JsonlLedger::new(&paths.ledger);
    let ok = check_in(&mut library, &mut ledger, member_id, isbn, chrono::Utc::now())?;

    if ok {
        library.save(&paths.library)?;
        println!("✓ {} returned by {}", isbn, member_id);
    } else {
        println!("✗ {} does not hold {}", member_id, isbn);
    }
    Ok(())
}

fn cmd_available(paths: &Paths) -> Result<()> {
    let library = Library::load(&paths.library)?;
    let available = library.available_books();

    if available.is_empty() {
        println!("No copies available.");
        return Ok(());
    }

    println!("Available copies:");
    for entry in available {
        let record = entry.record();
        let shelf = entry
            .as_physical()
            .map(|copy| copy.shelf_location.as_str())
            .unwrap_or("-");
        println!(
            "  {}  {} by {} ({})  shelf {}",
            record.isbn, record.title, record.author, record.publication_year, shelf
        );
    }
    Ok(())
}

fn cmd_history(paths: &Paths, days: Option<i64>, config: &Config) -> Result<()> {
    let days = days.unwrap_or(config.history.window_days);
    let loans = load_recent_loans(&paths.ledger, &paths.csv, days)?;

    if loans.is_empty() {
        println!("No loans in the last {} days.", days);
        return Ok(());
    }

    println!("Loans in the last {} days:", days);
    for loan in &loans {
        let status = match loan.returned_at {
            Some(returned_at) => format!("returned {}", returned_at.format("%Y-%m-%d")),
            None => "still out".to_string(),
        };
        println!(
            "  {}  {} -> {}  borrowed {}  ({})",
            loan.id,
            loan.isbn,
            loan.member_id,
            loan.borrowed_at.format("%Y-%m-%d"),
            status
        );
    }
    Ok(())
}

fn cmd_rollup(paths: &Paths) -> Result<()> {
    if !paths.ledger.exists() {
        println!("No ledger file found - nothing to archive.");
        return Ok(());
    }

    let count = shelfmark_core::archive::ledger_to_csv_and_archive(&paths.ledger, &paths.csv)?;

    println!("✓ Archived {} closed loans to CSV", count);
    println!("  CSV: {}", paths.csv.display());
    Ok(())
}

fn report_validation(library: &Library) {
    for error in library.validate() {
        eprintln!("Warning: {}", error);
    }
}
