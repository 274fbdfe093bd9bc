use clap::Parser;
use std::fs;
use std::path::PathBuf;

/// Print the SQL that sets up (or tears down) the turmas database
#[derive(Parser, Debug)]
#[command(name = "turmas-schema", version, about)]
struct Args {
    /// Emit the drop script instead of the migration
    #[arg(long)]
    down: bool,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let sql = if args.down {
        turmas::schema::drop_sql()
    } else {
        turmas::schema::migration_sql()
    };

    match args.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, sql) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                std::process::exit(1);
            }
            println!("Wrote {}", path.display());
        }
        None => print!("{}", sql),
    }
}
