use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use sqlbridge::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run SQL scripts and catalog queries through sqlbridge")]
struct Args {
    /// driver://[user[:password]@]host[:port]/database[?opt=val&...]
    connection: ConnectionString,
    /// Script to run statement by statement
    #[arg(long)]
    batch_file: Option<PathBuf>,
    /// Keep going after a failing statement and report every error at the end
    #[arg(long)]
    collect_errors: bool,
    /// Single query whose result is printed as tab-separated values
    #[arg(long)]
    sql: Option<String>,
    /// List catalog objects of this kind
    #[arg(long, value_enum)]
    list: Option<ObjectType>,
    /// JSON file with pool options
    #[arg(long)]
    pool_config: Option<PathBuf>,
    #[arg(long)]
    verbose: bool,
}

fn print_rows(query: &mut Query<'_>) -> Result<(), SqlBridgeError> {
    query.open()?;
    let header: Vec<&str> = query.fields().iter().map(Field::name).collect();
    if !header.is_empty() {
        println!("{}", header.join("\t"));
    }
    while !query.eof() {
        let line: Vec<String> = query
            .fields()
            .iter()
            .map(|f| escape_sql_string(&f.to_display_string(), true))
            .collect();
        println!("{}", line.join("\t"));
        query.next()?;
    }
    query.close();
    Ok(())
}

fn run(args: &Args) -> Result<(), SqlBridgeError> {
    let options = match &args.pool_config {
        Some(path) => PoolOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => PoolOptions::new(1),
    };
    let pool = ConnectionPool::new(args.connection.clone(), options)?;
    let conn = pool.get_connection()?;
    tracing::info!("connected: {}", conn.driver_description());

    if let Some(path) = &args.batch_file {
        let mut errors = Vec::new();
        let sink = args.collect_errors.then_some(&mut errors);
        conn.execute_batch_file(path, sink)?;
        for err in &errors {
            eprintln!("{err}");
        }
        if !errors.is_empty() {
            return Err(SqlBridgeError::DriverError {
                operation: "executeBatchFile".to_string(),
                message: format!("{} statements failed", errors.len()),
            });
        }
    }

    if let Some(sql) = &args.sql {
        print_rows(&mut Query::new(&conn, sql))?;
    }

    if let Some(kind) = args.list {
        for name in conn.object_list(kind)? {
            println!("{name}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
