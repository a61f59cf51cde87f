//! Interactive shell over the manager API, plus CSV bulk import.
//!
//! The shell consumes only the public `DatabaseManager` surface, the same
//! way any other front end would.

use std::error::Error;
use std::path::Path;

use prettytable::{Cell, Row, Table as DisplayTable};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use bptdb::{DatabaseManager, Value};

const HELP: &str = "\
Commands:
  tables                                        list tables
  info <table>                                  show table shape
  create <table> <col1,col2,...> <primary_key>  create a table
  drop <table>                                  drop a table
  index <table> <column>                        create an index
  insert <table> <v1,v2,...>                    insert a record
  select <table>                                all records
  select <table> <col> <value>                  exact match
  select <table> <col> <lo> <hi>                range match
  update <table> <cond_col> <cond_val> <upd_col> <upd_val>
  delete <table> [<col> <value>]                delete matching (or all)
  import <table> <file.csv>                     bulk-load a CSV file
  save                                          flush all tables
  quit";

pub fn run(db_dir: &Path) -> Result<(), Box<dyn Error>> {
    let mut manager = DatabaseManager::new(db_dir)?;
    let mut editor = DefaultEditor::new()?;

    println!(
        "bptdb shell: {} table(s) loaded from {}. Type 'help' for commands.",
        manager.get_tables().len(),
        db_dir.display()
    );

    loop {
        match editor.readline("bptdb> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match execute(&mut manager, line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => println!("error: {}", err),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    manager.save_all()?;
    Ok(())
}

/// Run one command line. Returns Ok(false) to leave the shell.
fn execute(manager: &mut DatabaseManager, line: &str) -> Result<bool, Box<dyn Error>> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts.as_slice() {
        ["help"] => println!("{}", HELP),
        ["quit"] | ["exit"] => return Ok(false),

        ["tables"] => {
            for name in manager.get_tables() {
                println!("{}", name);
            }
        }

        ["info", table] => {
            let info = manager.get_table_info(table)?;
            println!("table:       {}", info.name);
            println!("columns:     {}", info.columns.join(", "));
            println!("primary key: {}", info.primary_key);
            println!("indices:     {}", info.indices.join(", "));
            println!("records:     {}", info.record_count);
        }

        ["create", table, columns, primary_key] => {
            let columns: Vec<String> = columns.split(',').map(|c| c.trim().to_string()).collect();
            manager.create_table(table, columns, primary_key)?;
            println!("created table {}", table);
        }

        ["drop", table] => {
            manager.drop_table(table)?;
            println!("dropped table {}", table);
        }

        ["index", table, column] => {
            if manager.create_index(table, column)? {
                println!("created index on {}.{}", table, column);
            } else {
                println!("index on {}.{} already exists", table, column);
            }
        }

        ["insert", table, values] => {
            let record: Vec<Value> = values.split(',').map(Value::from_input).collect();
            manager.insert(table, record)?;
            println!("inserted 1 record");
        }

        ["select", table] => {
            let rows = manager.select(table, None, None, None, None)?;
            print_rows(manager, table, &rows)?;
        }

        ["select", table, column, value] => {
            let value = Value::from_input(value);
            let rows = manager.select(table, Some(column), Some(&value), None, None)?;
            print_rows(manager, table, &rows)?;
        }

        ["select", table, column, lo, hi] => {
            let lo = Value::from_input(lo);
            let hi = Value::from_input(hi);
            let rows = manager.select(table, Some(column), None, Some(&lo), Some(&hi))?;
            print_rows(manager, table, &rows)?;
        }

        ["update", table, cond_col, cond_val, upd_col, upd_val] => {
            let cond_val = Value::from_input(cond_val);
            let upd_val = Value::from_input(upd_val);
            let count = manager.update(table, cond_col, &cond_val, upd_col, &upd_val)?;
            println!("updated {} record(s)", count);
        }

        ["delete", table] => {
            let count = manager.delete(table, None, None)?;
            println!("deleted {} record(s)", count);
        }

        ["delete", table, column, value] => {
            let value = Value::from_input(value);
            let count = manager.delete(table, Some(column), Some(&value))?;
            println!("deleted {} record(s)", count);
        }

        ["import", table, path] => import_csv(manager, table, path)?,

        ["save"] => {
            manager.save_all()?;
            println!("saved {} table(s)", manager.get_tables().len());
        }

        _ => println!("unrecognized command; type 'help'"),
    }

    Ok(true)
}

fn print_rows(
    manager: &DatabaseManager,
    table: &str,
    rows: &[Vec<Value>],
) -> Result<(), Box<dyn Error>> {
    let info = manager.get_table_info(table)?;

    let mut display = DisplayTable::new();
    display.add_row(Row::new(info.columns.iter().map(|c| Cell::new(c)).collect()));
    for row in rows {
        display.add_row(Row::new(
            row.iter().map(|v| Cell::new(&v.to_string())).collect(),
        ));
    }
    display.printstd();
    println!("{} row(s)", rows.len());
    Ok(())
}

/// Bulk-load a CSV file whose header row names the columns. Rows with a
/// missing primary key or other per-row failures are reported and skipped;
/// the import continues with the remaining rows.
fn import_csv(
    manager: &mut DatabaseManager,
    table: &str,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    if !manager.get_tables().contains(&table.to_string()) {
        let primary_key = headers
            .first()
            .cloned()
            .ok_or("CSV file has no header row")?;
        manager.create_table(table, headers, &primary_key)?;
    }

    let info = manager.get_table_info(table)?;
    let pk_idx = info
        .columns
        .iter()
        .position(|c| c == &info.primary_key)
        .unwrap_or(0);

    let mut imported = 0usize;
    let mut skipped = 0usize;

    for (row_no, result) in reader.records().enumerate() {
        let line = row_no + 2; // header is line 1
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                println!("row {}: {}", line, err);
                skipped += 1;
                continue;
            }
        };

        let values: Vec<Value> = record.iter().map(Value::from_input).collect();
        if values.len() != info.columns.len() {
            println!(
                "row {}: expected {} fields, got {}",
                line,
                info.columns.len(),
                values.len()
            );
            skipped += 1;
            continue;
        }
        if matches!(&values[pk_idx], Value::Text(s) if s.is_empty()) {
            println!("row {}: missing primary key", line);
            skipped += 1;
            continue;
        }

        match manager.insert(table, values) {
            Ok(_) => imported += 1,
            Err(err) => {
                println!("row {}: {}", line, err);
                skipped += 1;
            }
        }
    }

    manager.save_all()?;
    println!(
        "imported {} row(s) into {} ({} skipped)",
        imported, table, skipped
    );
    Ok(())
}
