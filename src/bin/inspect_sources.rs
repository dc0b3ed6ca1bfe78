use anyhow::Context;
use clap::Parser;
use service_geocoder::adapters::table::{read_tables, RawTable};
use service_geocoder::domain::model::COL_SUBURB;

#[derive(Parser)]
#[command(name = "inspect-sources")]
#[command(about = "List the sheets of a source file with record counts and sample suburbs")]
struct Args {
    /// Source file (.xlsx, .xls, .ods, .csv or .json)
    path: String,

    /// Combined sheet name; a workbook containing it is read from that sheet only
    #[arg(long, default_value = "")]
    combined_sheet: String,
}

fn sample_suburbs(table: &RawTable) -> Option<Vec<String>> {
    let index = table
        .headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(COL_SUBURB))?;

    let mut samples: Vec<String> = Vec::new();
    for row in &table.rows {
        let Some(suburb) = row.get(index).map(|s| s.trim()) else {
            continue;
        };
        if !suburb.is_empty() && !samples.iter().any(|s| s == suburb) {
            samples.push(suburb.to_string());
        }
        if samples.len() == 3 {
            break;
        }
    }
    Some(samples)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let bytes =
        std::fs::read(&args.path).with_context(|| format!("Failed to read {}", args.path))?;
    let tables = read_tables(&args.path, &bytes, &args.combined_sheet)
        .with_context(|| format!("Failed to parse {}", args.path))?;

    let names: Vec<&str> = tables
        .iter()
        .map(|t| t.label.as_deref().unwrap_or(&args.path))
        .collect();
    println!("Sheet names: {:?}", names);
    println!();
    println!("Records per sheet:");

    let mut total = 0;
    for table in &tables {
        let count = table
            .rows
            .iter()
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .count();
        println!(
            "  {}: {} records",
            table.label.as_deref().unwrap_or(&args.path),
            count
        );
        if count > 0 {
            match sample_suburbs(table) {
                Some(samples) => println!("    Sample suburbs: {:?}", samples),
                None => println!("    Sample suburbs: N/A"),
            }
        }
        total += count;
    }

    println!();
    println!("Total records across all sheets: {}", total);
    Ok(())
}
