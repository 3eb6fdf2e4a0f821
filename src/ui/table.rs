use crate::Result;
use comfy_table::{ContentArrangement, Table, presets::NOTHING};

/// A borderless table sized to the terminal.
pub fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn print_table(table: Table) -> Result<()> {
    let table = table.to_string();
    for line in table.lines() {
        println!("{}", line.trim());
    }
    Ok(())
}
