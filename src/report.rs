use crate::app::RunReport;
use crate::domain::Platform;

/// Renders the run as a markdown table: one row per platform plus a totals
/// row, one column per construct plus a grand-total column. Pure text
/// building; callers decide where the table goes.
pub fn markdown_table(report: &RunReport) -> String {
    let mut table = String::new();

    table.push_str("| Construct                 | ");
    for totals in &report.constructs {
        table.push_str(totals.construct.as_str());
        table.push_str(" | ");
    }
    table.push_str("**Total** |\n");

    table.push_str("|---------------------------|");
    for _ in &report.constructs {
        table.push_str("-----------------------|");
    }
    table.push_str("---------|\n");

    for platform in Platform::ALL {
        table.push_str(&format!("| **{}**               | ", platform.label()));
        let mut row_total = 0u64;
        for totals in &report.constructs {
            let downloads = totals.downloads_for(platform);
            row_total += downloads;
            table.push_str(&group_thousands(downloads));
            table.push_str(" | ");
        }
        table.push_str(&group_thousands(row_total));
        table.push_str(" |\n");
    }

    table.push_str("| **Total**                 | ");
    for totals in &report.constructs {
        table.push_str(&group_thousands(totals.total));
        table.push_str(" | ");
    }
    table.push_str(&group_thousands(report.grand_total));
    table.push_str(" |\n");

    table
}

/// Thousands-grouped rendering, `1234567` -> `1,234,567`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
