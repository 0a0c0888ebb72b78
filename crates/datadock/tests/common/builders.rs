//! CSV fixture builders for the monthly-sales shape most flows use.

#![allow(dead_code)]

/// `month,region,amount` rows for the given `YYYY-MM` months, one row per
/// month with deterministic filler values.
pub fn monthly_sales(months: &[&str]) -> String {
    let mut content = String::from("month,region,amount\n");
    for (i, month) in months.iter().enumerate() {
        let region = ["north", "south", "east", "west"][i % 4];
        content.push_str(&format!("{month},{region},{}\n", 100 + i as u32 * 10));
    }
    content
}

/// Same rows as [`monthly_sales`] with the `amount` column removed.
pub fn monthly_sales_without_amount(months: &[&str]) -> String {
    let mut content = String::from("month,region\n");
    for (i, month) in months.iter().enumerate() {
        let region = ["north", "south", "east", "west"][i % 4];
        content.push_str(&format!("{month},{region}\n"));
    }
    content
}
