//! Row validation: raw record in, [`RowOutcome`] out.
//!
//! This is a pure function of the row and the company profile. Field errors
//! are accumulated as data and never thrown; a row with at least one error
//! is invalid regardless of the upload mode (strict mode only changes what
//! the batch layer does with invalid rows, never how a row is judged).
//!
//! Error strings use the API field names, quoting the offending value where
//! there is one:
//!
//! - `"transactionNumber is required"`
//! - `"quantity \"abc\" is not a non-negative integer"`
//! - `"transactionDate \"31/12/2024\" does not match format %m/%d/%Y"`

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::config::CompanyProfile;
use crate::models::{InvalidRow, NormalizedRow, RowOutcome};
use crate::parser::RawRecord;

/// Validate one raw row against a company profile.
pub fn validate_row(record: &RawRecord, profile: &CompanyProfile) -> RowOutcome {
    let mut errors = Vec::new();

    let text = |field: &str| record.get(field).unwrap_or("").trim().to_string();

    let transaction_number = text("transaction_number");
    if transaction_number.is_empty() {
        errors.push("transactionNumber is required".to_string());
    }

    // Either the customer identifier or the customer name must be present.
    let customer_number = text("customer_number");
    let customer_name = text("customer_name");
    if customer_number.is_empty() && customer_name.is_empty() {
        errors.push("customerNumber is required".to_string());
    }

    let product_code = text("product_code");
    if product_code.is_empty() {
        errors.push("productCode is required".to_string());
    }

    let product_description = text("product_description");

    let quantity = parse_quantity(&text("quantity"), &mut errors);
    let sales_amount = parse_amount("salesAmount", &text("sales_amount"), &mut errors);
    let cost_of_sales = parse_amount("costOfSales", &text("cost_of_sales"), &mut errors);

    let raw_date = text("transaction_date");
    let transaction_date = if raw_date.is_empty() {
        errors.push("transactionDate is required".to_string());
        None
    } else {
        match NaiveDate::parse_from_str(&raw_date, &profile.date_format) {
            Ok(date) => Some(date),
            Err(_) => {
                errors.push(format!(
                    "transactionDate \"{}\" does not match format {}",
                    raw_date, profile.date_format
                ));
                None
            }
        }
    };

    // A None in any typed field always comes with an error pushed above.
    match (quantity, sales_amount, cost_of_sales, transaction_date) {
        (Some(quantity), Some(sales_amount), Some(cost_of_sales), Some(transaction_date))
            if errors.is_empty() =>
        {
            RowOutcome::Valid(NormalizedRow {
                transaction_number,
                customer_number,
                customer_name,
                product_code,
                product_description,
                quantity,
                sales_amount,
                cost_of_sales,
                transaction_date,
            })
        }
        _ => RowOutcome::Invalid(InvalidRow { raw: record.fields.clone(), errors }),
    }
}

/// Parse a non-negative integer quantity.
fn parse_quantity(raw: &str, errors: &mut Vec<String>) -> Option<u32> {
    match raw.parse::<u32>() {
        Ok(qty) => Some(qty),
        Err(_) => {
            errors.push(format!("quantity \"{}\" is not a non-negative integer", raw));
            None
        }
    }
}

/// Parse a decimal monetary amount. Negative values are allowed (credits);
/// thousands separators are tolerated.
fn parse_amount(field: &str, raw: &str, errors: &mut Vec<String>) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    match Decimal::from_str(&cleaned) {
        Ok(amount) => Some(amount),
        Err(_) => {
            errors.push(format!("{} \"{}\" is not a valid amount", field, raw));
            None
        }
    }
}
