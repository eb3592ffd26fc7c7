//! Rendering of leads into the operator-facing shapes: the short text list,
//! the CSV export and the new-lead notification. Extracted as plain functions
//! so they can be unit-tested without a bot or a database.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::store::leads::Lead;

pub const EMPTY_STATE: &str = "No leads yet.";

/// One formatted block per lead, newest first, for the "last 10" reply.
pub fn leads_text(leads: &[Lead]) -> String {
    let mut message = String::from("📋 Latest leads:\n\n");
    for lead in leads {
        let date = lead.created_at.format("%d.%m.%Y, %H:%M:%S");
        message.push_str(&format!(
            "🆔 {}\n👤 {}\n📧 {}\n📱 {}\n📅 {}\n-------------------\n",
            lead.id,
            lead.name,
            lead.email,
            lead.phone.as_deref().unwrap_or("—"),
            date,
        ));
    }
    message
}

/// Full CSV export. String fields are double-quoted with embedded quotes
/// doubled; timestamps are RFC 3339.
pub fn leads_csv(leads: &[Lead]) -> String {
    let mut csv = String::from("ID,Name,Email,Phone,Date\n");
    for lead in leads {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            lead.id,
            quote(&lead.name),
            quote(&lead.email),
            quote(lead.phone.as_deref().unwrap_or("")),
            quote(&lead.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ));
    }
    csv
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

pub fn csv_filename(now: DateTime<Utc>) -> String {
    format!("leads_{}.csv", now.format("%Y-%m-%d"))
}

/// The broadcast sent to every bot user when a lead arrives.
pub fn new_lead_message(lead: &Lead) -> String {
    format!(
        "🚀 NEW LEAD!\n\nName: {}\nEmail: {}\nPhone: {}\n\n\
         Check the database or use the menu buttons.",
        lead.name,
        lead.email,
        lead.phone.as_deref().unwrap_or("—"),
    )
}
