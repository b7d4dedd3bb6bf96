use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Billing category for a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCategory {
    Labor,
    Materials,
}

impl ItemCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCategory::Labor => "Labor",
            ItemCategory::Materials => "Materials",
        }
    }
}

#[derive(Debug, Error)]
#[error("unrecognized item category: {0} (expected labor or materials)")]
pub struct ParseCategoryError(String);

impl FromStr for ItemCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "labor" => Ok(ItemCategory::Labor),
            "materials" | "material" => Ok(ItemCategory::Materials),
            other => Err(ParseCategoryError(other.to_string())),
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One billable line on an invoice being composed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
    pub category: ItemCategory,
}

impl LineItem {
    pub fn new(category: ItemCategory, description: String, quantity: f64, rate: f64) -> Self {
        Self {
            description,
            quantity,
            rate,
            category,
        }
    }

    /// Lines with a blank description do not count toward totals.
    pub fn is_billable(&self) -> bool {
        !self.description.trim().is_empty()
    }

    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }
}

/// Itemized monetary breakdown for one invoice. Derived, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalsBreakdown {
    pub labor_total: f64,
    pub materials_total: f64,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax: f64,
    pub total_before_discounts: f64,
    pub senior_savings: f64,
    pub veteran_savings: f64,
    pub total_due: f64,
}

impl TotalsBreakdown {
    /// All-zero breakdown carrying only the given tax rate.
    pub fn zero(tax_rate: f64) -> Self {
        Self {
            labor_total: 0.0,
            materials_total: 0.0,
            subtotal: 0.0,
            tax_rate,
            tax: 0.0,
            total_before_discounts: 0.0,
            senior_savings: 0.0,
            veteran_savings: 0.0,
            total_due: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Fields collected by the client form. Ids and timestamps are assigned
/// by the store at creation.
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: Option<String>,
}

/// Day of week used to partition the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

pub const ALL_DAYS: [Weekday; 7] = [
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
    Weekday::Sunday,
];

impl Weekday {
    /// Index into the store's per-day partitions (Monday = 0).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    /// Today's day of week in local time.
    pub fn today() -> Self {
        use chrono::Datelike;
        let idx = chrono::Local::now().weekday().num_days_from_monday() as usize;
        ALL_DAYS[idx]
    }
}

#[derive(Debug, Error)]
#[error("unrecognized day of week: {0}")]
pub struct ParseWeekdayError(String);

impl FromStr for Weekday {
    type Err = ParseWeekdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(Weekday::Monday),
            "tuesday" | "tue" | "tues" => Ok(Weekday::Tuesday),
            "wednesday" | "wed" => Ok(Weekday::Wednesday),
            "thursday" | "thu" | "thur" | "thurs" => Ok(Weekday::Thursday),
            "friday" | "fri" => Ok(Weekday::Friday),
            "saturday" | "sat" => Ok(Weekday::Saturday),
            "sunday" | "sun" => Ok(Weekday::Sunday),
            other => Err(ParseWeekdayError(other.to_string())),
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: i64,
    pub client_id: i64,
    pub day: Weekday,
    pub time: String, // 24-hour HH:MM
    pub duration_hours: f64,
    pub summary: String,
    pub completed: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewScheduleEntry {
    pub client_id: i64,
    pub time: String,
    pub duration_hours: f64,
    pub summary: String,
}

/// Media payload attached to a note, already read and encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub data: String, // base64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub text: String,
    pub attachment: Option<NoteAttachment>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub client_id: i64,
    pub invoice_number: String,
    pub issue_date: String, // YYYY-MM-DD
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: TotalsBreakdown,
    pub created_at: String,
}

/// A fully composed invoice submission. The totals must come from
/// `totals::compute_totals` over the same items.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub client_id: i64,
    pub invoice_number: Option<String>,
    pub issue_date: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub totals: TotalsBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_parses_full_names_and_prefixes() {
        assert_eq!("Monday".parse::<Weekday>().unwrap(), Weekday::Monday);
        assert_eq!("wed".parse::<Weekday>().unwrap(), Weekday::Wednesday);
        assert_eq!("SATURDAY".parse::<Weekday>().unwrap(), Weekday::Saturday);
        assert!("someday".parse::<Weekday>().is_err());
    }

    #[test]
    fn weekday_indexes_are_stable() {
        for (i, day) in ALL_DAYS.iter().enumerate() {
            assert_eq!(day.index(), i);
        }
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("labor".parse::<ItemCategory>().unwrap(), ItemCategory::Labor);
        assert_eq!(
            "Materials".parse::<ItemCategory>().unwrap(),
            ItemCategory::Materials
        );
        assert!("tools".parse::<ItemCategory>().is_err());
    }

    #[test]
    fn blank_description_is_not_billable() {
        let item = LineItem::new(ItemCategory::Labor, "   ".to_string(), 1.0, 50.0);
        assert!(!item.is_billable());
        assert!(LineItem::new(ItemCategory::Labor, "Mowing".to_string(), 1.0, 50.0).is_billable());
    }
}
