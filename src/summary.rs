use crate::config::BusinessInfo;
use crate::models::{Client, Invoice};

/// Compose the plain-text invoice summary handed to the platform's
/// messaging launcher. Clients removed since the invoice was recorded
/// show up as "Unknown client" rather than failing the composition.
pub fn compose_invoice_message(
    invoice: &Invoice,
    client: Option<&Client>,
    business: &BusinessInfo,
) -> String {
    let client_name = client.map(|c| c.name.as_str()).unwrap_or("Unknown client");

    let mut lines = Vec::new();
    lines.push(format!(
        "Invoice {} from {}",
        invoice.invoice_number, business.name
    ));
    lines.push(format!("For: {}", client_name));
    lines.push(format!("Date: {}", invoice.issue_date));
    for item in invoice.items.iter().filter(|i| i.is_billable()) {
        lines.push(format!(
            "- {} ({} x {}): {}",
            item.description,
            item.quantity,
            money(item.rate),
            money(item.amount())
        ));
    }
    if invoice.totals.senior_savings > 0.0 {
        lines.push(format!(
            "Senior discount: -{}",
            money(invoice.totals.senior_savings)
        ));
    }
    if invoice.totals.veteran_savings > 0.0 {
        lines.push(format!(
            "Veteran discount: -{}",
            money(invoice.totals.veteran_savings)
        ));
    }
    lines.push(format!("Total due: {}", money(invoice.totals.total_due)));
    lines.push(format!(
        "Thank you for your business! - {}, {}",
        business.name, business.phone
    ));

    lines.join("\n")
}

fn money(value: f64) -> String {
    format!("${:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemCategory, LineItem};
    use crate::totals::compute_totals;
    use crate::utils::timestamp_now;

    fn sample_invoice() -> Invoice {
        let items = vec![
            LineItem::new(ItemCategory::Labor, "Mowing".to_string(), 2.0, 50.0),
            LineItem::new(ItemCategory::Materials, "Mulch".to_string(), 1.0, 30.0),
        ];
        let totals = compute_totals(&items, 0.06, false, true);
        Invoice {
            id: 7,
            client_id: 3,
            invoice_number: "INV-0001".to_string(),
            issue_date: "2026-08-06".to_string(),
            notes: None,
            items,
            totals,
            created_at: timestamp_now(),
        }
    }

    fn sample_client() -> Client {
        Client {
            id: 3,
            name: "Ada Byron".to_string(),
            address: "1200 Frederica St".to_string(),
            phone: "270-555-0142".to_string(),
            email: None,
            notes: None,
            created_at: timestamp_now(),
        }
    }

    #[test]
    fn message_carries_number_client_items_and_total() {
        let message = compose_invoice_message(
            &sample_invoice(),
            Some(&sample_client()),
            &BusinessInfo::default(),
        );

        assert!(message.starts_with("Invoice INV-0001 from Owensboro Mowing Company"));
        assert!(message.contains("For: Ada Byron"));
        assert!(message.contains("- Mowing (2 x $50.00): $100.00"));
        assert!(message.contains("- Mulch (1 x $30.00): $30.00"));
        assert!(message.contains("Veteran discount: -$15.00"));
        assert!(message.contains("Total due: $122.80"));
        assert!(message.contains("Thank you for your business!"));
    }

    #[test]
    fn missing_client_reads_as_unknown() {
        let message =
            compose_invoice_message(&sample_invoice(), None, &BusinessInfo::default());
        assert!(message.contains("For: Unknown client"));
        assert!(!message.contains("Senior discount"));
    }
}
