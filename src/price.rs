//! Price derivation and formatting helpers.

/// Unit price per 100g, rounded to cents. `None` when either input is
/// missing or non-positive.
pub fn price_per_100g(price: Option<f64>, weight_grams: i64) -> Option<f64> {
    let price = price?;
    if price <= 0.0 || weight_grams <= 0 {
        return None;
    }
    Some((price / weight_grams as f64 * 100.0 * 100.0).round() / 100.0)
}

pub fn price_per_kg(price_per_100g: Option<f64>) -> Option<f64> {
    price_per_100g.map(|p| p * 10.0)
}

pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("{:.2} €", p),
        None => "N/A".to_string(),
    }
}

pub fn format_price_per_100g(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("{:.2} €/100g", p),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_per_100g() {
        assert_eq!(price_per_100g(Some(12.0), 250), Some(4.8));
        assert_eq!(price_per_100g(Some(10.0), 1000), Some(1.0));
        // Rounded to cents
        assert_eq!(price_per_100g(Some(9.99), 333), Some(3.0));
    }

    #[test]
    fn test_price_per_100g_degrades_to_none() {
        assert_eq!(price_per_100g(None, 250), None);
        assert_eq!(price_per_100g(Some(0.0), 250), None);
        assert_eq!(price_per_100g(Some(12.0), 0), None);
        assert_eq!(price_per_100g(Some(-1.0), 250), None);
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Some(12.5)), "12.50 €");
        assert_eq!(format_price(None), "N/A");
    }
}
