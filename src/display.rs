// Display strings shared by the terminal UI and the `summary` command

use chrono::{DateTime, Local, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// `$` + amount with two decimals, e.g. `$76.50`
pub fn format_price(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("${:.2}", rounded)
}

/// Human-readable age of the last save, relative to `now`
pub fn format_last_saved(last_saved: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(saved_at) = last_saved else {
        return "Sin guardar".to_string();
    };

    let minutes = (now - saved_at).num_minutes();
    if minutes < 1 {
        return "Guardado hace unos segundos".to_string();
    }
    if minutes == 1 {
        return "Guardado hace 1 minuto".to_string();
    }
    if minutes < 60 {
        return format!("Guardado hace {} minutos", minutes);
    }

    let hours = minutes / 60;
    if hours == 1 {
        return "Guardado hace 1 hora".to_string();
    }
    if hours < 24 {
        return format!("Guardado hace {} horas", hours);
    }

    format!(
        "Guardado el {}",
        saved_at.with_timezone(&Local).format("%d/%m/%Y")
    )
}
