use chrono::NaiveTime;
use chrono::Timelike;
use tracing::error;

/// Fallback when a rule's time of day does not parse: once a day at
/// midnight. A single malformed rule must not sink the whole rebuild.
pub const DEFAULT_EXPRESSION: &str = "0 0 0 * * *";

/// Compile a recurrence token and a time of day into a seconds-first cron
/// expression for the recurring timer.
///
/// `"*"` and `"@daily"` both mean every day. Any other token lands verbatim
/// in the day-of-week field; whether it is a valid token is the timer's
/// call, not ours.
pub fn build_cron_expression(recurrence: &str, time_str: &str, rule_name: &str) -> String {
    // HH:MM is shorthand for HH:MM:00.
    let normalized = if time_str.matches(':').count() == 1 {
        format!("{time_str}:00")
    } else {
        time_str.to_string()
    };

    let time = match NaiveTime::parse_from_str(&normalized, "%H:%M:%S") {
        Ok(t) => t,
        Err(e) => {
            error!(
                rule = rule_name,
                value = time_str,
                error = %e,
                "malformed time of day, substituting daily midnight"
            );
            return DEFAULT_EXPRESSION.to_string();
        }
    };

    if recurrence == "*" || recurrence == "@daily" {
        format!("{} {} {} * * *", time.second(), time.minute(), time.hour())
    } else {
        format!(
            "{} {} {} * * {}",
            time.second(),
            time.minute(),
            time.hour(),
            recurrence
        )
    }
}
