use chrono::{ Local, TimeZone };

use crate::config::persona::PersonaConfig;
use crate::models::chat::{ Message, Role };

fn format_time(timestamp_ms: i64) -> String {
    Local.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn render_message(message: &Message, persona: &PersonaConfig) -> String {
    let label = match message.role {
        Role::User => &persona.user_label,
        Role::Assistant => &persona.sage_label,
    };
    let mut out = format!("[{}] {}:\n{}\n", format_time(message.timestamp), label, message.text);

    if let Some(plan) = message.plan.as_ref().filter(|plan| !plan.is_empty()) {
        out.push_str(&format!("\n  {}:\n", persona.plan_heading));
        for (idx, step) in plan.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", idx + 1, step));
        }
    }
    out
}
