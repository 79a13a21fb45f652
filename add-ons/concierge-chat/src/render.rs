//! Terminal output: transcript lines, typing indicator, appointment listings.

use chrono::{DateTime, Local, Utc};
use concierge_core::{
    Appointment, AppointmentStatus, AvailabilitySlot, Message, MessageCategory, MessageId, Sender,
    Session,
};
use tokio::sync::watch;

fn local(t: &DateTime<Utc>) -> DateTime<Local> {
    t.with_timezone(&Local)
}

pub fn format_message(message: &Message) -> String {
    let time = local(&message.created_at).format("%H:%M");
    match (message.sender, message.category) {
        (Sender::User, _) => format!("[{}] you: {}", time, message.content),
        (Sender::Agent, MessageCategory::Text) => {
            format!("[{}] concierge: {}", time, message.content)
        }
        (Sender::Agent, MessageCategory::Error) => {
            format!("[{}] concierge (!): {}", time, message.content)
        }
        (Sender::Agent, category) => {
            format!("[{}] concierge [{}]: {}", time, category.as_str(), message.content)
        }
    }
}

pub fn format_appointment(appointment: &Appointment) -> String {
    let start = local(&appointment.start_time);
    let end = local(&appointment.end_time);
    let mut line = format!(
        "{}  {} {}-{}  {}",
        appointment.id,
        start.format("%a %Y-%m-%d"),
        start.format("%H:%M"),
        end.format("%H:%M"),
        appointment.title
    );
    if !appointment.attendees.is_empty() {
        line.push_str(&format!(" (with {})", appointment.attendees.join(", ")));
    }
    if let Some(location) = appointment.location.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!(" @ {}", location));
    }
    if appointment.status != AppointmentStatus::Scheduled {
        line.push_str(&format!(" [{:?}]", appointment.status).to_lowercase());
    }
    line
}

pub fn format_slot(slot: &AvailabilitySlot) -> String {
    format!(
        "{}-{}{}",
        local(&slot.start).format("%H:%M"),
        local(&slot.end).format("%H:%M"),
        if slot.available { "" } else { " (taken)" }
    )
}

/// What the renderer has already shown.
#[derive(Debug, Default)]
pub struct RenderState {
    last_printed: Option<MessageId>,
    typing: bool,
}

impl RenderState {
    /// Lines to print for `session`, each message at most once.
    pub fn update(&mut self, session: &Session) -> Vec<String> {
        let mut lines = Vec::new();
        for message in &session.messages {
            if self.last_printed.is_some_and(|last| message.id <= last) {
                continue;
            }
            // The typing line goes away once the reply it announced is in.
            if self.typing && !message.is_from_user() {
                self.typing = false;
            }
            lines.push(format_message(message));
            self.last_printed = Some(message.id);
        }
        if session.typing_indicator && !self.typing {
            lines.push("  concierge is typing...".to_string());
        }
        self.typing = session.typing_indicator;
        lines
    }
}

/// Print transcript changes until the store goes away.
pub async fn run(mut updates: watch::Receiver<Session>) {
    let mut state = RenderState::default();
    loop {
        let lines = {
            let session = updates.borrow_and_update();
            state.update(&session)
        };
        for line in lines {
            println!("{}", line);
        }
        if updates.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use concierge_core::{NewMessage, SessionStore, VoiceConfig};

    fn appointment() -> Appointment {
        Appointment {
            id: "a1".into(),
            title: "Dentist".into(),
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 2, 15, 0, 0).unwrap(),
            attendees: vec!["John".into()],
            location: Some("".into()),
            status: AppointmentStatus::Cancelled,
        }
    }

    #[test]
    fn appointment_line_lists_attendees_and_status() {
        let line = format_appointment(&appointment());
        assert!(line.starts_with("a1  "));
        assert!(line.contains("Dentist (with John)"));
        assert!(!line.contains(" @ "));
        assert!(line.ends_with("[cancelled]"));
    }

    fn wall_clock(h: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2025, 6, 2, h, 0, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn slots_print_the_server_wall_clock() {
        let slot = AvailabilitySlot {
            start: wall_clock(9),
            end: wall_clock(10),
            available: false,
        };
        assert_eq!(format_slot(&slot), "09:00-10:00 (taken)");
    }

    #[test]
    fn each_message_is_printed_once() {
        let store = SessionStore::new(VoiceConfig::default());
        let mut state = RenderState::default();

        store.append(NewMessage::user("hi"));
        let lines = state.update(&store.snapshot());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("you: hi"));

        store.set_typing_indicator(true);
        let lines = state.update(&store.snapshot());
        assert_eq!(lines, vec!["  concierge is typing...".to_string()]);
        assert!(state.update(&store.snapshot()).is_empty());

        store.append(NewMessage::agent("Booked.", MessageCategory::Appointment));
        store.set_typing_indicator(false);
        let lines = state.update(&store.snapshot());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("concierge [appointment]: Booked."));
    }

    #[test]
    fn clear_does_not_reprint_history() {
        let store = SessionStore::new(VoiceConfig::default());
        let mut state = RenderState::default();
        store.append(NewMessage::user("one"));
        state.update(&store.snapshot());

        store.clear();
        assert!(state.update(&store.snapshot()).is_empty());
        store.append(NewMessage::user("two"));
        assert_eq!(state.update(&store.snapshot()).len(), 1);
    }
}
