use booking_notifier_domain::{Booking, NotificationJobType, RenderedContent};

/// Produces the human readable part of a notification
pub trait ITemplateResolver: Send + Sync {
    fn resolve(&self, job_type: NotificationJobType, booking: &Booking) -> RenderedContent;
}

pub struct DefaultTemplateResolver {}

impl DefaultTemplateResolver {
    fn headline(job_type: NotificationJobType) -> &'static str {
        match job_type {
            NotificationJobType::InviteCreate => "You have been invited",
            NotificationJobType::InviteUpdate => "A booking you are part of has been updated",
            NotificationJobType::InviteCancel => "A booking you were part of has been cancelled",
        }
    }

    fn subject_prefix(job_type: NotificationJobType) -> &'static str {
        match job_type {
            NotificationJobType::InviteCreate => "Invitation",
            NotificationJobType::InviteUpdate => "Updated invitation",
            NotificationJobType::InviteCancel => "Cancelled",
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl ITemplateResolver for DefaultTemplateResolver {
    fn resolve(&self, job_type: NotificationJobType, booking: &Booking) -> RenderedContent {
        let when = format!(
            "{} - {}",
            booking.start.format("%A %Y-%m-%d %H:%M"),
            if booking.start.date() == booking.end.date() {
                booking.end.format("%H:%M").to_string()
            } else {
                booking.end.format("%A %Y-%m-%d %H:%M").to_string()
            }
        );
        let subject = format!(
            "{}: {} ({})",
            Self::subject_prefix(job_type),
            booking.title,
            booking.start.format("%Y-%m-%d %H:%M")
        );

        let mut text_lines = vec![
            Self::headline(job_type).to_string(),
            String::new(),
            booking.title.clone(),
            format!("When: {}", when),
        ];
        let mut html_lines = vec![
            format!("<h2>{}</h2>", Self::headline(job_type)),
            format!("<p><strong>{}</strong></p>", escape_html(&booking.title)),
            format!("<p>When: {}</p>", when),
        ];
        if let Some(location) = booking.location.as_deref().filter(|l| !l.trim().is_empty()) {
            text_lines.push(format!("Where: {}", location));
            html_lines.push(format!("<p>Where: {}</p>", escape_html(location)));
        }
        if let Some(organizer) = booking.organizer() {
            text_lines.push(format!("Organizer: {}", organizer));
            html_lines.push(format!("<p>Organizer: {}</p>", escape_html(&organizer)));
        }
        if let Some(description) = booking
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            text_lines.push(String::new());
            text_lines.push(description.to_string());
            html_lines.push(format!(
                "<p>{}</p>",
                escape_html(description).replace('\n', "<br>")
            ));
        }

        RenderedContent {
            subject,
            html_body: html_lines.join("\n"),
            text_body: text_lines.join("\n"),
        }
    }
}
