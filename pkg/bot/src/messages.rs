//! User-facing texts and their formatting.

use chrono::{DateTime, Utc};
use pkg_types::activity::ActivityReport;

use crate::transport::Keyboard;

pub const BUTTON_WHATSAPP: &str = "💬 Contact on WhatsApp";
pub const BUTTON_SERVICE_INFO: &str = "ℹ️ About the service";
pub const BUTTON_CALL_ME_BACK: &str = "⏳ Call me back";

pub const WELCOME: &str = "Hi! 👋
Welcome to the bot-building service: bots made easy, service made with care.
I'm here to help you get a custom Telegram bot, quickly and with a human touch.

Pick an option from the menu below ✨";

pub const SERVICE_INFO: &str = "I build Telegram bots for every goal and budget.
They suit businesses, channels, clubs, private initiatives, and anyone who wants automation and order in Telegram.

🚀 What can you ask for?
• Auto-reply bots (questions, broadcasts, saving information)
• Bots for managing appointments or tasks
• Integrations with external websites or third-party services
• Fully custom bots built around your idea

👥 Who is it for?
Anyone who wants to work smarter, look professional, or save time.";

pub const CONTACT_PROMPT: &str = "Thanks for reaching out! 🙏

Please send me:
• Your name
• How to reach you (phone/email)
• What exactly you are looking for

I'll get back to you as soon as possible!";

pub const REQUEST_RECEIVED: &str = "Thanks! 📩 Your request has been received.

I'll get back to you as soon as possible.
Meanwhile, you can also reach me on WhatsApp ⬇️";

pub const HELP: &str = "🤖 How to use this bot

Menu options:
💬 Contact on WhatsApp: opens a WhatsApp chat with me
ℹ️ About the service: what I offer
⏳ Call me back: leave your details and I'll get back to you

Commands:
/start - start a new conversation
/help - show this message

Questions? Just leave a message and I'll get back to you!";

pub const DEFAULT_REPLY: &str = "I'm here to help! Pick one of the options below 👇

Or leave a message and I'll get back to you soon.";

pub const STATS_UNAVAILABLE: &str = "Statistics are unavailable right now.";

const NO_USERNAME: &str = "no username";

/// Operator timestamp format, e.g. `05/03/2026 14:07`.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

pub fn main_keyboard() -> Keyboard {
    Keyboard {
        rows: vec![
            vec![BUTTON_WHATSAPP.to_string()],
            vec![BUTTON_SERVICE_INFO.to_string()],
            vec![BUTTON_CALL_ME_BACK.to_string()],
        ],
    }
}

/// `https://wa.me/<digits>` for a number written like `+972-54 397 8620`.
pub fn whatsapp_link(number: &str) -> String {
    let digits: String = number
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' '))
        .collect();
    format!("https://wa.me/{}", digits)
}

pub fn whatsapp_message(number: &str) -> String {
    format!(
        "🔗 Tap here to chat on WhatsApp:\n{}\n\nI'm available to answer all your questions!",
        whatsapp_link(number)
    )
}

/// Operator notification for a new contact request.
pub fn notification(
    full_name: &str,
    username: Option<&str>,
    user_id: i64,
    text: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "🔔 New request from the bot!\n\nFrom: {} (@{})\nID: {}\n\nMessage:\n{}\n\nTime: {}",
        full_name,
        username.unwrap_or(NO_USERNAME),
        user_id,
        text,
        at.format(TIMESTAMP_FORMAT)
    )
}

fn report_section(title: &str, report: &ActivityReport) -> String {
    let mut out = format!(
        "{} (last {} days)\nUnique users: {}\nTotal activities: {}",
        title, report.window_days, report.unique_users, report.total_activities
    );
    for day in &report.daily_breakdown {
        out.push_str(&format!(
            "\n  {}: {} users, {} activities",
            day.date.format("%d/%m/%Y"),
            day.unique_users,
            day.total_activities
        ));
    }
    out
}

pub fn stats(weekly: &ActivityReport, monthly: &ActivityReport) -> String {
    format!(
        "📊 Bot activity\n\n{}\n\n{}",
        report_section("Weekly", weekly),
        report_section("Monthly", monthly)
    )
}
