//! Outbound notification messages

use super::entry::Entry;
use super::realm::Realm;
use super::timeframe::SequencedTimeFrame;
use crate::error::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const SUBJECT_ROUND_COMPLETE: &str = "End of Round";
pub const SUBJECT_WINDOW_OPEN: &str = "Prediction Window Open!";
pub const SUBJECT_WINDOW_OPEN_FINAL: &str = "Prediction Window Open (Last Chance!)";
pub const SUBJECT_WINDOW_CLOSING: &str = "Prediction Window Closing Soon";
pub const SUBJECT_WINDOW_CLOSING_FINAL: &str = "Prediction Window Closing Soon (Last Chance!)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub address: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// `Name <address>` form
    pub fn mailbox(&self) -> String {
        format!("{} <{}>", self.name, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub from: Identity,
    pub to: Identity,
    pub reply_to: Identity,
    pub sender_domain: String,
    pub subject: String,
    pub plain_text: String,
}

impl Email {
    /// Address a message to an entrant on behalf of their realm
    pub fn for_entry(realm: &Realm, entry: &Entry, subject: String, plain_text: String) -> Self {
        Self {
            from: Identity::new(&realm.contact.name, &realm.contact.email_do_not_reply),
            to: Identity::new(&entry.entrant_name, &entry.entrant_email),
            reply_to: Identity::new(&realm.contact.name, &realm.contact.email_proper),
            sender_domain: realm.contact.sender_domain.clone(),
            subject,
            plain_text,
        }
    }
}

/// Which window notice to compose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowNotice {
    Open,
    Closing,
}

fn format_date(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%a %-d %B").to_string()
}

fn format_time(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%-I:%M%P").to_string()
}

fn sign_off(body: &mut String, realm: &Realm) {
    let _ = write!(body, "\nThanks,\n{}\n", realm.contact.name);
}

/// Notice sent when a round's standings are finalised
pub fn round_complete_email(
    realm: &Realm,
    entry: &Entry,
    season_name: &str,
    round_number: u32,
    rankings_table: &[String],
    final_round: bool,
) -> Result<Email> {
    let mut body = String::new();
    let _ = writeln!(body, "Hi {},\n", entry.entrant_name);
    if final_round {
        let _ = writeln!(
            body,
            "That's a wrap! The {} season is over and round {} was the final round.",
            season_name, round_number
        );
        let _ = writeln!(body, "Here's how your prediction finished up:\n");
    } else {
        let _ = writeln!(
            body,
            "Round {} of the {} season has finished. Here's how your prediction scored:\n",
            round_number, season_name
        );
    }
    for line in rankings_table {
        let _ = writeln!(body, "{}", line);
    }
    let _ = writeln!(body, "\nSee the full leaderboard: {}", realm.leaderboard_url()?);
    sign_off(&mut body, realm);

    Ok(Email::for_entry(
        realm,
        entry,
        format!("{} {}", SUBJECT_ROUND_COMPLETE, round_number),
        body,
    ))
}

/// Notice sent when a prediction window opens or is about to close
pub fn prediction_window_email(
    realm: &Realm,
    entry: &Entry,
    season_name: &str,
    window: &SequencedTimeFrame,
    notice: WindowNotice,
    tz: Tz,
) -> Result<Email> {
    let subject = match (notice, window.is_last()) {
        (WindowNotice::Open, false) => SUBJECT_WINDOW_OPEN,
        (WindowNotice::Open, true) => SUBJECT_WINDOW_OPEN_FINAL,
        (WindowNotice::Closing, false) => SUBJECT_WINDOW_CLOSING,
        (WindowNotice::Closing, true) => SUBJECT_WINDOW_CLOSING_FINAL,
    };

    let mut body = String::new();
    let _ = writeln!(body, "Hi {},\n", entry.entrant_name);
    let verb = match notice {
        WindowNotice::Open => "is now open",
        WindowNotice::Closing => "closes soon",
    };
    let _ = writeln!(
        body,
        "Prediction window {} of {} for the {} season {}.",
        window.count, window.total, season_name, verb
    );
    let _ = writeln!(
        body,
        "You can change your prediction until {} at {}.",
        format_date(window.current.until, tz),
        format_time(window.current.until, tz)
    );
    match window.next {
        Some(next) => {
            let _ = writeln!(
                body,
                "The next window opens on {} at {}.",
                format_date(next.from, tz),
                format_time(next.from, tz)
            );
        }
        None => {
            let _ = writeln!(body, "This is the last chance to change your prediction.");
        }
    }
    let _ = writeln!(body, "\nUpdate your prediction: {}", realm.prediction_url()?);
    sign_off(&mut body, realm);

    Ok(Email::for_entry(realm, entry, subject.to_string(), body))
}
