//! HTML bodies of the contact emails.
//!
//! Every contact field is escaped before it is placed in the markup.

use crate::models::Contact;

pub const OWNER_NOTIFICATION_SUBJECT: &str = "New message from the contact form";
pub const SENDER_REPLY_SUBJECT: &str = "Message received";

/// Subject and body of one email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Email telling the site owner who wrote and what.
pub fn owner_notification(contact: &Contact) -> RenderedEmail {
    let name = escape_html(contact.name.trim());
    let email = escape_html(contact.email.trim());
    // Keep the visitor's line breaks
    let message = escape_html(&contact.message).replace('\n', "<br>");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif; color: #1f2933;">
    <h2>New contact message</h2>
    <table cellpadding="4">
      <tr><td><strong>Name</strong></td><td>{name}</td></tr>
      <tr><td><strong>Email</strong></td><td><a href="mailto:{email}">{email}</a></td></tr>
    </table>
    <p style="white-space: pre-wrap;">{message}</p>
  </body>
</html>"#
    );

    RenderedEmail {
        subject: OWNER_NOTIFICATION_SUBJECT.to_string(),
        html,
    }
}

/// Automatic acknowledgement sent to the visitor.
pub fn sender_reply(contact: &Contact) -> RenderedEmail {
    let name = escape_html(contact.greeting_name());

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif; color: #1f2933;">
    <p>Hi {name},</p>
    <p>thanks for getting in touch. Your message has been received and I will get back to you as soon as possible.</p>
    <p>This is an automatic reply, there is no need to answer it.</p>
  </body>
</html>"#
    );

    RenderedEmail {
        subject: SENDER_REPLY_SUBJECT.to_string(),
        html,
    }
}
