//! Email templates.

use chrono::Utc;

use crate::models::contact::ContactMessage;
use crate::models::registration::Registration;

use super::notification::EmailMessage;

/// Formats an amount in minor units, e.g. `49500, Some("aud")` as `$495.00 AUD`.
pub fn format_amount(minor_units: i64, currency: Option<&str>) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    let amount = format!("{}${}.{:02}", sign, abs / 100, abs % 100);
    match currency {
        Some(code) if !code.trim().is_empty() => format!("{} {}", amount, code.trim().to_uppercase()),
        _ => amount,
    }
}

fn registration_amount(registration: &Registration) -> String {
    format_amount(
        registration.amount_paid.unwrap_or(0),
        registration.currency.as_deref(),
    )
}

/// Confirmation sent to the payer after the registration is paid.
pub fn payment_confirmation(registration: &Registration) -> EmailMessage {
    let amount = registration_amount(registration);

    let body_text = format!(
        r#"Hi {name},

Your payment has been processed successfully!

Registration ID: {id}
Course: {course}
Amount Paid: {amount}

Thank you for registering!"#,
        name = registration.name,
        id = registration.registration_id,
        course = registration.course_id,
        amount = amount,
    );

    let body_html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="margin-top: 0;">Registration confirmed</h2>
    <p>Hi {name},</p>
    <p>Your payment has been processed successfully!</p>
    <div style="background: #f8f8f8; border-left: 4px solid #000; padding: 16px; margin: 20px 0;">
        <p style="margin: 4px 0;"><strong>Registration ID:</strong> {id}</p>
        <p style="margin: 4px 0;"><strong>Amount Paid:</strong> {amount}</p>
    </div>
    <p>Thank you for registering!</p>
</body>
</html>"#,
        name = registration.name,
        id = registration.registration_id,
        amount = amount,
    );

    EmailMessage {
        to: registration.email.clone(),
        to_name: Some(registration.name.clone()),
        subject: "Course Registration Confirmed".to_string(),
        body_text,
        body_html: Some(body_html),
        reply_to: None,
    }
}

/// Admin notice for a new payment.
pub fn payment_admin_notice(registration: &Registration, admin_email: &str) -> EmailMessage {
    let body_text = format!(
        r#"New payment received:

Name: {name}
Email: {email}
Course: {course}
Registration ID: {id}
Amount: {amount}
Stripe Session ID: {session}"#,
        name = registration.name,
        email = registration.email,
        course = registration.course_id,
        id = registration.registration_id,
        amount = registration_amount(registration),
        session = registration.stripe_session_id.as_deref().unwrap_or(""),
    );

    EmailMessage {
        to: admin_email.to_string(),
        to_name: None,
        subject: format!("New Course Registration Payment: {}", registration.name),
        body_text,
        body_html: None,
        reply_to: None,
    }
}

/// Welcome email for a livestream signup.
pub fn livestream_confirmation(registration: &Registration) -> EmailMessage {
    let body_text = format!(
        r#"Hi {name},

Thank you for registering for our livestream!

Registration Details:
- Registration ID: {id}
- Format: Online Livestream
- Cost: FREE

We'll send you the livestream link and access details closer to the event date.

Best regards,
The Course Team"#,
        name = registration.name,
        id = registration.registration_id,
    );

    EmailMessage {
        to: registration.email.clone(),
        to_name: Some(registration.name.clone()),
        subject: "Welcome to the Livestream!".to_string(),
        body_text,
        body_html: None,
        reply_to: None,
    }
}

/// Admin notice for a livestream signup.
pub fn livestream_admin_notice(registration: &Registration, admin_email: &str) -> EmailMessage {
    let body_text = format!(
        r#"New Livestream Registration

- Name: {name}
- Email: {email}
- Registration ID: {id}
- Course: {course}
- Registration Time: {time}"#,
        name = registration.name,
        email = registration.email,
        id = registration.registration_id,
        course = registration.course_id,
        time = registration.registration_date.to_rfc3339(),
    );

    EmailMessage {
        to: admin_email.to_string(),
        to_name: None,
        subject: format!("[Livestream Registration] New signup from {}", registration.name),
        body_text,
        body_html: None,
        reply_to: None,
    }
}

/// Contact form submission forwarded to the admin. Replies go to the sender.
pub fn contact_admin_notice(contact: &ContactMessage, admin_email: &str) -> EmailMessage {
    let body_text = format!(
        r#"New Contact Form Submission

Name: {name}
Email: {email}
Mobile Phone: {mobile}
Received: {received}
Message:
{message}"#,
        name = contact.name,
        email = contact.email,
        mobile = contact.mobile,
        received = Utc::now().to_rfc3339(),
        message = contact.message,
    );

    EmailMessage {
        to: admin_email.to_string(),
        to_name: None,
        subject: format!("[Website Contact] Message from {}", contact.name),
        body_text,
        body_html: None,
        reply_to: Some(contact.email.clone()),
    }
}
