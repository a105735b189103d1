use crate::config::Config;
use crate::db::User;
use crate::mail::Mailer;

const APP_NAME: &str = "Chirp";

pub fn reset_password_subject() -> String {
    format!("[{}] Reset Your Password", APP_NAME)
}

pub fn reset_password_text(user: &User, token: &str, ttl_secs: i64) -> String {
    format!(
        "Dear {username},\n\n\
         To reset your password submit the following token together with your new password:\n\n\
         {token}\n\n\
         The token expires in {expiry}. If you have not requested a password reset simply ignore this message.\n\n\
         Sincerely,\n\n\
         The {app} Team\n",
        username = user.username,
        token = token,
        expiry = expiry_text(ttl_secs),
        app = APP_NAME,
    )
}

pub fn reset_password_html(user: &User, token: &str, ttl_secs: i64) -> String {
    format!(
        "<p>Dear {username},</p>\
         <p>To reset your password submit the following token together with your new password:</p>\
         <p><code>{token}</code></p>\
         <p>The token expires in {expiry}. If you have not requested a password reset simply ignore this message.</p>\
         <p>Sincerely,</p>\
         <p>The {app} Team</p>",
        username = user.username,
        token = token,
        expiry = expiry_text(ttl_secs),
        app = APP_NAME,
    )
}

fn expiry_text(ttl_secs: i64) -> String {
    match ttl_secs {
        s if s >= 120 => format!("{} minutes", s / 60),
        s if s >= 60 => "1 minute".to_string(),
        s => format!("{} seconds", s.max(0)),
    }
}

/// Queue the password reset message for `user`. `ttl_secs` is the token's lifetime.
pub fn send_password_reset_email(mailer: &Mailer, config: &Config, user: &User, token: &str, ttl_secs: i64) {
    mailer.send_email(
        &reset_password_subject(),
        &config.mail_sender,
        &[user.email.clone()],
        &reset_password_text(user, token, ttl_secs),
        &reset_password_html(user, token, ttl_secs),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::mail::tests::RecordingTransport;
    use crate::mail::MailSettings;

    #[tokio::test]
    async fn test_reset_email_carries_token() {
        let transport = Arc::new(RecordingTransport::default());
        let (mailer, worker) = Mailer::spawn(
            transport.clone(),
            MailSettings { queue_size: 4, max_attempts: 1, retry_delay: Duration::ZERO },
        );
        let config = Config::default();
        let user = User::new("susan".to_string(), "susan@example.com".to_string(), "password123").unwrap();

        send_password_reset_email(&mailer, &config, &user, "tok.sig", 600);
        drop(mailer);
        worker.await.unwrap();

        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender, config.mail_sender);
        assert_eq!(sent[0].recipients, vec!["susan@example.com".to_string()]);
        assert_eq!(sent[0].subject, "[Chirp] Reset Your Password");
        assert!(sent[0].text_body.contains("tok.sig"));
        assert!(sent[0].html_body.contains("<code>tok.sig</code>"));
        assert!(sent[0].text_body.starts_with("Dear susan,"));
        assert!(sent[0].text_body.contains("expires in 10 minutes"));
    }

    #[test]
    fn test_expiry_text() {
        assert_eq!(expiry_text(600), "10 minutes");
        assert_eq!(expiry_text(90), "1 minute");
        assert_eq!(expiry_text(30), "30 seconds");
    }
}
