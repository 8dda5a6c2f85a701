//! Hook invoked when the session is forcibly ended and the user must log in.

use tokio::sync::mpsc::UnboundedSender;

pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self, login_path: &str);
}

/// Logs the redirect and does nothing else. Suits headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRedirect;

impl LoginRedirect for TracingRedirect {
    fn redirect_to_login(&self, login_path: &str) {
        tracing::warn!(login_path, "session ended; login required");
    }
}

/// Forwards the login path to whoever owns the receiving end, typically the
/// application root driving a `Navigator`.
impl LoginRedirect for UnboundedSender<String> {
    fn redirect_to_login(&self, login_path: &str) {
        if self.send(login_path.to_string()).is_err() {
            tracing::warn!(login_path, "login redirect dropped; receiver is gone");
        }
    }
}
