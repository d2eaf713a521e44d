// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owner-facing notification texts.

use archivist_core::UserId;

pub fn two_factor_prompt(hint: Option<&str>) -> String {
    let mut text = String::from(
        "🔐 Two-step verification is enabled on this account.\n\
         Send your cloud password to finish connecting.",
    );
    if let Some(hint) = hint.filter(|h| !h.is_empty()) {
        text.push_str(&format!("\n\n💡 Hint: {hint}"));
    }
    text
}

pub fn identity_mismatch(expected: UserId, actual: UserId) -> String {
    format!(
        "⚠️ The phone number you entered belongs to another account.\n\n\
         ❌ Your account ID: {expected}\n\
         ❌ Entered number's account ID: {actual}\n\n\
         ✅ Please enter only your own phone number and connect again."
    )
}

pub fn login_succeeded() -> String {
    "✅ Your account is connected. Archiving has started.".to_string()
}

pub fn login_failed(reason: &str) -> String {
    format!("❌ Login failed: {reason}\nPlease connect again.")
}

pub fn login_aborted(reason: &str) -> String {
    format!("⚠️ Login cancelled: {reason}.\nPlease connect again.")
}

/// Sent once when a session ends, whatever the cause.
pub fn session_ended(reason: &str) -> String {
    match reason {
        crate::supervisor::USER_REQUESTED | crate::supervisor::LOGGED_OUT => {
            "👋 Your account has been disconnected. Archiving is stopped.".to_string()
        }
        other => format!(
            "🔌 Your session was terminated by the platform ({other}).\n\
             Archiving is stopped until you connect again."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hint_line_only_when_present() {
        assert!(two_factor_prompt(Some("pet name")).contains("💡 Hint: pet name"));
        assert!(!two_factor_prompt(None).contains("Hint"));
        assert!(!two_factor_prompt(Some("")).contains("Hint"));
    }

    #[test]
    fn mismatch_names_both_ids() {
        let text = identity_mismatch(UserId(100), UserId(200));
        assert!(text.contains("100"));
        assert!(text.contains("200"));
    }

    #[test]
    fn revocation_reason_is_shown() {
        assert!(session_ended("SESSION_REVOKED").contains("SESSION_REVOKED"));
        assert!(!session_ended(crate::supervisor::USER_REQUESTED).contains("USER_REQUESTED"));
    }
}
