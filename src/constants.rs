// ABOUTME: Application-wide constants for care rules, limits and HTTP plumbing
// ABOUTME: Time windows, retention periods, rate limits and fixed user-facing text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 MyGuide Health

/// Dose scheduling windows
pub mod doses {
    /// A dose is due within this many minutes either side of its scheduled time
    pub const DUE_WINDOW_MINUTES: i64 = 30;
    /// Overdue by less than this is `mild`
    pub const MILD_OVERDUE_MINUTES: i64 = 60;
    /// Overdue by less than this is `moderate`; anything longer is `severe`
    pub const MODERATE_OVERDUE_MINUTES: i64 = 240;
    /// A dose logged as taken later than this is recorded as `late`
    pub const LATE_THRESHOLD_MINUTES: i64 = 60;
    /// Default and maximum window for dose-log queries
    pub const DEFAULT_LOG_WINDOW_DAYS: i64 = 7;
    /// Upper bound on a dose-log or compliance query window
    pub const MAX_LOG_WINDOW_DAYS: i64 = 90;
}

/// Shift offers
pub mod shifts {
    /// Minutes a caregiver has to answer an offer
    pub const DEFAULT_OFFER_WINDOW_MINUTES: i64 = 30;
    /// Largest candidate list accepted for one cascade
    pub const MAX_OFFER_CANDIDATES: usize = 25;
}

/// AI consent
pub mod consent {
    /// Consent validity from acceptance
    pub const VALIDITY_DAYS: i64 = 90;
    /// Minimum time on the terms before acceptance counts
    pub const MIN_READ_TIME_SECONDS: u32 = 30;
    /// Reminder lead time before expiry
    pub const REMINDER_DAYS: i64 = 7;
}

/// Account lifecycle
pub mod accounts {
    /// Days between a deletion request and the purge
    pub const DELETION_GRACE_DAYS: i64 = 30;
}

/// Cached drug labels
pub mod labels {
    /// Labels older than this are refetched
    pub const MAX_AGE_DAYS: i64 = 30;
    /// Characters kept either side of a co-mention in an excerpt
    pub const EXCERPT_CONTEXT_CHARS: usize = 120;
}

/// Document summaries
pub mod documents {
    /// Characters of document text sent to the model
    pub const MAX_PROMPT_TEXT_CHARS: usize = 4000;
    /// Characters kept as a preview
    pub const PREVIEW_CHARS: usize = 500;
    /// Texts longer than this get a high-confidence summary
    pub const HIGH_CONFIDENCE_MIN_CHARS: usize = 100;
    /// Largest document text accepted
    pub const MAX_TEXT_CHARS: usize = 200_000;
    /// File types whose text the apps can extract
    pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];
}

/// Compliance trends
pub mod compliance {
    /// Days in each half of the trend comparison
    pub const TREND_PERIOD_DAYS: i64 = 7;
    /// Percentage-point change needed to call a trend
    pub const TREND_THRESHOLD_POINTS: f64 = 5.0;
}

/// Authentication
pub mod auth {
    /// Cookie carrying the session JWT
    pub const AUTH_COOKIE_NAME: &str = "auth_token";
    /// Default JWT lifetime
    pub const DEFAULT_JWT_EXPIRY_HOURS: i64 = 24 * 7;
    /// JWT issuer claim
    pub const JWT_ISSUER: &str = "myguide";
    /// Default bcrypt work factor
    pub const DEFAULT_BCRYPT_COST: u32 = 12;
}

/// Rate limiting
pub mod rate_limits {
    /// Attempts allowed per window on auth endpoints
    pub const AUTH_MAX_ATTEMPTS: u32 = 5;
    /// Auth rate-limit window
    pub const AUTH_WINDOW_SECONDS: u64 = 15 * 60;
}

/// Input limits
pub mod limits {
    /// Longest accepted display or elder name
    pub const MAX_NAME_LENGTH: usize = 100;
    /// Longest accepted free-text field
    pub const MAX_TEXT_LENGTH: usize = 2000;
    /// Longest accepted AI chat prompt
    pub const MAX_PROMPT_LENGTH: usize = 4000;
    /// Minimum password length
    pub const MIN_PASSWORD_LENGTH: usize = 8;
    /// Request body limit in bytes
    pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;
    /// Request timeout
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    /// Earliest calendar year accepted in dates and timestamps
    pub const MIN_SUPPORTED_YEAR: i32 = 1900;
    /// Latest calendar year accepted in dates and timestamps
    pub const MAX_SUPPORTED_YEAR: i32 = 2200;
}

/// Invite codes
pub mod invites {
    /// Characters in a code
    pub const CODE_LENGTH: usize = 8;
    /// Alphabet without look-alike characters (no 0/O, 1/I)
    pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
}

/// Fixed user-facing text
pub mod messages {
    /// Attached to every interaction-check response
    pub const INTERACTION_DISCLAIMER: &str = "This check only reports where one medication is mentioned in another's FDA label text. \
         It is not medical advice and does not assess clinical significance. \
         Always consult a doctor or pharmacist before changing any medication.";
    /// Attached to every AI insight response
    pub const AI_DISCLAIMER: &str = "AI-generated information for caregivers. Not a diagnosis or a substitute for professional medical advice.";
    /// Consent gate rejection
    pub const CONSENT_REQUIRED: &str =
        "AI and medical features require an active consent. Review and accept the terms first.";
}
