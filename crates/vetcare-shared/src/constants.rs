/// Application name
pub const APP_NAME: &str = "VetCare";

/// Length of the window during which a veterinarian is busy for one
/// appointment, in seconds (one hour from the start time).
pub const CONFLICT_WINDOW_SECS: i64 = 60 * 60;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default session token lifetime in hours (7 days)
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

/// Longest accepted session token lifetime in hours (one year)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// How far ahead an appointment may be booked, in days
pub const MAX_BOOKING_LEAD_DAYS: i64 = 2 * 365;

/// Key derivation context for password hashing (BLAKE3)
pub const KDF_CONTEXT_PASSWORD: &str = "vetcare-password-v1";

/// Random salt size for password hashes in bytes
pub const PASSWORD_SALT_SIZE: usize = 16;

/// Ed25519 secret key size in bytes
pub const SECRET_KEY_SIZE: usize = 32;

// Field limits

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_USER_NAME_LEN: usize = 100;
pub const MAX_PET_NAME_LEN: usize = 50;
pub const MAX_BREED_LEN: usize = 50;
pub const MAX_COLOR_LEN: usize = 30;
pub const MAX_PET_WEIGHT_KG: f64 = 200.0;
pub const MAX_REASON_LEN: usize = 500;
pub const MAX_APPOINTMENT_NOTES_LEN: usize = 1000;
pub const MAX_DIAGNOSIS_LEN: usize = 1000;
pub const MAX_TREATMENT_LEN: usize = 1000;
pub const MAX_RECORD_NOTES_LEN: usize = 2000;

/// Default and maximum page sizes for list endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
