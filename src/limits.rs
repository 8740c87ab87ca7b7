//! Hard limits on inputs. Violations surface as `BookingError::Validation`.

pub const MAX_NAME_LEN: usize = 120;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_REASON_LEN: usize = 200;
pub const MAX_COMMENT_LEN: usize = 1000;
pub const MAX_STAFF_LEN: usize = 120;

/// Widest slot-generation window a single call may cover.
pub const MAX_WINDOW_DAYS: i64 = 62;

pub const MIN_SLOT_MINUTES: u32 = 5;
pub const MAX_SLOT_MINUTES: u32 = 480;
pub const MINUTES_PER_DAY: u32 = 1440;

/// Epoch-day sanity bound (~year 2079).
pub const MAX_VALID_DAY: i64 = 40_000;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
