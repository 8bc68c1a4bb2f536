pub const MAX_ROOMS: usize = 10_000;
pub const MAX_USERS: usize = 100_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_USERNAME_LEN: usize = 64;

/// Upper bound on a configured slot length (one full day).
pub const MAX_SLOT_MINUTES: u32 = 1440;
pub const MAX_SUGGESTIONS: usize = 48;
