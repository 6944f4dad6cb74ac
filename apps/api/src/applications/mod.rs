// Job application tracking: list, detail, status lifecycle updates.

pub mod handlers;
