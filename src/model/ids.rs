use chrono::Utc;

/// Issues time-based ids that never repeat within a session.
///
/// Ids are the current Unix time in milliseconds, bumped past the last
/// issued value when two requests land in the same millisecond.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator::default()
    }

    /// Next id with the given prefix (`"proj-"`, `"col-"`, `"label-"` or `""`).
    /// `taken` reports ids already present in the target collection; those
    /// are skipped.
    pub fn next(&mut self, prefix: &str, taken: impl Fn(&str) -> bool) -> String {
        let mut stamp = Utc::now().timestamp_millis().max(self.last + 1);
        loop {
            let id = format!("{}{}", prefix, stamp);
            if !taken(&id) {
                self.last = stamp;
                return id;
            }
            stamp += 1;
        }
    }
}
