use std::io::Cursor;

/// Upper bound (exclusive) of bucket values and the largest allowed traffic allocation bound.
pub const MAX_TRAFFIC_VALUE: u32 = 10_000;

/// Seed for the murmur hash. Shared by every Optimizely SDK, so it must never change.
const HASH_SEED: u32 = 1;

/// Maps a bucketing key to a bucket value in `[0, MAX_TRAFFIC_VALUE]`.
pub trait Bucketer {
    fn bucket_value(&self, bucketing_key: &str) -> u32;
}

/// The default (and only production) bucketer: 32-bit MurmurHash3 with seed 1, scaled to
/// [`MAX_TRAFFIC_VALUE`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Murmur3Bucketer;

impl Bucketer for Murmur3Bucketer {
    fn bucket_value(&self, bucketing_key: &str) -> u32 {
        let hash = murmur3::murmur3_32(&mut Cursor::new(bucketing_key.as_bytes()), HASH_SEED)
            .expect("reading from an in-memory buffer should not fail");
        let ratio = f64::from(hash) / f64::from(u32::MAX);
        (ratio * f64::from(MAX_TRAFFIC_VALUE)).floor() as u32
    }
}

/// Build the bucketing key for a user in an experiment: user id followed by experiment id, with
/// no separator.
pub(crate) fn bucketing_key(user_id: &str, experiment_id: &str) -> String {
    let mut key = String::with_capacity(user_id.len() + experiment_id.len());
    key.push_str(user_id);
    key.push_str(experiment_id);
    key
}

#[cfg(test)]
pub(crate) struct DeterministicBucketer(pub std::collections::HashMap<String, u32>);

#[cfg(test)]
impl Bucketer for DeterministicBucketer {
    fn bucket_value(&self, bucketing_key: &str) -> u32 {
        self.0.get(bucketing_key).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::{bucketing_key, Bucketer, Murmur3Bucketer};

    fn bucket(experiment_id: &str, user_id: &str) -> u32 {
        Murmur3Bucketer.bucket_value(&bucketing_key(user_id, experiment_id))
    }

    #[test]
    fn test_murmur3_bucketer() {
        assert_eq!(bucket("1886780721", "ppid1"), 5254);
        assert_eq!(bucket("1886780721", "ppid2"), 4299);
        assert_eq!(bucket("1886780722", "ppid2"), 2434);
        assert_eq!(bucket("1886780721", "ppid3"), 5439);
        assert_eq!(
            bucket(
                "1886780721",
                "a very very very very very very very very very very very very very very very long ppd string"
            ),
            6128
        );
    }

    #[test]
    fn key_puts_user_first() {
        assert_eq!(bucketing_key("ppid1", "1886780721"), "ppid11886780721");
    }

    #[test]
    fn is_stable_across_calls() {
        let first = bucket("5678", "user");
        for _ in 0..10 {
            assert_eq!(bucket("5678", "user"), first);
        }
    }
}
